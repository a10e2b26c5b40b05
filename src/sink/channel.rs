//! Channel-backed sink.

use tokio::sync::{broadcast, mpsc};

use crate::observability::metrics;
use crate::pipeline::Record;
use crate::sink::{Sink, SinkError};

/// A batch queued for the drain task.
#[derive(Debug)]
pub struct SinkBatch {
    pub tag: String,
    pub records: Vec<Record>,
}

/// Sink that queues batches onto a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<SinkBatch>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its queue.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SinkBatch>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Sink for ChannelSink {
    fn forward(&self, tag: &str, records: Vec<Record>) -> Result<(), SinkError> {
        self.tx
            .try_send(SinkBatch {
                tag: tag.to_string(),
                records,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SinkError::Full,
                mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
            })
    }
}

/// Drain queued batches until shutdown.
///
/// Stands in for the ingest muxer: batches are counted and logged.
pub async fn drain(mut rx: mpsc::Receiver<SinkBatch>, mut shutdown: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            batch = rx.recv() => {
                let Some(batch) = batch else { break };
                let bytes: usize = batch.records.iter().map(|r| r.data().len()).sum();
                metrics::record_records(&batch.tag, batch.records.len());
                tracing::debug!(
                    tag = %batch.tag,
                    records = batch.records.len(),
                    bytes,
                    "Batch delivered"
                );
            }
            _ = shutdown.recv() => {
                tracing::info!("Sink drain received shutdown signal");
                break;
            }
        }
    }
}
