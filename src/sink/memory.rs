//! In-memory sink.

use dashmap::DashMap;
use std::sync::Arc;

use crate::pipeline::Record;
use crate::sink::{Sink, SinkError};

/// Collects forwarded records per tag.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<DashMap<String, Vec<Record>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records forwarded under `tag`, in arrival order.
    pub fn records(&self, tag: &str) -> Vec<Record> {
        self.inner
            .get(tag)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Payloads forwarded under `tag`, lossily decoded.
    pub fn payloads(&self, tag: &str) -> Vec<String> {
        self.records(tag)
            .iter()
            .map(|r| String::from_utf8_lossy(r.data()).into_owned())
            .collect()
    }

    /// Total records across all tags.
    pub fn len(&self) -> usize {
        self.inner.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl Sink for MemorySink {
    fn forward(&self, tag: &str, records: Vec<Record>) -> Result<(), SinkError> {
        self.inner.entry(tag.to_string()).or_default().extend(records);
        Ok(())
    }
}
