//! Destination for processed records.
//!
//! # Data Flow
//! ```text
//! Handler (after chain)
//!     → Sink::forward(tag, records)
//!     → channel.rs: bounded queue drained by a background task
//!     → memory.rs: in-process store (tests, dry runs)
//! ```
//!
//! # Design Decisions
//! - `forward` is synchronous and never blocks; a full queue is reported
//! - No handler holds a lock while forwarding

use thiserror::Error;

use crate::pipeline::Record;

pub mod channel;
pub mod memory;

pub use channel::{ChannelSink, SinkBatch};
pub use memory::MemorySink;

/// Errors returned when forwarding to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink queue is full.
    #[error("sink queue is full")]
    Full,

    /// The sink has shut down.
    #[error("sink is closed")]
    Closed,
}

/// Storage sink / ingest muxer.
pub trait Sink: Send + Sync {
    /// Hand off a processed batch for `tag`.
    fn forward(&self, tag: &str, records: Vec<Record>) -> Result<(), SinkError>;
}
