//! Record processing pipeline.
//!
//! # Data Flow
//! ```text
//! decoded batch (Vec<Option<Record>>)
//!     → chain.rs (stages in configured order)
//!     → stage.rs (one filter or transform; absent slots skipped)
//!     → Vec<Record> handed to the sink
//!
//! Construction (per configuration generation):
//!     [preprocessors.<name>] options
//!     → registry.rs (type name → factory)
//!     → factory validates options, compiles the stage
//!     → stages assembled into a Chain per listener
//! ```
//!
//! # Design Decisions
//! - Compiled stage state is published through `ArcSwap`; readers never lock
//! - A rejected configuration leaves the running stage untouched
//! - Per-record failures drop the record, never the batch

pub mod chain;
pub mod error;
pub mod record;
pub mod registry;
pub mod stage;
pub mod stages;

pub use chain::Chain;
pub use error::{ConfigError, RecordError, StageError};
pub use record::{Batch, Record, MAX_PAYLOAD_SIZE};
pub use registry::StageRegistry;
pub use stage::{Stage, StageConfig, StageFactory};
