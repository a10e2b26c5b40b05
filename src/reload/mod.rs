//! Hot reload subsystem.
//!
//! # Data Flow
//! ```text
//! Triggers:
//!     config::ConfigWatcher (debounced fs events)
//!     SIGHUP, POST /admin/reload (ReloadHandle)
//!     → coordinator.rs (serial consumer, coalesces bursts)
//!
//! One reload:
//!     Idle → Loading (parse file + overlays)
//!          → Validating (build shadow RouteTable, fresh stages)
//!          → Swapping (single ArcSwap store)
//!          → Idle
//!     any failure before Swapping → Idle, live table untouched
//!
//! After swap:
//!     retire.rs closes the superseded table once unused
//! ```
//!
//! # Design Decisions
//! - At most one reload runs at a time
//! - The swap is the only step that touches live state and performs no I/O
//! - Failures are reported and logged, never fatal

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::config::LoadError;
use crate::routing::BuildError;

pub mod coordinator;
pub mod retire;

pub use coordinator::{channel, ReloadCoordinator, ReloadHandle, ReloadOrigin, ReloadRequest};

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("a reload is already in progress")]
    InProgress,

    #[error("failed to load configuration: {0}")]
    Load(#[from] LoadError),

    #[error("failed to build route table: {0}")]
    Build(#[from] BuildError),

    #[error("reload coordinator is not running")]
    Unavailable,

    #[error("reload task failed: {0}")]
    Task(String),
}

/// Result delivered to every caller waiting on a reload.
pub type ReloadOutcome = Result<u64, Arc<ReloadError>>;

/// Coordinator state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ReloadState {
    Idle = 0,
    Loading = 1,
    Validating = 2,
    Swapping = 3,
}

impl ReloadState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ReloadState::Loading,
            2 => ReloadState::Validating,
            3 => ReloadState::Swapping,
            _ => ReloadState::Idle,
        }
    }
}

/// Summary of reload history, reported by the admin API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadStatus {
    /// Generation of the live table.
    pub generation: u64,
    /// Successful reloads since startup.
    pub reloads: u64,
    pub failures: u64,
    /// Unix seconds of the last successful reload.
    pub last_success: Option<u64>,
    /// Message of the most recent failure, cleared by the next success.
    pub last_error: Option<String>,
}
