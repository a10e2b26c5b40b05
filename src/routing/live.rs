//! Process-wide pointer to the published route table.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::routing::table::RouteTable;

/// The currently published [`RouteTable`].
///
/// Readers take one snapshot per request and keep it for the whole request.
/// Only the reload coordinator publishes.
#[derive(Debug)]
pub struct LiveRoutes {
    current: ArcSwap<RouteTable>,
}

impl LiveRoutes {
    pub fn new(table: RouteTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
        }
    }

    /// Snapshot of the current table.
    pub fn load(&self) -> Arc<RouteTable> {
        self.current.load_full()
    }

    /// Replace the current table, returning the superseded one.
    pub fn publish(&self, table: Arc<RouteTable>) -> Arc<RouteTable> {
        self.current.swap(table)
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }
}

impl Default for LiveRoutes {
    fn default() -> Self {
        Self::new(RouteTable::empty())
    }
}
