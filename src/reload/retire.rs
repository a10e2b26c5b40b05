//! Retirement of superseded route tables.
//!
//! Requests hold an `Arc<RouteTable>` for their whole lifetime, so after a
//! swap the old table stays reachable until they finish. Its stages are
//! closed once the coordinator holds the last reference, or when the grace
//! period runs out.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::routing::RouteTable;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Close `table` in the background once it is no longer in use.
///
/// Outside a tokio runtime the table is closed immediately.
pub fn retire(table: Arc<RouteTable>, grace: Duration) -> Option<JoinHandle<()>> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(handle.spawn(async move {
            wait_for_release(&table, grace).await;
            close_table(&table);
        })),
        Err(_) => {
            close_table(&table);
            None
        }
    }
}

/// Wait until `table` has no other holders or `grace` elapses.
async fn wait_for_release(table: &Arc<RouteTable>, grace: Duration) {
    let deadline = Instant::now() + grace;
    while Arc::strong_count(table) > 1 {
        if Instant::now() >= deadline {
            warn!(
                generation = table.generation(),
                holders = Arc::strong_count(table) - 1,
                "Retiring route table while still in use"
            );
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn close_table(table: &RouteTable) {
    for err in table.close() {
        warn!(generation = table.generation(), error = %err, "Failed to close retired stage");
    }
    debug!(generation = table.generation(), "Retired route table closed");
}
