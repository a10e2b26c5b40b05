//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::reload::{ReloadHandle, ReloadOrigin};

/// Resolve on the first SIGINT or SIGTERM.
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Forward SIGHUP to the reload coordinator until shutdown.
#[cfg(unix)]
pub async fn reload_on_hangup(handle: ReloadHandle, mut shutdown: broadcast::Receiver<()>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "Failed to listen for SIGHUP, signal reloads disabled");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                info!("Received SIGHUP, reloading configuration");
                if !handle.trigger(ReloadOrigin::Signal) {
                    warn!("Reload coordinator is gone, ignoring SIGHUP");
                }
            }
        }
    }
}

#[cfg(not(unix))]
pub async fn reload_on_hangup(_handle: ReloadHandle, mut shutdown: broadcast::Receiver<()>) {
    let _ = shutdown.recv().await;
}
