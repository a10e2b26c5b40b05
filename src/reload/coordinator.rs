//! Reload coordinator.
//!
//! Loads a candidate configuration, builds a complete shadow route table,
//! and publishes it with one atomic swap. Any failure before the swap
//! leaves the live table exactly as it was.

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::ConfigSource;
use crate::observability::metrics;
use crate::pipeline::StageRegistry;
use crate::reload::retire::retire;
use crate::reload::{ReloadError, ReloadOutcome, ReloadState, ReloadStatus};
use crate::routing::{build_route_table, LiveRoutes};
use crate::sink::Sink;

/// What asked for a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOrigin {
    Watcher,
    Signal,
    Admin,
    Manual,
}

impl fmt::Display for ReloadOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReloadOrigin::Watcher => "watcher",
            ReloadOrigin::Signal => "signal",
            ReloadOrigin::Admin => "admin",
            ReloadOrigin::Manual => "manual",
        })
    }
}

/// An explicit reload request, optionally waiting for the outcome.
#[derive(Debug)]
pub struct ReloadRequest {
    pub origin: ReloadOrigin,
    pub respond_to: Option<oneshot::Sender<ReloadOutcome>>,
}

/// Cloneable sender of reload requests.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: mpsc::Sender<ReloadRequest>,
}

/// Create the request channel consumed by [`ReloadCoordinator::run`].
pub fn channel(capacity: usize) -> (ReloadHandle, mpsc::Receiver<ReloadRequest>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ReloadHandle { tx }, rx)
}

impl ReloadHandle {
    /// Ask for a reload without waiting.
    ///
    /// Returns false only if the coordinator has stopped. A full queue means
    /// a reload is already pending, which covers this request too.
    pub fn trigger(&self, origin: ReloadOrigin) -> bool {
        match self.tx.try_send(ReloadRequest {
            origin,
            respond_to: None,
        }) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Ask for a reload and wait for its outcome.
    pub async fn request(&self, origin: ReloadOrigin) -> ReloadOutcome {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ReloadRequest {
                origin,
                respond_to: Some(tx),
            })
            .await
            .map_err(|_| Arc::new(ReloadError::Unavailable))?;
        rx.await
            .map_err(|_| Arc::new(ReloadError::Unavailable))?
    }
}

/// Serializes reloads and owns the only write path to [`LiveRoutes`].
pub struct ReloadCoordinator {
    source: ConfigSource,
    registry: StageRegistry,
    sink: Arc<dyn Sink>,
    live: Arc<LiveRoutes>,
    state: AtomicU8,
    // held for the duration of one reload
    in_progress: Mutex<()>,
    status: ArcSwap<ReloadStatus>,
}

impl ReloadCoordinator {
    pub fn new(
        source: ConfigSource,
        registry: StageRegistry,
        sink: Arc<dyn Sink>,
        live: Arc<LiveRoutes>,
    ) -> Self {
        let status = ReloadStatus {
            generation: live.generation(),
            ..Default::default()
        };
        Self {
            source,
            registry,
            sink,
            live,
            state: AtomicU8::new(ReloadState::Idle as u8),
            in_progress: Mutex::new(()),
            status: ArcSwap::from_pointee(status),
        }
    }

    pub fn state(&self) -> ReloadState {
        ReloadState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn status(&self) -> ReloadStatus {
        ReloadStatus::clone(&self.status.load())
    }

    pub fn live(&self) -> &Arc<LiveRoutes> {
        &self.live
    }

    fn set_state(&self, state: ReloadState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Run one reload on the calling thread.
    ///
    /// Performs blocking file I/O. Fails with [`ReloadError::InProgress`] if
    /// another reload holds the coordinator.
    pub fn reload_now(&self, origin: ReloadOrigin) -> Result<u64, ReloadError> {
        let _guard = match self.in_progress.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(ReloadError::InProgress),
        };

        info!(%origin, path = %self.source.path().display(), "Reloading configuration");
        let result = self.load_build_publish();
        self.set_state(ReloadState::Idle);

        let previous = self.status.load_full();
        let mut status = ReloadStatus::clone(&previous);
        match &result {
            Ok(generation) => {
                info!(
                    generation,
                    routes = self.live.load().len(),
                    "Configuration reloaded"
                );
                metrics::record_reload("success");
                metrics::set_generation(*generation);
                status.generation = *generation;
                status.reloads += 1;
                status.last_success = Some(unix_now());
                status.last_error = None;
            }
            Err(e) => {
                error!(
                    error = %e,
                    generation = self.live.generation(),
                    "Configuration reload failed, keeping current configuration"
                );
                metrics::record_reload("failure");
                status.failures += 1;
                status.last_error = Some(e.to_string());
            }
        }
        self.status.store(Arc::new(status));
        result
    }

    fn load_build_publish(&self) -> Result<u64, ReloadError> {
        self.set_state(ReloadState::Loading);
        let config = self.source.load()?;

        self.set_state(ReloadState::Validating);
        let generation = self.live.generation() + 1;
        let table = build_route_table(&config, &self.registry, self.sink.clone(), generation)?;

        self.set_state(ReloadState::Swapping);
        let previous = self.live.publish(Arc::new(table));

        retire(previous, Duration::from_secs(config.reload.retire_grace_secs));

        Ok(generation)
    }

    /// Run one reload on the blocking pool.
    pub async fn reload(self: &Arc<Self>, origin: ReloadOrigin) -> Result<u64, ReloadError> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.reload_now(origin))
            .await
            .map_err(|e| ReloadError::Task(e.to_string()))?
    }

    /// Consume triggers until shutdown.
    ///
    /// Reloads run one at a time. Everything that arrives while a reload
    /// runs is folded into a single follow-up reload whose outcome goes to
    /// every waiting requester.
    pub async fn run(
        self: Arc<Self>,
        mut requests: mpsc::Receiver<ReloadRequest>,
        mut watcher: Option<mpsc::Receiver<()>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(watching = watcher.is_some(), "Reload coordinator started");

        loop {
            let first = tokio::select! {
                _ = shutdown.recv() => break,

                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },

                trigger = next_trigger(&mut watcher) => match trigger {
                    Some(()) => ReloadRequest {
                        origin: ReloadOrigin::Watcher,
                        respond_to: None,
                    },
                    None => {
                        warn!("Config watcher stopped, reloads now only on explicit request");
                        watcher = None;
                        continue;
                    }
                },
            };

            let mut origin = first.origin;
            let mut waiting: Vec<oneshot::Sender<ReloadOutcome>> =
                first.respond_to.into_iter().collect();

            loop {
                let outcome = self.reload(origin).await.map_err(Arc::new);
                for tx in waiting.drain(..) {
                    let _ = tx.send(outcome.clone());
                }

                let mut follow_up = None;
                while let Ok(request) = requests.try_recv() {
                    follow_up.get_or_insert(request.origin);
                    waiting.extend(request.respond_to);
                }
                if let Some(rx) = watcher.as_mut() {
                    while rx.try_recv().is_ok() {
                        follow_up.get_or_insert(ReloadOrigin::Watcher);
                    }
                }

                match follow_up {
                    Some(next) => {
                        debug!(origin = %next, "Coalesced triggers into one follow-up reload");
                        origin = next;
                    }
                    None => break,
                }
            }
        }

        info!("Reload coordinator stopped");
    }
}

impl fmt::Debug for ReloadCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadCoordinator")
            .field("source", &self.source)
            .field("state", &self.state())
            .field("generation", &self.live.generation())
            .finish()
    }
}

async fn next_trigger(watcher: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match watcher {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
