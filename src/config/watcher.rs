//! Configuration file watcher for hot reload.
//!
//! Editors save files in bursts (truncate, write, rename, chmod), so raw
//! filesystem events are collapsed into a single trigger once the watched
//! paths have been quiet for the configured period.
//!
//! The main file is watched through its parent directory so that atomic
//! rename-over saves keep being observed.

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("nothing to watch")]
    NothingToWatch,

    #[error("cannot watch {}: {source}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watch backend: {0}")]
    Backend(#[from] notify::Error),
}

/// Debounce state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Debounce {
    Idle,
    Armed { deadline: Instant },
}

/// Watches the config file and overlay directory, emitting one trigger per
/// burst of changes.
pub struct ConfigWatcher {
    // Dropping the notify watcher removes the OS watches.
    watcher: Option<RecommendedWatcher>,
    close_tx: Option<oneshot::Sender<()>>,
}

impl ConfigWatcher {
    /// Start watching.
    ///
    /// Returns the watcher and a receiver that yields `()` once per settled
    /// burst of changes. Must be called inside a tokio runtime.
    pub fn new(
        file: Option<&Path>,
        overlay_dir: Option<&Path>,
        quiet_period: Duration,
    ) -> Result<(Self, mpsc::Receiver<()>), WatcherError> {
        if file.is_none() && overlay_dir.is_none() {
            return Err(WatcherError::NothingToWatch);
        }

        let file = file.map(resolve_file).transpose()?;
        let overlay_dir = overlay_dir.map(canonical).transpose()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = event_tx.send(res);
            },
            Config::default(),
        )?;

        if let Some((dir, _)) = &file {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }
        if let Some(dir) = &overlay_dir {
            if file.as_ref().map(|(d, _)| d) != Some(dir) {
                watcher.watch(dir, RecursiveMode::NonRecursive)?;
            }
        }

        let filter = RelevantPaths { file, overlay_dir };
        info!(
            file = ?filter.file.as_ref().map(|(d, n)| d.join(n)),
            overlay_dir = ?filter.overlay_dir,
            quiet_ms = quiet_period.as_millis() as u64,
            "Config watcher started"
        );

        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (close_tx, close_rx) = oneshot::channel();
        tokio::spawn(debounce(
            event_rx,
            trigger_tx,
            quiet_period,
            close_rx,
            move |event| filter.matches(event),
        ));

        Ok((
            Self {
                watcher: Some(watcher),
                close_tx: Some(close_tx),
            },
            trigger_rx,
        ))
    }

    /// Stop watching. Safe to call more than once.
    pub fn close(&mut self) {
        self.watcher = None;
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
            debug!("Config watcher closed");
        }
    }

    /// Whether the OS watch is still installed.
    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("watching", &self.is_watching())
            .field("closed", &self.close_tx.is_none())
            .finish()
    }
}

fn canonical(path: &Path) -> Result<PathBuf, WatcherError> {
    path.canonicalize().map_err(|source| WatcherError::Path {
        path: path.to_path_buf(),
        source,
    })
}

/// Split a file path into its canonical parent directory and file name.
fn resolve_file(path: &Path) -> Result<(PathBuf, OsString), WatcherError> {
    let name = path.file_name().ok_or_else(|| WatcherError::Path {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
    })?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Ok((canonical(parent)?, name.to_os_string()))
}

struct RelevantPaths {
    file: Option<(PathBuf, OsString)>,
    overlay_dir: Option<PathBuf>,
}

impl RelevantPaths {
    fn matches(&self, event: &Event) -> bool {
        if !is_relevant_kind(&event.kind) {
            return false;
        }
        event.paths.iter().any(|path| {
            let in_overlay = self
                .overlay_dir
                .as_ref()
                .is_some_and(|dir| path.parent() == Some(dir.as_path()) || path == dir);
            let is_file = self
                .file
                .as_ref()
                .is_some_and(|(dir, name)| path.parent() == Some(dir.as_path()) && path.file_name() == Some(name.as_os_str()));
            in_overlay || is_file
        })
    }
}

/// Create, content/name modification, and removal are relevant. Access and
/// metadata-only changes are not.
pub fn is_relevant_kind(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

/// Collapse relevant events into triggers.
///
/// Every relevant event pushes the deadline out to `now + quiet`. When the
/// deadline passes with no further events, one trigger is sent. If a trigger
/// is already pending the new one is coalesced into it. A backend error
/// stops the loop; the receiver then sees the channel close.
pub async fn debounce<F>(
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    triggers: mpsc::Sender<()>,
    quiet: Duration,
    mut close: oneshot::Receiver<()>,
    is_relevant: F,
) where
    F: Fn(&Event) -> bool + Send + 'static,
{
    let mut state = Debounce::Idle;

    loop {
        let deadline = match state {
            Debounce::Armed { deadline } => Some(deadline),
            Debounce::Idle => None,
        };

        tokio::select! {
            biased;

            _ = &mut close => break,

            _ = async {
                match deadline {
                    Some(d) => sleep_until(d).await,
                    None => std::future::pending().await,
                }
            } => {
                state = Debounce::Idle;
                match triggers.try_send(()) {
                    Ok(()) => debug!("Config change settled, reload triggered"),
                    Err(mpsc::error::TrySendError::Full(())) => {
                        debug!("Reload already pending, change coalesced");
                    }
                    Err(mpsc::error::TrySendError::Closed(())) => break,
                }
            }

            event = events.recv() => match event {
                Some(Ok(event)) => {
                    if is_relevant(&event) {
                        debug!(kind = ?event.kind, paths = ?event.paths, "Config change observed");
                        state = Debounce::Armed {
                            deadline: Instant::now() + quiet,
                        };
                    }
                }
                Some(Err(e)) => {
                    flush_pending(state, &triggers);
                    warn!(error = %e, "Config watcher degraded, automatic reload disabled");
                    break;
                }
                None => {
                    flush_pending(state, &triggers);
                    break;
                }
            },
        }
    }
}

/// Emit the trigger owed to an armed deadline before the relay exits.
fn flush_pending(state: Debounce, triggers: &mpsc::Sender<()>) {
    if let Debounce::Armed { .. } = state {
        if triggers.try_send(()).is_ok() {
            debug!("Pending config change flushed before watcher stopped");
        }
    }
}
