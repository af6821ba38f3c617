//! The change watcher: a background task that follows the config file and
//! polls the environment variables that have callbacks.
//!
//! One `tokio::select!` loop multiplexes file-system events, a polling
//! interval and cancellation. File events are logged only; the settings
//! graph is not re-merged. Each tick reads every setting in the
//! [`NotifyRegistry`] from the environment and, depending on
//! [`NotifyMode`], calls its callbacks.
//!
//! The task is owned: [`WatchHandle`] cancels it and waits for it. If the
//! metadata carries a [`TaskTracker`], the task is spawned on it so the
//! application's shutdown can wait for the watcher as well.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::env::Environment;
use crate::error::ClifError;
use crate::registry::NotifyRegistry;
use crate::types::NotifyMode;

/// Handle to a running watcher task.
#[derive(Debug)]
pub struct WatchHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Ask the watcher to stop. Cancelling the token passed to `init` does
    /// the same.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to exit.
    pub async fn join(self) -> Result<(), ClifError> {
        self.task
            .await
            .map_err(|e| ClifError::WatcherFailed(e.to_string()))
    }
}

/// Polls monitored environment variables and runs their callbacks.
#[derive(Debug)]
pub struct ChangeWatcher {
    registry: Arc<NotifyRegistry>,
    environment: Arc<dyn Environment>,
    interval: Duration,
    mode: NotifyMode,
    last_seen: HashMap<String, Option<String>>,
    files: Vec<OsString>,
}

/// What the loop did with one message from the file watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileActivity {
    Changed,
    Removed,
    Ignored,
    Failed,
    Closed,
}

impl ChangeWatcher {
    pub fn new(
        registry: Arc<NotifyRegistry>,
        environment: Arc<dyn Environment>,
        interval: Duration,
        mode: NotifyMode,
    ) -> Self {
        Self {
            registry,
            environment,
            interval,
            mode,
            last_seen: HashMap::new(),
            files: Vec::new(),
        }
    }

    /// Seed the values changes are measured against, typically what the
    /// merge walk saw for each monitored field.
    pub fn with_baseline(
        mut self,
        baseline: impl IntoIterator<Item = (String, Option<String>)>,
    ) -> Self {
        self.last_seen.extend(baseline);
        self
    }

    /// One polling pass. Returns how many callbacks ran.
    ///
    /// In [`NotifyMode::OnChange`] a setting with no recorded value is only
    /// recorded on its first pass, not reported.
    pub fn poll_environment(&mut self) -> usize {
        let mut invoked = 0;
        for (setting, callbacks) in self.registry.snapshot() {
            let current = self.environment.var(&setting).filter(|v| !v.is_empty());
            let notify = match self.mode {
                NotifyMode::EveryTick => true,
                NotifyMode::OnChange => self
                    .last_seen
                    .get(&setting)
                    .is_some_and(|previous| *previous != current),
            };
            self.last_seen.insert(setting.clone(), current.clone());
            if !notify {
                continue;
            }

            tracing::trace!(
                event = "clif.watch.notify",
                setting = %setting,
                callbacks = callbacks.len(),
            );
            for callback in &callbacks {
                callback(&setting, current.as_deref());
            }
            invoked += callbacks.len();
        }
        invoked
    }

    /// Start watching `paths` on the current tokio runtime.
    ///
    /// Directories are watched for events on the files named alongside
    /// them, so a file replaced by an editor save is still seen. Paths that
    /// do not exist or cannot be watched are logged and left out;
    /// environment polling runs regardless.
    pub fn spawn(
        mut self,
        paths: &[PathBuf],
        cancel: &CancellationToken,
        tracker: Option<&TaskTracker>,
    ) -> Result<WatchHandle, ClifError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClifError::NoRuntime)?;
        if self.interval.is_zero() {
            return Err(crate::configuration::zero_interval());
        }
        self.files = paths
            .iter()
            .filter(|path| !path.is_dir())
            .filter_map(|path| path.file_name().map(|name| name.to_os_string()))
            .collect();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        })?;
        for path in paths {
            if !path.exists() {
                tracing::debug!(
                    event = "clif.watch.path_missing",
                    path = %path.display(),
                );
                continue;
            }
            if let Err(e) = watcher.watch(path, RecursiveMode::NonRecursive) {
                tracing::warn!(
                    event = "clif.watch.path_failed",
                    path = %path.display(),
                    error = %e,
                );
            }
        }

        let cancel = cancel.child_token();
        let run = self.run(watcher, event_rx, cancel.clone());
        let task = match tracker {
            Some(tracker) => tracker.spawn_on(run, &runtime),
            None => runtime.spawn(run),
        };
        Ok(WatchHandle { cancel, task })
    }

    async fn run(
        mut self,
        watcher: RecommendedWatcher,
        mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
        cancel: CancellationToken,
    ) {
        tracing::debug!(
            event = "clif.watch.started",
            interval_ms = self.interval.as_millis() as u64,
            mode = ?self.mode,
        );
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                message = events.recv(), if events_open => {
                    if self.on_file_event(message) == FileActivity::Closed {
                        events_open = false;
                    }
                }
                _ = ticker.tick() => {
                    let invoked = self.poll_environment();
                    tracing::trace!(event = "clif.watch.tick", invoked);
                }
            }
        }
        drop(watcher);
        tracing::debug!(event = "clif.watch.stopped");
    }
}

impl ChangeWatcher {
    fn on_file_event(&self, message: Option<notify::Result<Event>>) -> FileActivity {
        let event = match message {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                tracing::warn!(event = "clif.watch.error", error = %e);
                return FileActivity::Failed;
            }
            None => {
                tracing::debug!(event = "clif.watch.events_closed");
                return FileActivity::Closed;
            }
        };

        let Some(path) = event.paths.iter().find(|path| {
            path.file_name()
                .is_some_and(|name| self.files.iter().any(|file| file == name))
        }) else {
            tracing::trace!(event = "clif.watch.file_event", kind = ?event.kind);
            return FileActivity::Ignored;
        };
        match event.kind {
            EventKind::Modify(_) | EventKind::Create(_) => {
                tracing::info!(
                    event = "clif.watch.file_changed",
                    path = %path.display(),
                    "config file changed; restart to apply"
                );
                FileActivity::Changed
            }
            EventKind::Remove(_) => {
                tracing::warn!(event = "clif.watch.file_removed", path = %path.display());
                FileActivity::Removed
            }
            _ => {
                tracing::trace!(event = "clif.watch.file_event", path = %path.display(), kind = ?event.kind);
                FileActivity::Ignored
            }
        }
    }
}
