//! Setting name → notification callbacks.
//!
//! The only structure shared between the foreground and the watcher task.
//! Every access takes the one mutex; the watcher copies the callback lists
//! out before calling them, so a callback may register further callbacks
//! without deadlocking.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Callback invoked with `(setting, value)`. `value` is `None` when the
/// setting's environment variable is unset.
pub type NotifyFn = Arc<dyn Fn(&str, Option<&str>) + Send + Sync>;

#[derive(Default)]
struct Inner {
    callbacks: BTreeMap<String, Vec<NotifyFn>>,
    monitored: BTreeSet<String>,
}

#[derive(Default)]
pub struct NotifyRegistry {
    inner: Mutex<Inner>,
}

impl NotifyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking callback never runs under this lock, so the map is
        // consistent even if poisoned.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `callback` to `setting`'s list. Callbacks are never removed.
    pub fn register(&self, setting: &str, callback: NotifyFn) {
        let mut inner = self.lock();
        if !inner.monitored.is_empty() && !inner.monitored.contains(setting) {
            tracing::debug!(
                event = "clif.registry.unmonitored",
                setting = setting,
                "registered callback for a setting no field marks as monitored"
            );
        }
        inner
            .callbacks
            .entry(setting.to_string())
            .or_default()
            .push(callback);
    }

    /// Every setting with at least one callback, each with a copy of its
    /// callback list in registration order.
    pub fn snapshot(&self) -> Vec<(String, Vec<NotifyFn>)> {
        self.lock()
            .callbacks
            .iter()
            .map(|(setting, callbacks)| (setting.clone(), callbacks.clone()))
            .collect()
    }

    pub fn settings(&self) -> Vec<String> {
        self.lock().callbacks.keys().cloned().collect()
    }

    pub fn callback_count(&self, setting: &str) -> usize {
        self.lock().callbacks.get(setting).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().callbacks.is_empty()
    }

    /// Record the names of the fields marked monitored by the last walk.
    pub(crate) fn set_monitored(&self, names: impl IntoIterator<Item = String>) {
        self.lock().monitored = names.into_iter().collect();
    }

    pub fn monitored(&self) -> Vec<String> {
        self.lock().monitored.iter().cloned().collect()
    }
}

impl fmt::Debug for NotifyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("NotifyRegistry")
            .field("settings", &inner.callbacks.keys().collect::<Vec<_>>())
            .field("monitored", &inner.monitored)
            .finish()
    }
}
