//! Watch event types, the public change stream and debounce state

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// Debounce duration in milliseconds
pub const DEBOUNCE_MS: u64 = 100;

/// Kind of a raw file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawEventKind {
    Added,
    Changed,
    Removed,
}

impl RawEventKind {
    /// Merge two events for the same path seen inside one debounce window.
    pub fn coalesce(self, next: RawEventKind) -> RawEventKind {
        match (self, next) {
            // Still new to whoever consumes the batch
            (RawEventKind::Added, RawEventKind::Changed) => RawEventKind::Added,
            // Atomic save: delete then recreate
            (RawEventKind::Removed, RawEventKind::Added) => RawEventKind::Changed,
            (_, next) => next,
        }
    }
}

/// One file system event as delivered by a watch service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    pub path: PathBuf,
}

impl RawEvent {
    pub fn added(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: RawEventKind::Added,
            path: path.into(),
        }
    }

    pub fn changed(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: RawEventKind::Changed,
            path: path.into(),
        }
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: RawEventKind::Removed,
            path: path.into(),
        }
    }
}

/// Public change stream item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ChangeEvent {
    Added { path: PathBuf },
    Changed { path: PathBuf },
    Removed { path: PathBuf },
    /// First execution of a freshly compiled path
    RequiredAfter { path: PathBuf },
}

impl ChangeEvent {
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Added { path }
            | ChangeEvent::Changed { path }
            | ChangeEvent::Removed { path }
            | ChangeEvent::RequiredAfter { path } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::Added { .. } => "added",
            ChangeEvent::Changed { .. } => "changed",
            ChangeEvent::Removed { .. } => "removed",
            ChangeEvent::RequiredAfter { .. } => "required-after",
        }
    }

    /// One NDJSON line
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.path().display())
    }
}

/// Change stream subscriber
pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Handle returned by `ChangeStream::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Fan-out of change events to registered listeners.
///
/// Listeners are called without any lock held, so a listener may subscribe,
/// unsubscribe or re-enter the loader.
#[derive(Default)]
pub struct ChangeStream {
    listeners: Mutex<Vec<(SubscriberId, ChangeListener)>>,
    next_id: Mutex<u64>,
}

impl ChangeStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            SubscriberId(*next)
        };
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn emit(&self, event: &ChangeEvent) {
        let listeners: Vec<ChangeListener> =
            self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        tracing::debug!(event = event.name(), path = %event.path().display(), listeners = listeners.len(), "change event");
        for listener in listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

impl fmt::Debug for ChangeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeStream")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Watcher state for debouncing
pub(crate) struct WatcherState {
    pending: HashMap<PathBuf, RawEventKind>,
    /// First-seen order of pending paths
    order: Vec<PathBuf>,
    last_change: Option<Instant>,
    debounce: Duration,
}

impl WatcherState {
    pub(crate) fn new(debounce: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            order: Vec::new(),
            last_change: None,
            debounce,
        }
    }

    pub(crate) fn add_change(&mut self, path: PathBuf, kind: RawEventKind) {
        match self.pending.get_mut(&path) {
            Some(existing) => *existing = existing.coalesce(kind),
            None => {
                self.order.push(path.clone());
                self.pending.insert(path, kind);
            }
        }
        self.last_change = Some(Instant::now());
    }

    pub(crate) fn should_flush(&self) -> bool {
        match self.last_change {
            Some(last) => !self.pending.is_empty() && last.elapsed() >= self.debounce,
            None => false,
        }
    }

    pub(crate) fn take_changes(&mut self) -> Vec<RawEvent> {
        let mut pending = std::mem::take(&mut self.pending);
        self.last_change = None;
        self.order
            .drain(..)
            .filter_map(|path| {
                let kind = pending.remove(&path)?;
                Some(RawEvent { kind, path })
            })
            .collect()
    }
}
