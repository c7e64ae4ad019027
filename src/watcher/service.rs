//! Watch services
//!
//! A watch service turns a directory subtree into a stream of
//! `WatchMessage`s. `NotifyWatchService` is the production implementation,
//! built on `notify` with a per-subscription debounce thread.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;

use crate::error::{HotloadError, HotloadResult};
use crate::fs::canonical;
use crate::patterns::PatternSet;

use super::event::{RawEvent, RawEventKind, WatcherState, DEBOUNCE_MS};

/// Poll interval of the debounce loop
const POLL_MS: u64 = 50;

/// Messages a subscription sends to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchMessage {
    /// The directory is being observed; events before this are discarded
    Ready { dir: PathBuf },
    Event(RawEvent),
    /// The subscription failed and will not deliver further events
    Error { dir: PathBuf, message: String },
}

/// An open watch on one directory
pub trait WatchSubscription: Send {
    fn dir(&self) -> &Path;

    /// Extend the include patterns of a running watch.
    fn add_patterns(&mut self, patterns: &[String]) -> HotloadResult<()>;

    /// Release OS resources. Idempotent.
    fn close(&mut self);
}

/// Directory subtree → stream of added/changed/removed events
pub trait WatchService: Send + Sync {
    /// Start watching `dir`. Only paths matching `patterns` are reported.
    fn watch(
        &self,
        dir: &Path,
        recursive: bool,
        patterns: &[String],
        sender: Sender<WatchMessage>,
    ) -> HotloadResult<Box<dyn WatchSubscription>>;
}

/// `WatchService` backed by the platform's `notify` watcher.
#[derive(Debug, Clone)]
pub struct NotifyWatchService {
    debounce: Duration,
}

impl Default for NotifyWatchService {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEBOUNCE_MS),
        }
    }
}

impl NotifyWatchService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debounce(debounce: Duration) -> Self {
        Self { debounce }
    }
}

fn watch_error(dir: &Path, e: impl fmt::Display) -> HotloadError {
    HotloadError::Watch {
        path: dir.to_path_buf(),
        message: e.to_string(),
    }
}

impl WatchService for NotifyWatchService {
    fn watch(
        &self,
        dir: &Path,
        recursive: bool,
        patterns: &[String],
        sender: Sender<WatchMessage>,
    ) -> HotloadResult<Box<dyn WatchSubscription>> {
        let dir = canonical(dir);
        let filter = Arc::new(RwLock::new(PatternSet::new(&dir, patterns)?));

        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )
        .map_err(|e| watch_error(&dir, e))?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&dir, mode).map_err(|e| watch_error(&dir, e))?;

        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let running = running.clone();
            let filter = filter.clone();
            let thread_dir = dir.clone();
            let debounce = self.debounce;
            std::thread::Builder::new()
                .name("hotload-watch".to_string())
                .spawn(move || {
                    if sender.send(WatchMessage::Ready { dir: thread_dir.clone() }).is_err() {
                        return;
                    }
                    let mut state = WatcherState::new(debounce);

                    while running.load(Ordering::SeqCst) {
                        match rx.recv_timeout(Duration::from_millis(POLL_MS)) {
                            Ok(Ok(event)) => {
                                let filter = filter.read();
                                for (path, kind) in classify(&event) {
                                    if filter.matches(&path) {
                                        state.add_change(canonical(&path), kind);
                                    }
                                }
                            }
                            Ok(Err(e)) => {
                                tracing::error!(dir = %thread_dir.display(), error = %e, "watcher failed");
                                let _ = sender.send(WatchMessage::Error {
                                    dir: thread_dir.clone(),
                                    message: e.to_string(),
                                });
                                return;
                            }
                            Err(RecvTimeoutError::Timeout) => {}
                            Err(RecvTimeoutError::Disconnected) => break,
                        }

                        if state.should_flush() {
                            for event in state.take_changes() {
                                if sender.send(WatchMessage::Event(event)).is_err() {
                                    return;
                                }
                            }
                        }
                    }
                })
                .map_err(|e| watch_error(&dir, e))?
        };

        tracing::debug!(dir = %dir.display(), recursive, "watch started");
        Ok(Box::new(NotifySubscription {
            dir,
            watcher: Some(watcher),
            filter,
            running,
            handle: Some(handle),
        }))
    }
}

/// Map a `notify` event to per-path raw kinds.
fn classify(event: &Event) -> Vec<(PathBuf, RawEventKind)> {
    let kind = match event.kind {
        EventKind::Create(_) => RawEventKind::Added,
        EventKind::Remove(_) => RawEventKind::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => RawEventKind::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => RawEventKind::Added,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::new();
            if let Some(from) = event.paths.first() {
                out.push((from.clone(), RawEventKind::Removed));
            }
            if let Some(to) = event.paths.get(1) {
                out.push((to.clone(), RawEventKind::Added));
            }
            return out;
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            return event
                .paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() {
                        RawEventKind::Added
                    } else {
                        RawEventKind::Removed
                    };
                    (p.clone(), kind)
                })
                .collect();
        }
        EventKind::Modify(_) => RawEventKind::Changed,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
    };
    event.paths.iter().map(|p| (p.clone(), kind)).collect()
}

struct NotifySubscription {
    dir: PathBuf,
    watcher: Option<RecommendedWatcher>,
    filter: Arc<RwLock<PatternSet>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl WatchSubscription for NotifySubscription {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn add_patterns(&mut self, patterns: &[String]) -> HotloadResult<()> {
        let mut filter = self.filter.write();
        let mut combined = filter.patterns().to_vec();
        combined.extend(patterns.iter().cloned());
        *filter = PatternSet::new(&self.dir, &combined)?;
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Dropping the watcher disconnects the raw channel
        self.watcher.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            tracing::debug!(dir = %self.dir.display(), "watch closed");
        }
    }
}

impl Drop for NotifySubscription {
    fn drop(&mut self) {
        self.close();
    }
}
