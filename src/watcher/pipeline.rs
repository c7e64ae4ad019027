//! Watch event pipeline
//!
//! Owns one subscription per watched directory and turns raw events into
//! registry updates. Change events are returned to the caller instead of
//! being emitted here, so no lock is held while subscribers run.

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use crate::context::Engine;
use crate::error::{HotloadError, HotloadResult};
use crate::fs::{canonical, top_level_dir};

use super::event::{ChangeEvent, RawEvent, RawEventKind};
use super::service::{WatchMessage, WatchService, WatchSubscription};

/// Per-directory watch state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirState {
    /// Subscribed, waiting for the service to report ready
    Idle,
    /// Events are processed
    Active,
}

struct WatchedDir {
    recursive: bool,
    state: DirState,
    subscription: Box<dyn WatchSubscription>,
}

pub struct WatchPipeline {
    root: PathBuf,
    dirs: BTreeMap<PathBuf, WatchedDir>,
}

impl WatchPipeline {
    /// The root itself (non-recursive) plus each top-level directory that
    /// holds a root-set file (recursive).
    pub fn watched_dirs(root: &Path, files: &[PathBuf]) -> Vec<(PathBuf, bool)> {
        let mut dirs: BTreeMap<PathBuf, bool> = BTreeMap::new();
        dirs.insert(root.to_path_buf(), false);
        for file in files {
            if let Some(dir) = top_level_dir(root, file) {
                dirs.insert(dir, true);
            }
        }
        dirs.into_iter().collect()
    }

    /// Subscribe every watched directory. All start `Idle`.
    pub fn start(
        root: &Path,
        files: &[PathBuf],
        service: &dyn WatchService,
        patterns: &[String],
        sender: &Sender<WatchMessage>,
    ) -> HotloadResult<Self> {
        let mut dirs = BTreeMap::new();
        for (dir, recursive) in Self::watched_dirs(root, files) {
            let subscription = service.watch(&dir, recursive, patterns, sender.clone())?;
            dirs.insert(
                dir,
                WatchedDir {
                    recursive,
                    state: DirState::Idle,
                    subscription,
                },
            );
        }
        tracing::debug!(root = %root.display(), dirs = dirs.len(), "watch pipeline started");
        Ok(Self {
            root: root.to_path_buf(),
            dirs,
        })
    }

    pub fn state(&self, dir: &Path) -> Option<DirState> {
        self.dirs.get(dir).map(|d| d.state)
    }

    pub fn dirs(&self) -> Vec<PathBuf> {
        self.dirs.keys().cloned().collect()
    }

    /// Watched directory responsible for `path`
    fn owner(&self, path: &Path) -> Option<&WatchedDir> {
        if let Some(dir) = top_level_dir(&self.root, path) {
            return self.dirs.get(&dir).filter(|d| d.recursive);
        }
        match path.parent() {
            Some(parent) if parent == self.root => self.dirs.get(&self.root),
            _ => None,
        }
    }

    /// Extend include patterns on every running subscription.
    pub fn add_patterns(&mut self, patterns: &[String]) -> HotloadResult<()> {
        for watched in self.dirs.values_mut() {
            watched.subscription.add_patterns(patterns)?;
        }
        Ok(())
    }

    /// Process one message from a subscription.
    pub(crate) fn handle(
        &mut self,
        message: WatchMessage,
        engine: &Engine,
    ) -> HotloadResult<Option<ChangeEvent>> {
        match message {
            WatchMessage::Ready { dir } => {
                let dir = canonical(&dir);
                if let Some(watched) = self.dirs.get_mut(&dir) {
                    watched.state = DirState::Active;
                    tracing::info!(dir = %dir.display(), recursive = watched.recursive, "watching");
                }
                Ok(None)
            }
            WatchMessage::Error { dir, message } => {
                tracing::error!(dir = %dir.display(), %message, "watch service error");
                Err(HotloadError::Watch { path: dir, message })
            }
            WatchMessage::Event(raw) => {
                let path = canonical(&raw.path);
                match self.owner(&path).map(|d| d.state) {
                    Some(DirState::Active) => apply_event(engine, raw.kind, path),
                    _ => {
                        tracing::debug!(path = %path.display(), "discarding event for inactive directory");
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Close every subscription.
    pub fn close(&mut self) {
        for watched in self.dirs.values_mut() {
            watched.subscription.close();
        }
        self.dirs.clear();
    }
}

impl Drop for WatchPipeline {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for WatchPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let states: Vec<(&PathBuf, DirState)> =
            self.dirs.iter().map(|(dir, w)| (dir, w.state)).collect();
        f.debug_struct("WatchPipeline")
            .field("root", &self.root)
            .field("dirs", &states)
            .finish()
    }
}

/// Apply one event from an active directory.
pub(crate) fn apply_event(
    engine: &Engine,
    kind: RawEventKind,
    path: PathBuf,
) -> HotloadResult<Option<ChangeEvent>> {
    if engine.exclusions.matches(&path) || !engine.resolver.is_source(&path) {
        tracing::debug!(path = %path.display(), "ignoring excluded path");
        return Ok(None);
    }

    let known = engine.compiler.lock().registry().contains(&path);
    let result = match (kind, known) {
        (RawEventKind::Removed, _) => return Ok(Some(remove_path(engine, path))),
        (RawEventKind::Changed, true) | (RawEventKind::Added, true) => change_path(engine, &path),
        (_, false) => add_path(engine, &path),
    };

    match result {
        Ok(event) => Ok(event),
        // Deleted between the event and the read
        Err(HotloadError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            Ok(known.then(|| remove_path(engine, path)))
        }
        Err(e) => Err(e),
    }
}

fn add_path(engine: &Engine, path: &Path) -> HotloadResult<Option<ChangeEvent>> {
    let mut compiler = engine.compiler.lock();
    compiler.registry_mut().insert(path, 1);
    if let Err(e) = compiler.compile(path) {
        compiler.registry_mut().remove(path);
        return Err(e);
    }
    tracing::debug!(path = %path.display(), "added to root set");
    Ok(Some(ChangeEvent::Added {
        path: path.to_path_buf(),
    }))
}

fn change_path(engine: &Engine, path: &Path) -> HotloadResult<Option<ChangeEvent>> {
    let (hash_changed, evict) = {
        let mut compiler = engine.compiler.lock();
        let registry = compiler.registry_mut();
        registry.drop_snapshot(path);
        let previous_version = registry.version(path);
        registry.bump_version(path);
        let previous = registry.content_hash(path).cloned();

        let outcome = match compiler.compile(path) {
            Ok(outcome) => outcome,
            Err(e) => {
                // The stored output still belongs to the previous version
                if let (Some(file), Some(version)) =
                    (compiler.registry_mut().get_mut(path), previous_version)
                {
                    file.version = version;
                }
                return Err(e);
            }
        };
        let current = compiler.registry().content_hash(path);
        (current != previous.as_ref(), outcome.reload_marked)
    };

    if evict && engine.cache.remove(path) {
        tracing::debug!(path = %path.display(), "evicted from module cache");
    }
    Ok(hash_changed.then(|| ChangeEvent::Changed {
        path: path.to_path_buf(),
    }))
}

fn remove_path(engine: &Engine, path: PathBuf) -> ChangeEvent {
    engine.hot.remove(&path);
    engine.cache.remove(&path);
    engine.compiler.lock().registry_mut().remove(&path);
    tracing::debug!(path = %path.display(), "removed from root set");
    ChangeEvent::Removed { path }
}
