//! Source registry
//!
//! Per-path compilation state keyed by canonical path. The set of keys is the
//! root set: everything scanned at startup plus every file discovered lazily
//! or through an `added` event.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::hash::ContentHash;
use crate::models::{CompiledModule, SourceFile};

/// Owns every `SourceFile` and the parse snapshots the compiler reads from.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    files: BTreeMap<PathBuf, SourceFile>,
    /// Last text read from disk per path; dropped when a change is observed
    snapshots: BTreeMap<PathBuf, Arc<str>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path at `version` unless it is already registered.
    ///
    /// Returns true when a new entry was created.
    pub fn insert(&mut self, path: &Path, version: u64) -> bool {
        if self.files.contains_key(path) {
            return false;
        }
        self.files
            .insert(path.to_path_buf(), SourceFile::new(path.to_path_buf(), version));
        true
    }

    pub fn get(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(path)
    }

    pub(crate) fn get_mut(&mut self, path: &Path) -> Option<&mut SourceFile> {
        self.files.get_mut(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn version(&self, path: &Path) -> Option<u64> {
        self.files.get(path).map(|f| f.version)
    }

    pub fn content_hash(&self, path: &Path) -> Option<&ContentHash> {
        self.files.get(path).and_then(|f| f.content_hash.as_ref())
    }

    pub fn compiled(&self, path: &Path) -> Option<CompiledModule> {
        self.files.get(path).and_then(SourceFile::compiled)
    }

    pub fn source_map(&self, path: &Path) -> Option<Arc<str>> {
        self.files.get(path).and_then(|f| f.source_map.clone())
    }

    /// Bump the version for an observed change. Returns the new version.
    pub fn bump_version(&mut self, path: &Path) -> Option<u64> {
        let file = self.files.get_mut(path)?;
        file.version += 1;
        Some(file.version)
    }

    /// Record an execution; returns true the first time, when
    /// `required-after` is due.
    pub fn mark_executed(&mut self, path: &Path) -> bool {
        match self.files.get_mut(path) {
            Some(file) => {
                file.executed = true;
                file.reload_pending = false;
                let first = !file.announced;
                file.announced = true;
                first
            }
            None => false,
        }
    }

    pub fn is_executed(&self, path: &Path) -> bool {
        self.files.get(path).map(|f| f.executed).unwrap_or(false)
    }

    pub fn is_reload_pending(&self, path: &Path) -> bool {
        self.files.get(path).map(|f| f.reload_pending).unwrap_or(false)
    }

    // === Parse snapshots ===

    /// Current text for `path`: the cached snapshot, else a fresh disk read.
    pub fn read_source(&mut self, path: &Path) -> std::io::Result<Arc<str>> {
        if let Some(snapshot) = self.snapshots.get(path) {
            return Ok(snapshot.clone());
        }
        let text: Arc<str> = Arc::from(std::fs::read_to_string(path)?);
        self.snapshots.insert(path.to_path_buf(), text.clone());
        Ok(text)
    }

    pub fn drop_snapshot(&mut self, path: &Path) -> bool {
        self.snapshots.remove(path).is_some()
    }

    pub fn has_snapshot(&self, path: &Path) -> bool {
        self.snapshots.contains_key(path)
    }

    /// Forget a path entirely: contents, hash, snapshot and source map.
    pub fn remove(&mut self, path: &Path) -> Option<SourceFile> {
        self.snapshots.remove(path);
        self.files.remove(path)
    }

    /// Root set in path order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.snapshots.clear();
    }
}
