//! Path to indirection map

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::exports::ModuleExports;

use super::indirection::HotModule;

/// Owns one `HotModule` per loaded path.
#[derive(Debug, Default)]
pub struct HotSwapRegistry {
    entries: Mutex<HashMap<PathBuf, Arc<HotModule>>>,
}

impl HotSwapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap freshly produced exports for `path`.
    ///
    /// The first call creates the indirection. Later calls retarget the
    /// existing one and return it, so every caller gets the same handle.
    pub fn wrap(&self, path: &Path, exports: ModuleExports) -> Arc<HotModule> {
        let mut entries = self.entries.lock();
        match entries.get(path) {
            Some(existing) => {
                existing.retarget(exports);
                tracing::debug!(
                    path = %path.display(),
                    generation = existing.generation(),
                    "retargeted hot module"
                );
                existing.clone()
            }
            None => {
                let module = HotModule::new(path.to_path_buf(), exports);
                entries.insert(path.to_path_buf(), module.clone());
                module
            }
        }
    }

    /// Point the indirection at the empty sentinel, keeping the entry.
    pub fn unload(&self, path: &Path) -> bool {
        match self.entries.lock().get(path) {
            Some(module) => {
                module.clear();
                true
            }
            None => false,
        }
    }

    /// Empty the indirection and forget the entry.
    ///
    /// Holders of the old handle keep getting empty results.
    pub fn remove(&self, path: &Path) -> bool {
        match self.entries.lock().remove(path) {
            Some(module) => {
                module.clear();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, path: &Path) -> Option<Arc<HotModule>> {
        self.entries.lock().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.lock().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Empty every indirection and drop all entries
    pub fn clear(&self) {
        for (_, module) in self.entries.lock().drain() {
            module.clear();
        }
    }
}
