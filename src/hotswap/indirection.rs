//! Retargeting indirection

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ExportError;
use crate::exports::{Exports, ModuleExports, Value};

/// Current target of an indirection
enum Target {
    Live(ModuleExports),
    /// Explicit sentinel left behind by unload/remove
    Empty,
}

/// Long-lived stand-in for a module's exports.
///
/// Forwards every operation to whatever the target slot holds right now. The
/// `Arc<HotModule>` handed to consumers is never replaced, only its target.
pub struct HotModule {
    path: PathBuf,
    target: RwLock<Target>,
    generation: AtomicU64,
}

impl HotModule {
    pub(crate) fn new(path: PathBuf, exports: ModuleExports) -> Arc<Self> {
        Arc::new(Self {
            path,
            target: RwLock::new(Target::Live(exports)),
            generation: AtomicU64::new(1),
        })
    }

    /// Path of the module this indirection stands for
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of targets installed so far, including the first
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// True once unloaded or removed, until the next retarget
    pub fn is_empty(&self) -> bool {
        matches!(*self.target.read(), Target::Empty)
    }

    /// The exports currently behind the indirection
    pub fn target(&self) -> Option<ModuleExports> {
        match &*self.target.read() {
            Target::Live(exports) => Some(exports.clone()),
            Target::Empty => None,
        }
    }

    pub(crate) fn retarget(&self, exports: ModuleExports) {
        let mut target = self.target.write();
        if let Target::Live(current) = &*target {
            if crate::exports::same_exports(current, &exports) {
                return;
            }
        }
        *target = Target::Live(exports);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn clear(&self) {
        *self.target.write() = Target::Empty;
    }

    fn unloaded(&self) -> ExportError {
        ExportError::Unloaded {
            path: self.path.clone(),
        }
    }
}

impl Exports for HotModule {
    fn get(&self, key: &str) -> Option<Value> {
        self.target().and_then(|t| t.get(key))
    }

    fn set(&self, key: &str, value: Value) -> bool {
        match self.target() {
            Some(t) => t.set(key, value),
            None => false,
        }
    }

    fn has(&self, key: &str) -> bool {
        self.target().map(|t| t.has(key)).unwrap_or(false)
    }

    fn keys(&self) -> Vec<String> {
        self.target().map(|t| t.keys()).unwrap_or_default()
    }

    fn call(&self, key: &str, args: &[Value]) -> Result<Value, ExportError> {
        // The read guard is released before the call so the callee may reload us
        match self.target() {
            Some(t) => t.call(key, args),
            None => Err(self.unloaded()),
        }
    }
}

impl fmt::Debug for HotModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotModule")
            .field("path", &self.path)
            .field("generation", &self.generation())
            .field("empty", &self.is_empty())
            .finish()
    }
}
