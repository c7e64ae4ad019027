//! Host integration points
//!
//! The host runtime supplies execution of compiled text and the process-wide
//! module cache. Both are traits so the engine can be embedded in any host
//! and driven by in-memory fakes in tests.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::HotloadResult;
use crate::exports::ModuleExports;
use crate::models::CompiledModule;

/// What the host executes: compiled code bound to its translated path
#[derive(Debug, Clone, Copy)]
pub struct ExecutionUnit<'a> {
    /// The source unit the code came from
    pub source_path: &'a Path,
    /// The translated path traces and source maps refer to
    pub output_path: &'a Path,
    pub code: &'a str,
    pub source_map: Option<&'a str>,
}

impl<'a> ExecutionUnit<'a> {
    pub fn from_compiled(compiled: &'a CompiledModule) -> Self {
        Self {
            source_path: &compiled.source_path,
            output_path: &compiled.output_path,
            code: &compiled.code,
            source_map: compiled.source_map.as_deref(),
        }
    }
}

/// Re-entrant module loading handed to executing code
pub trait Require {
    fn require(&self, request: &str, parent: &Path) -> HotloadResult<ModuleExports>;
}

/// `Require` for code that must not load anything else
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRequire;

impl Require for NoRequire {
    fn require(&self, request: &str, parent: &Path) -> HotloadResult<ModuleExports> {
        Err(crate::error::HotloadError::ModuleNotFound {
            request: request.to_string(),
            parent: Some(parent.to_path_buf()),
        })
    }
}

/// Runs compiled text and produces the module's exports
pub trait ModuleExecutor: Send + Sync {
    fn execute(
        &self,
        unit: &ExecutionUnit<'_>,
        loader: &dyn Require,
    ) -> anyhow::Result<ModuleExports>;
}

/// State the suffix handler fills in for one load
#[derive(Clone)]
pub struct ModuleRecord {
    pub path: PathBuf,
    pub exports: Option<ModuleExports>,
    pub loaded: bool,
}

impl ModuleRecord {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            exports: None,
            loaded: false,
        }
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("path", &self.path)
            .field("loaded", &self.loaded)
            .finish()
    }
}

/// Process-wide cache of executed modules keyed by resolved path
pub trait ModuleCache: Send + Sync {
    fn get(&self, path: &Path) -> Option<ModuleExports>;
    fn insert(&self, path: &Path, exports: ModuleExports);
    /// Evict; returns whether an entry existed
    fn remove(&self, path: &Path) -> bool;
    fn contains(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }
    fn clear(&self);
}

/// Default `ModuleCache`
#[derive(Default)]
pub struct InMemoryModuleCache {
    modules: Mutex<HashMap<PathBuf, ModuleExports>>,
}

impl InMemoryModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modules.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.lock().is_empty()
    }
}

impl ModuleCache for InMemoryModuleCache {
    fn get(&self, path: &Path) -> Option<ModuleExports> {
        self.modules.lock().get(path).cloned()
    }

    fn insert(&self, path: &Path, exports: ModuleExports) {
        self.modules.lock().insert(path.to_path_buf(), exports);
    }

    fn remove(&self, path: &Path) -> bool {
        self.modules.lock().remove(path).is_some()
    }

    fn contains(&self, path: &Path) -> bool {
        self.modules.lock().contains_key(path)
    }

    fn clear(&self) {
        self.modules.lock().clear();
    }
}

impl fmt::Debug for InMemoryModuleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<PathBuf> = self.modules.lock().keys().cloned().collect();
        keys.sort();
        f.debug_struct("InMemoryModuleCache")
            .field("modules", &keys)
            .finish()
    }
}
