//! Module load interceptor
//!
//! Every module load goes through here: request resolution, lazy compilation
//! of paths the initial scan never saw, execution with the stub-or-fatal
//! policy, the host cache, and (while watching) hot-swap wrapping.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::Ordering;

use crate::config::RuntimeMode;
use crate::context::Engine;
use crate::error::{HotloadError, HotloadResult};
use crate::exports::ModuleExports;
use crate::fs::canonical;
use crate::host::{ExecutionUnit, ModuleRecord, Require};
use crate::models::CompiledModule;
use crate::watcher::ChangeEvent;

/// Resolves and loads modules on behalf of the host.
///
/// Handed to executing code as its `Require`, so nested loads re-enter here.
#[derive(Clone, Copy)]
pub struct ModuleLoadInterceptor<'ctx> {
    engine: &'ctx Engine,
}

impl<'ctx> ModuleLoadInterceptor<'ctx> {
    pub(crate) fn new(engine: &'ctx Engine) -> Self {
        Self { engine }
    }

    /// Resolve `request` to a canonical source path.
    ///
    /// Relative requests (`./`, `../`) resolve against the parent's directory,
    /// everything else against the project root. Tried in order: the exact
    /// file, each registered extension appended, then `index` files.
    pub fn resolve(&self, request: &str, parent: Option<&Path>) -> HotloadResult<PathBuf> {
        let requested = Path::new(request);
        let is_relative = matches!(
            requested.components().next(),
            Some(Component::CurDir) | Some(Component::ParentDir)
        );
        let base = match parent {
            Some(parent) if is_relative => parent
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.engine.config.project_root.clone()),
            _ => self.engine.config.project_root.clone(),
        };
        let candidate = base.join(requested);
        let resolver = &self.engine.resolver;

        if candidate.is_file() && resolver.is_source(&candidate) {
            return Ok(canonical(&candidate));
        }
        for extension in resolver.extensions() {
            let mut with_ext = OsString::from(candidate.as_os_str());
            with_ext.push(".");
            with_ext.push(extension);
            let path = PathBuf::from(with_ext);
            if path.is_file() {
                return Ok(canonical(&path));
            }
        }
        if candidate.is_dir() {
            for extension in resolver.extensions() {
                let index = candidate.join(format!("index.{}", extension));
                if index.is_file() {
                    return Ok(canonical(&index));
                }
            }
        }
        if candidate.is_file() {
            return Err(HotloadError::UnsupportedModule {
                path: canonical(&candidate),
            });
        }
        Err(HotloadError::ModuleNotFound {
            request: request.to_string(),
            parent: parent.map(Path::to_path_buf),
        })
    }

    /// Resolve and load a module request.
    pub fn intercept(&self, request: &str, parent: Option<&Path>) -> HotloadResult<ModuleExports> {
        let path = self.resolve(request, parent)?;
        self.load(&path)
    }

    /// Load an already resolved path: host cache first, then the suffix handler.
    pub fn load(&self, path: &Path) -> HotloadResult<ModuleExports> {
        if let Some(exports) = self.engine.cache.get(path) {
            return Ok(exports);
        }
        if self.engine.loading.lock().iter().any(|p| p == path) {
            return Err(HotloadError::CircularRequire {
                path: path.to_path_buf(),
            });
        }

        let mut record = ModuleRecord::new(path.to_path_buf());
        let exports = self.load_source(&mut record)?;
        self.engine.cache.insert(path, exports.clone());

        if self.engine.compiler.lock().registry_mut().mark_executed(path) {
            self.engine.stream.emit(&ChangeEvent::RequiredAfter {
                path: path.to_path_buf(),
            });
        }
        Ok(exports)
    }

    /// Suffix handler: compile if needed, execute, wrap.
    pub fn load_source(&self, record: &mut ModuleRecord) -> HotloadResult<ModuleExports> {
        let path = record.path.clone();
        let compiled = self.engine.compiler.lock().compile_missing(&path)?;

        self.engine.loading.lock().push(path.clone());
        let result = self.execute(&compiled);
        self.engine.loading.lock().retain(|p| p != &path);

        let exports = match result {
            Ok(exports) => exports,
            Err(e) => self.recover(&path, e)?,
        };

        let exports: ModuleExports = if self.should_wrap(&path) {
            self.engine.hot.wrap(&path, exports)
        } else {
            exports
        };
        record.exports = Some(exports.clone());
        record.loaded = true;
        Ok(exports)
    }

    fn execute(&self, compiled: &CompiledModule) -> anyhow::Result<ModuleExports> {
        tracing::debug!(
            path = %compiled.source_path.display(),
            version = compiled.version,
            stubbed = compiled.stubbed,
            "executing"
        );
        self.engine
            .executor
            .execute(&ExecutionUnit::from_compiled(compiled), self)
    }

    /// Stub-or-fatal policy for execution failures.
    fn recover(&self, path: &Path, error: anyhow::Error) -> HotloadResult<ModuleExports> {
        let error = match error.downcast::<HotloadError>() {
            // A nested module already applied the policy to itself
            Ok(nested @ HotloadError::Execution { .. })
            | Ok(nested @ HotloadError::Translation { .. }) => return Err(nested),
            Ok(nested) if self.engine.config.mode == RuntimeMode::Production => {
                tracing::error!(path = %path.display(), error = %nested, "dependency failed to load");
                return Err(nested);
            }
            Ok(nested) => anyhow::Error::new(nested),
            Err(error) => error,
        };
        let message = format!("{:#}", error);

        match self.engine.config.mode {
            RuntimeMode::Development => {
                tracing::warn!(path = %path.display(), error = %message, "execution failed, retrying with stub module");
                let stub = self.engine.compiler.lock().install_stub(path)?;
                self.execute(&stub).map_err(|e| HotloadError::Execution {
                    path: path.to_path_buf(),
                    message: format!("{:#}", e),
                })
            }
            RuntimeMode::Production => {
                tracing::error!(path = %path.display(), error = %message, "execution failed");
                Err(HotloadError::Execution {
                    path: path.to_path_buf(),
                    message,
                })
            }
        }
    }

    /// Only project modules loaded while watching are hot-swappable.
    fn should_wrap(&self, path: &Path) -> bool {
        self.engine.watching.load(Ordering::SeqCst)
            && path.starts_with(&self.engine.config.project_root)
            && !path.starts_with(&self.engine.library)
    }
}

impl Require for ModuleLoadInterceptor<'_> {
    fn require(&self, request: &str, parent: &Path) -> HotloadResult<ModuleExports> {
        self.intercept(request, Some(parent))
    }
}
