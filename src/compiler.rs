//! Incremental compiler
//!
//! Orchestrates translate → diagnose → cache → mark-for-reload for one path at
//! a time. Owns the unchanged-content short-circuit (watch mode only) and the
//! stub-on-error policy:
//!
//! - development: diagnostics are logged and the translator's empty stub
//!   module replaces the output, keeping the process alive
//! - production: the first error-severity diagnostic is fatal

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::RuntimeMode;
use crate::error::{HotloadError, HotloadResult};
use crate::hash::ContentHash;
use crate::models::{CompiledModule, Diagnostic};
use crate::registry::SourceRegistry;
use crate::transformers::PhaseMap;
use crate::translator::{ContentTypeResolver, SourceTranslator};

/// What one `compile` call did
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    /// False when the hash short-circuit kept the previous output
    pub recompiled: bool,
    /// The compiled text differs from the previous compile
    pub output_changed: bool,
    /// The output is the stub module
    pub stubbed: bool,
    /// The file already executed and must be reloaded by its next load
    pub reload_marked: bool,
    /// Output now held by the registry
    pub module: CompiledModule,
}

struct Translated {
    code: String,
    source_map: Option<String>,
    diagnostics: Vec<Diagnostic>,
    stubbed: bool,
}

pub struct IncrementalCompiler {
    registry: SourceRegistry,
    resolver: Arc<ContentTypeResolver>,
    phases: PhaseMap,
    mode: RuntimeMode,
    watching: bool,
}

impl IncrementalCompiler {
    pub fn new(resolver: Arc<ContentTypeResolver>, mode: RuntimeMode, watching: bool) -> Self {
        Self {
            registry: SourceRegistry::new(),
            resolver,
            phases: PhaseMap::default(),
            mode,
            watching,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SourceRegistry {
        &mut self.registry
    }

    pub fn resolver(&self) -> &Arc<ContentTypeResolver> {
        &self.resolver
    }

    pub fn phases(&self) -> &PhaseMap {
        &self.phases
    }

    pub fn set_phases(&mut self, phases: PhaseMap) {
        self.phases = phases;
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    pub fn set_watching(&mut self, watching: bool) {
        self.watching = watching;
    }

    /// Compile every root-set path once at version 0.
    ///
    /// Priming never marks anything for reload. Returns the number of stubbed
    /// files (always 0 in production, where the first failure is returned).
    pub fn prime(&mut self, paths: &[PathBuf]) -> HotloadResult<usize> {
        let mut stubbed = 0;
        for path in paths {
            self.registry.insert(path, 0);
            if self.compile(path)?.stubbed {
                stubbed += 1;
            }
        }
        tracing::debug!(files = paths.len(), stubbed, "primed root set");
        Ok(stubbed)
    }

    /// Compile `path` if needed; returns whether a translation happened.
    pub fn ensure_compiled(&mut self, path: &Path) -> HotloadResult<bool> {
        Ok(self.compile(path)?.recompiled)
    }

    /// Output for a path that may not be registered yet.
    ///
    /// Unknown paths join the root set at version 0 and are compiled before
    /// returning, so callers never see an uncompiled path.
    pub fn compile_missing(&mut self, path: &Path) -> HotloadResult<CompiledModule> {
        if let Some(module) = self.registry.compiled(path) {
            return Ok(module);
        }
        if self.registry.insert(path, 0) {
            tracing::debug!(path = %path.display(), "compiling path outside the root set");
        }
        Ok(self.compile(path)?.module)
    }

    /// Translate `path` and record the result.
    pub fn compile(&mut self, path: &Path) -> HotloadResult<CompileOutcome> {
        let translator = self
            .resolver
            .resolve(path)
            .ok_or_else(|| HotloadError::UnsupportedModule {
                path: path.to_path_buf(),
            })?;
        self.registry.insert(path, 0);

        let text = self.registry.read_source(path)?;
        let hash = ContentHash::from_content(&text);

        if self.watching {
            if let Some(file) = self.registry.get(path) {
                if file.content_hash.as_ref() == Some(&hash) {
                    if let Some(module) = file.compiled() {
                        tracing::debug!(path = %path.display(), hash = hash.short(), "content unchanged, skipping translation");
                        return Ok(CompileOutcome {
                            recompiled: false,
                            output_changed: false,
                            stubbed: module.stubbed,
                            reload_marked: false,
                            module,
                        });
                    }
                }
            }
        }

        let translated = self.translate(translator.as_ref(), &text, path)?;
        let output_path = path.with_extension(translator.output_extension());

        let Some(file) = self.registry.get_mut(path) else {
            return Err(HotloadError::UnsupportedModule {
                path: path.to_path_buf(),
            });
        };
        let output_changed = file.compiled_text.as_deref() != Some(translated.code.as_str());

        file.content_hash = Some(hash);
        file.compiled_text = Some(Arc::from(translated.code));
        file.source_map = translated.source_map.map(Arc::from);
        file.output_path = Some(output_path);
        file.diagnostics = translated.diagnostics;
        file.stubbed = translated.stubbed;

        let reload_marked = output_changed && file.version > 0 && file.executed;
        if reload_marked {
            file.reload_pending = true;
        }

        tracing::debug!(
            path = %path.display(),
            version = file.version,
            output_changed,
            stubbed = file.stubbed,
            "compiled"
        );

        let stubbed = file.stubbed;
        let module = file.compiled().ok_or_else(|| HotloadError::UnsupportedModule {
            path: path.to_path_buf(),
        })?;
        Ok(CompileOutcome {
            recompiled: true,
            output_changed,
            stubbed,
            reload_marked,
            module,
        })
    }

    /// Replace the stored output of `path` with the stub module.
    ///
    /// Used after the compiled text failed to execute in development mode.
    pub fn install_stub(&mut self, path: &Path) -> HotloadResult<CompiledModule> {
        let translator = self
            .resolver
            .resolve(path)
            .ok_or_else(|| HotloadError::UnsupportedModule {
                path: path.to_path_buf(),
            })?;
        self.registry.insert(path, 0);
        let stub = translator.stub_module(path);
        let output_path = path.with_extension(translator.output_extension());

        let Some(file) = self.registry.get_mut(path) else {
            return Err(HotloadError::UnsupportedModule {
                path: path.to_path_buf(),
            });
        };
        file.compiled_text = Some(Arc::from(stub));
        file.source_map = None;
        file.output_path = Some(output_path);
        file.stubbed = true;

        file.compiled().ok_or_else(|| HotloadError::UnsupportedModule {
            path: path.to_path_buf(),
        })
    }

    fn translate(
        &self,
        translator: &dyn SourceTranslator,
        text: &str,
        path: &Path,
    ) -> HotloadResult<Translated> {
        let diagnostics = match translator.translate(text, path, &self.phases) {
            Ok(output) if !output.has_errors() => {
                for warning in &output.diagnostics {
                    tracing::warn!(path = %path.display(), "{}", warning);
                }
                return Ok(Translated {
                    code: output.output_text,
                    source_map: output.source_map,
                    diagnostics: output.diagnostics,
                    stubbed: false,
                });
            }
            Ok(output) => output.diagnostics,
            Err(e) => vec![Diagnostic {
                file: Some(path.to_path_buf()),
                ..Diagnostic::error(format!("{:#}", e))
            }],
        };

        match self.mode {
            RuntimeMode::Development => {
                for diagnostic in &diagnostics {
                    tracing::warn!(path = %path.display(), "{}", diagnostic);
                }
                tracing::warn!(path = %path.display(), "translation failed, substituting stub module");
                Ok(Translated {
                    code: translator.stub_module(path),
                    source_map: None,
                    diagnostics,
                    stubbed: true,
                })
            }
            RuntimeMode::Production => {
                tracing::error!(path = %path.display(), errors = diagnostics.len(), "translation failed");
                Err(HotloadError::Translation {
                    path: path.to_path_buf(),
                    diagnostics,
                })
            }
        }
    }
}

impl std::fmt::Debug for IncrementalCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalCompiler")
            .field("files", &self.registry.len())
            .field("mode", &self.mode)
            .field("watching", &self.watching)
            .finish()
    }
}
