//! Loading transformer plugin units

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::error::{HotloadError, HotloadResult};
use crate::exports::{ModuleExports, Value};
use crate::host::{ExecutionUnit, ModuleExecutor, NoRequire};
use crate::translator::ContentTypeResolver;

use super::descriptor::{Phase, PhaseMap, TransformerDescriptor};

/// Turns one discovered plugin file into transformer descriptors
pub trait TransformerLoader: Send + Sync {
    fn load(&self, path: &Path) -> HotloadResult<Vec<TransformerDescriptor>>;
}

/// Loads a plugin by compiling and executing it like any other module.
///
/// The plugin is translated with an empty phase map (plugins never transform
/// each other) and executed without access to `require`. Its exports must
/// carry a `phase` string and a callable `transform(text, path)`; `priority`
/// and `name` are optional.
pub struct ExportsTransformerLoader {
    resolver: Arc<ContentTypeResolver>,
    executor: Arc<dyn ModuleExecutor>,
}

impl ExportsTransformerLoader {
    pub fn new(resolver: Arc<ContentTypeResolver>, executor: Arc<dyn ModuleExecutor>) -> Self {
        Self { resolver, executor }
    }

    fn plugin_error(path: &Path, message: impl Into<String>) -> HotloadError {
        HotloadError::Plugin {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    fn descriptor_from_exports(
        path: &Path,
        exports: ModuleExports,
    ) -> HotloadResult<TransformerDescriptor> {
        let phase = exports
            .get("phase")
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| Self::plugin_error(path, "missing string export 'phase'"))?;
        let phase: Phase = phase
            .parse()
            .map_err(|message: String| Self::plugin_error(path, message))?;

        if !exports.has("transform") {
            return Err(Self::plugin_error(path, "missing callable export 'transform'"));
        }

        let name = exports
            .get("name")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| plugin_stem(path));

        let priority = match exports.get("priority") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let p = value
                    .as_u64()
                    .and_then(|p| u32::try_from(p).ok())
                    .ok_or_else(|| {
                        Self::plugin_error(path, "'priority' must be a non-negative integer")
                    })?;
                Some(p)
            }
        };

        let member = name.clone();
        let mut descriptor = TransformerDescriptor::new(phase, name, move |text, file| {
            let result = exports.call(
                "transform",
                &[json!(text), json!(file.to_string_lossy())],
            )?;
            match result {
                Value::String(s) => Ok(s),
                other => anyhow::bail!(
                    "transformer '{}' returned {} instead of text",
                    member,
                    other
                ),
            }
        });
        descriptor.priority = priority;
        Ok(descriptor)
    }
}

impl TransformerLoader for ExportsTransformerLoader {
    fn load(&self, path: &Path) -> HotloadResult<Vec<TransformerDescriptor>> {
        let translator = self
            .resolver
            .resolve(path)
            .ok_or_else(|| HotloadError::UnsupportedModule {
                path: path.to_path_buf(),
            })?;
        let text = std::fs::read_to_string(path)?;

        let output = translator
            .translate(&text, path, &PhaseMap::default())
            .map_err(|e| Self::plugin_error(path, format!("{:#}", e)))?;
        if output.has_errors() {
            return Err(HotloadError::Translation {
                path: path.to_path_buf(),
                diagnostics: output.diagnostics,
            });
        }

        let output_path = path.with_extension(translator.output_extension());
        let unit = ExecutionUnit {
            source_path: path,
            output_path: &output_path,
            code: &output.output_text,
            source_map: output.source_map.as_deref(),
        };
        let exports = self
            .executor
            .execute(&unit, &NoRequire)
            .map_err(|e| Self::plugin_error(path, format!("{:#}", e)))?;

        tracing::debug!(path = %path.display(), "loaded transformer plugin");
        Ok(vec![Self::descriptor_from_exports(path, exports)?])
    }
}

/// `auth.transformer.ts` → `auth`
fn plugin_stem(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_name
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(file_name.as_str())
        .to_string()
}
