//! A tiny line-based source language.
//!
//! ```text
//! export value: number = 1          -> let value = 1
//! export fn greet(): string = "hi"  -> fn greet = "hi"
//! import a from "./a"               -> use a ./a
//! throw boom                        -> throw boom
//! error <message>                   -> error diagnostic
//! warn <message>                    -> warning diagnostic
//! ```
//!
//! An imported alias becomes a function: `a("value")` reads `value` from the
//! imported module's exports at call time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use hotload::{
    Diagnostic, ExecutionUnit, ModuleExecutor, ModuleExports, ObjectExports, Phase, PhaseMap,
    Require, SourceTranslator, TranslateOutput,
};

#[derive(Debug, Default)]
pub struct LineTranslator {
    translations: AtomicUsize,
}

impl LineTranslator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn translations(&self) -> usize {
        self.translations.load(Ordering::SeqCst)
    }
}

impl SourceTranslator for LineTranslator {
    fn translate(
        &self,
        text: &str,
        path: &Path,
        phases: &PhaseMap,
    ) -> anyhow::Result<TranslateOutput> {
        self.translations.fetch_add(1, Ordering::SeqCst);
        let text = phases.apply(Phase::Before, text, path)?;

        let mut out = Vec::new();
        let mut output = TranslateOutput::default();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            let line_no = index as u32 + 1;
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            if let Some(rest) = line.strip_prefix("export fn ") {
                let (name, value) = split_decl(rest);
                let name = name.split('(').next().unwrap_or(name);
                out.push(format!("fn {} = {}", name, value));
            } else if let Some(rest) = line.strip_prefix("export ") {
                let (name, value) = split_decl(rest);
                out.push(format!("let {} = {}", name, value));
            } else if let Some(rest) = line.strip_prefix("import ") {
                let mut parts = rest.splitn(2, " from ");
                let alias = parts.next().unwrap_or_default().trim();
                let request = parts.next().unwrap_or_default().trim().trim_matches('"');
                out.push(format!("use {} {}", alias, request));
            } else if line.starts_with("throw ") {
                out.push(line.to_string());
            } else if let Some(message) = line.strip_prefix("error ") {
                output = output.with_diagnostic(Diagnostic::error(message).at(path, line_no, 1));
            } else if let Some(message) = line.strip_prefix("warn ") {
                output = output.with_diagnostic(Diagnostic::warning(message).at(path, line_no, 1));
            } else {
                output = output.with_diagnostic(
                    Diagnostic::error(format!("unexpected statement '{}'", line))
                        .at(path, line_no, 1),
                );
            }
        }

        output.output_text = phases.apply(Phase::After, &out.join("\n"), path)?;
        Ok(output.with_source_map(format!("map:{}", path.display())))
    }

    fn output_extension(&self) -> &str {
        "js"
    }
}

fn split_decl(rest: &str) -> (&str, &str) {
    let mut parts = rest.splitn(2, '=');
    let head = parts.next().unwrap_or_default();
    let value = parts.next().unwrap_or("null").trim();
    let name = head.split(':').next().unwrap_or_default().trim();
    (name, value)
}

#[derive(Debug, Default)]
pub struct LineExecutor {
    executions: Mutex<HashMap<PathBuf, usize>>,
}

impl LineExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// How many times code for `path` ran, stubs included
    pub fn executions(&self, path: &Path) -> usize {
        self.executions.lock().get(path).copied().unwrap_or(0)
    }
}

impl ModuleExecutor for LineExecutor {
    fn execute(
        &self,
        unit: &ExecutionUnit<'_>,
        loader: &dyn Require,
    ) -> anyhow::Result<ModuleExports> {
        *self
            .executions
            .lock()
            .entry(unit.source_path.to_path_buf())
            .or_default() += 1;

        let mut exports = ObjectExports::new();
        for line in unit.code.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(rest) = line.strip_prefix("let ") {
                let (name, value) = split_decl(rest);
                exports = exports.with_value(name, serde_json::from_str(value)?);
            } else if let Some(rest) = line.strip_prefix("fn ") {
                let (name, value) = split_decl(rest);
                let value: Value = serde_json::from_str(value)?;
                exports = exports.with_function(name, move |_| Ok(value.clone()));
            } else if let Some(rest) = line.strip_prefix("use ") {
                let mut parts = rest.split_whitespace();
                let alias = parts.next().unwrap_or_default().to_string();
                let request = parts.next().unwrap_or_default();
                let module = loader.require(request, unit.source_path)?;
                exports = exports.with_function(alias, move |args| {
                    let key = args.first().and_then(Value::as_str).unwrap_or_default();
                    Ok(module.get(key).unwrap_or(Value::Null))
                });
            } else if let Some(message) = line.strip_prefix("throw ") {
                anyhow::bail!("{}", message);
            } else {
                anyhow::bail!("cannot execute '{}'", line);
            }
        }
        Ok(exports.into_exports())
    }
}
