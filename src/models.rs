//! Core data models for hotload

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fails the compile
    #[default]
    Error,
    /// Logged, never fails the compile
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// A message reported by the source translator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default)]
    pub severity: Severity,
}

impl Diagnostic {
    /// Create an error diagnostic with no location
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
            column: None,
            severity: Severity::Error,
        }
    }

    /// Create a warning diagnostic with no location
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(message)
        }
    }

    /// Attach a location (1-based line and column)
    pub fn at(mut self, file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}", file.display())?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
                if let Some(column) = self.column {
                    write!(f, ":{}", column)?;
                }
            }
            write!(f, " - ")?;
        }
        write!(f, "{}: {}", self.severity.as_str(), self.message)
    }
}

/// Per-path compilation state held by the source registry
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// 0 while priming or after lazy discovery, bumped on every observed change
    pub version: u64,
    pub content_hash: Option<ContentHash>,
    pub compiled_text: Option<Arc<str>>,
    pub source_map: Option<Arc<str>>,
    pub output_path: Option<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
    /// The current output is the stub module
    pub stubbed: bool,
    /// The host executed this file at least once
    pub executed: bool,
    /// `required-after` was already emitted for this file
    pub announced: bool,
    /// Output changed after execution; the next load re-executes
    pub reload_pending: bool,
}

impl SourceFile {
    pub fn new(path: PathBuf, version: u64) -> Self {
        Self {
            path,
            version,
            content_hash: None,
            compiled_text: None,
            source_map: None,
            output_path: None,
            diagnostics: Vec::new(),
            stubbed: false,
            executed: false,
            announced: false,
            reload_pending: false,
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled_text.is_some()
    }

    /// Snapshot of the compiled output, if any
    pub fn compiled(&self) -> Option<CompiledModule> {
        let code = self.compiled_text.clone()?;
        Some(CompiledModule {
            source_path: self.path.clone(),
            output_path: self
                .output_path
                .clone()
                .unwrap_or_else(|| self.path.clone()),
            code,
            source_map: self.source_map.clone(),
            version: self.version,
            stubbed: self.stubbed,
        })
    }
}

/// Output of one compile, handed to the host for execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    pub source_path: PathBuf,
    /// Translated path the host binds the code to
    pub output_path: PathBuf,
    pub code: Arc<str>,
    pub source_map: Option<Arc<str>>,
    pub version: u64,
    pub stubbed: bool,
}

impl CompiledModule {
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}
