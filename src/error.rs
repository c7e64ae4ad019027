//! Error types for hotload
//!
//! Uses `thiserror` for library errors. Collaborator traits (translator,
//! executor, transformer functions) report failures as `anyhow::Error`; they
//! are converted into the typed variants below at the crate boundary.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::Diagnostic;

/// Result type alias for hotload operations
pub type HotloadResult<T> = Result<T, HotloadError>;

/// Main error type for hotload operations
#[derive(Error, Debug)]
pub enum HotloadError {
    /// Translation reported error diagnostics (fatal in production mode)
    #[error("failed to translate {path}: {}", summarize(.diagnostics))]
    Translation {
        path: PathBuf,
        diagnostics: Vec<Diagnostic>,
    },

    /// Compiled text failed while executing
    #[error("failed to execute {path}: {message}")]
    Execution { path: PathBuf, message: String },

    /// The watch service failed to start or to keep running
    #[error("watch failed for {path}: {message}")]
    Watch { path: PathBuf, message: String },

    /// Malformed or inconsistent configuration
    #[error("invalid configuration in {file}: {message}")]
    Config { file: PathBuf, message: String },

    /// A glob pattern failed to compile
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A transformer plugin could not be loaded
    #[error("invalid transformer plugin {path}: {message}")]
    Plugin { path: PathBuf, message: String },

    /// A module request did not resolve to a file
    #[error("cannot find module '{request}'{}", parent_suffix(.parent))]
    ModuleNotFound {
        request: String,
        parent: Option<PathBuf>,
    },

    /// The resolved file has no registered content type
    #[error("no translator registered for {path}")]
    UnsupportedModule { path: PathBuf },

    /// A module required itself while it was still executing
    #[error("circular require of {path}")]
    CircularRequire { path: PathBuf },

    /// The context was used before `init` or after a failed reset
    #[error("hotload context is not initialized")]
    NotInitialized,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HotloadError {
    /// Diagnostics carried by a translation failure, empty otherwise.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            HotloadError::Translation { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    match diagnostics {
        [] => "translator reported no output".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

fn parent_suffix(parent: &Option<PathBuf>) -> String {
    match parent {
        Some(parent) => format!(" from {}", parent.display()),
        None => String::new(),
    }
}

/// Errors raised by member access on module exports
#[derive(Error, Debug)]
pub enum ExportError {
    /// The module behind an indirection was removed or unloaded
    #[error("module {path} is unloaded")]
    Unloaded { path: PathBuf },

    /// No member with this name
    #[error("no export named '{member}'")]
    Missing { member: String },

    /// The member exists but is a plain value
    #[error("export '{member}' is not callable")]
    NotCallable { member: String },

    /// The member's function returned an error
    #[error("export '{member}' failed: {source}")]
    Failed {
        member: String,
        #[source]
        source: anyhow::Error,
    },
}
