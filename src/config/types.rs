//! Configuration type definitions

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HotloadError, HotloadResult};
use crate::patterns::PatternSet;

use super::loader::{self, ConfigWarning};

/// Declaration-only files never produce executable output
pub const DECLARATION_PATTERN: &str = "*.d.*";

/// Failure policy for translation and execution errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Log diagnostics and substitute a stub module
    #[default]
    #[serde(alias = "dev")]
    Development,
    /// The first error is fatal
    #[serde(alias = "prod")]
    Production,
}

impl RuntimeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeMode::Development => "development",
            RuntimeMode::Production => "production",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(RuntimeMode::Development),
            "production" | "prod" => Ok(RuntimeMode::Production),
            other => Err(format!(
                "unknown mode '{}' (expected development or production)",
                other
            )),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory whose source files form the initial root set
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    #[serde(default)]
    pub mode: RuntimeMode,

    /// Observe the file system and hot-swap changed modules
    #[serde(default)]
    pub watch: bool,

    /// Extra gitignore-style globs never compiled or watched
    #[serde(default)]
    pub excluded_patterns: Vec<String>,

    /// Third-party library directory, relative to the project root.
    /// Modules under it are never wrapped for hot-swapping.
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,

    /// Dev-only library subtrees, relative to the project root
    #[serde(default)]
    pub dev_library_dirs: Vec<PathBuf>,

    /// Naming convention for transformer plugin units
    #[serde(default = "default_transformer_pattern")]
    pub transformer_pattern: String,
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_library_dir() -> PathBuf {
    PathBuf::from("vendor")
}

fn default_transformer_pattern() -> String {
    "*.transformer.*".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            mode: RuntimeMode::default(),
            watch: false,
            excluded_patterns: Vec::new(),
            library_dir: default_library_dir(),
            dev_library_dirs: Vec::new(),
            transformer_pattern: default_transformer_pattern(),
        }
    }
}

impl Config {
    /// Defaults rooted at `root`
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> HotloadResult<Self> {
        let (config, _warnings) = loader::load_with_warnings(path)?;
        Ok(config)
    }

    /// Load configuration and collect non-fatal warnings (unknown keys).
    pub fn load_with_warnings(path: &Path) -> HotloadResult<(Self, Vec<ConfigWarning>)> {
        loader::load_with_warnings(path)
    }

    /// `hotload.toml` in `root` if present, else defaults rooted at `root`,
    /// with environment overrides applied either way.
    pub fn load_or_default(root: &Path) -> HotloadResult<(Self, Vec<ConfigWarning>)> {
        loader::load_or_default(root)
    }

    /// Apply `HOTLOAD_MODE` and `HOTLOAD_WATCH`
    pub fn with_env_overrides(self) -> Self {
        loader::with_env_overrides(self)
    }

    pub fn is_production(&self) -> bool {
        self.mode == RuntimeMode::Production
    }

    /// Canonicalize the project root and check every pattern compiles.
    pub fn validate(mut self) -> HotloadResult<Self> {
        let root = self
            .project_root
            .canonicalize()
            .map_err(|e| HotloadError::Config {
                file: self.project_root.clone(),
                message: format!("project root is not accessible: {}", e),
            })?;
        if !root.is_dir() {
            return Err(HotloadError::Config {
                file: root,
                message: "project root is not a directory".to_string(),
            });
        }
        self.project_root = root;

        if self.transformer_pattern.trim().is_empty() {
            return Err(HotloadError::Config {
                file: self.project_root.clone(),
                message: "transformer_pattern must not be empty".to_string(),
            });
        }
        self.exclusions().map_err(|e| HotloadError::Config {
            file: self.project_root.clone(),
            message: e.to_string(),
        })?;
        Ok(self)
    }

    /// Absolute library directory
    pub fn library_path(&self) -> PathBuf {
        self.project_root.join(&self.library_dir)
    }

    /// Absolute dev-only library directories
    pub fn dev_library_paths(&self) -> Vec<PathBuf> {
        self.dev_library_dirs
            .iter()
            .map(|d| self.project_root.join(d))
            .collect()
    }

    /// Directories skipped by the root-set scan and plugin discovery
    pub fn skip_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.library_path()];
        dirs.extend(self.dev_library_paths());
        dirs
    }

    /// Everything the watch pipeline and root-set scan ignore: declaration
    /// files, transformer plugins, dev-only libraries and user exclusions.
    pub fn exclusions(&self) -> HotloadResult<PatternSet> {
        let mut patterns = vec![
            DECLARATION_PATTERN.to_string(),
            self.transformer_pattern.clone(),
        ];
        for dir in &self.dev_library_dirs {
            patterns.push(format!("/{}/", dir.display()));
        }
        patterns.extend(self.excluded_patterns.iter().cloned());
        PatternSet::new(&self.project_root, &patterns)
    }

    /// Plugin naming convention as a pattern set
    pub fn transformer_convention(&self) -> HotloadResult<PatternSet> {
        PatternSet::new(&self.project_root, &[self.transformer_pattern.as_str()])
    }

    /// Declaration-only marker files
    pub fn declaration_markers(&self) -> HotloadResult<PatternSet> {
        PatternSet::new(&self.project_root, &[DECLARATION_PATTERN])
    }
}
