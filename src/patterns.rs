//! Path pattern sets
//!
//! Gitignore-style globs evaluated relative to the project root, backed by the
//! `ignore` crate. Used for excluded files, content-type suffixes and the
//! transformer plugin naming convention.

use std::fmt;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::{HotloadError, HotloadResult};

/// A compiled list of globs anchored at a root directory.
#[derive(Clone)]
pub struct PatternSet {
    root: PathBuf,
    matcher: Gitignore,
    patterns: Vec<String>,
}

impl PatternSet {
    /// A set that matches nothing.
    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            matcher: Gitignore::empty(),
            patterns: Vec::new(),
        }
    }

    /// Compile `patterns` relative to `root`.
    ///
    /// Blank lines and `#` comments are skipped, as in a `.gitignore` file.
    pub fn new<S: AsRef<str>>(root: &Path, patterns: &[S]) -> HotloadResult<Self> {
        let mut builder = GitignoreBuilder::new(root);
        let mut kept = Vec::new();

        for pattern in patterns {
            let line = pattern.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            builder
                .add_line(None, line)
                .map_err(|e| HotloadError::InvalidPattern {
                    pattern: line.to_string(),
                    message: e.to_string(),
                })?;
            kept.push(line.to_string());
        }

        let matcher = builder.build().map_err(|e| HotloadError::InvalidPattern {
            pattern: kept.join(", "),
            message: e.to_string(),
        })?;

        Ok(Self {
            root: root.to_path_buf(),
            matcher,
            patterns: kept,
        })
    }

    /// Check a file path against the set.
    ///
    /// Paths under the root match on their relative path and every parent
    /// directory. Paths outside the root only match on their file name.
    pub fn matches(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let relative = match path.strip_prefix(&self.root) {
            Ok(rel) => rel,
            Err(_) if path.is_relative() => path,
            Err(_) => match path.file_name() {
                Some(name) => Path::new(name),
                None => return false,
            },
        };
        if relative.as_os_str().is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(relative, false)
            .is_ignore()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternSet")
            .field("root", &self.root)
            .field("patterns", &self.patterns)
            .finish()
    }
}
