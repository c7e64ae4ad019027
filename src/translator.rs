//! Source translation seam
//!
//! The actual text-to-text translation is an external service. This module
//! defines the trait it plugs in through and the content-type resolver that
//! maps path patterns to the translator responsible for them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::HotloadResult;
use crate::models::Diagnostic;
use crate::patterns::PatternSet;
use crate::transformers::PhaseMap;

/// Result of one translation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslateOutput {
    pub output_text: String,
    pub source_map: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TranslateOutput {
    pub fn new(output_text: impl Into<String>) -> Self {
        Self {
            output_text: output_text.into(),
            ..Self::default()
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    pub fn with_source_map(mut self, source_map: impl Into<String>) -> Self {
        self.source_map = Some(source_map.into());
        self
    }

    /// True when any diagnostic has error severity
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Text + path → host-executable text + diagnostics
pub trait SourceTranslator: Send + Sync {
    /// Translate one source unit, applying the composed transformer phases.
    fn translate(
        &self,
        text: &str,
        path: &Path,
        phases: &PhaseMap,
    ) -> anyhow::Result<TranslateOutput>;

    /// Extension of translated output (without the dot)
    fn output_extension(&self) -> &str;

    /// Neutral empty module substituted after a failure in development mode
    fn stub_module(&self, _path: &Path) -> String {
        String::new()
    }
}

struct ContentType {
    patterns: PatternSet,
    extension: Option<String>,
    translator: Arc<dyn SourceTranslator>,
}

/// Maps path patterns to translation strategies.
///
/// Entries are checked in registration order; the first match wins.
pub struct ContentTypeResolver {
    root: PathBuf,
    entries: Vec<ContentType>,
}

impl ContentTypeResolver {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            entries: Vec::new(),
        }
    }

    /// Register a translator for files ending in `.{extension}`.
    ///
    /// Registered extensions are also tried, in order, when resolving
    /// extensionless module requests.
    pub fn register_extension(
        &mut self,
        extension: &str,
        translator: Arc<dyn SourceTranslator>,
    ) -> HotloadResult<()> {
        let extension = extension.trim_start_matches('.');
        let patterns = PatternSet::new(&self.root, &[format!("*.{}", extension)])?;
        self.entries.push(ContentType {
            patterns,
            extension: Some(extension.to_string()),
            translator,
        });
        Ok(())
    }

    /// Register a translator for an arbitrary glob.
    pub fn register_pattern(
        &mut self,
        pattern: &str,
        translator: Arc<dyn SourceTranslator>,
    ) -> HotloadResult<()> {
        let patterns = PatternSet::new(&self.root, &[pattern])?;
        self.entries.push(ContentType {
            patterns,
            extension: None,
            translator,
        });
        Ok(())
    }

    /// Translator responsible for `path`, if any
    pub fn resolve(&self, path: &Path) -> Option<Arc<dyn SourceTranslator>> {
        self.entries
            .iter()
            .find(|entry| entry.patterns.matches(path))
            .map(|entry| entry.translator.clone())
    }

    pub fn is_source(&self, path: &Path) -> bool {
        self.entries.iter().any(|entry| entry.patterns.matches(path))
    }

    /// Extensions tried when a request names no extension
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| e.extension.as_deref())
    }

    /// Include patterns handed to the watch service
    pub fn watch_patterns(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|e| e.patterns.patterns().iter().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ContentTypeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentTypeResolver")
            .field("root", &self.root)
            .field("patterns", &self.watch_patterns())
            .finish()
    }
}
