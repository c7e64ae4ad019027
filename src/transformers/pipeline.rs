//! Discovery, priority assignment and grouping

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{HotloadError, HotloadResult};
use crate::fs::walk_files;
use crate::patterns::PatternSet;

use super::descriptor::{Phase, PhaseMap, TransformerDescriptor};
use super::discovery::TransformerLoader;

/// Priorities below this are reserved for built-in transformers
pub const BUILTIN_PRIORITY_LIMIT: u32 = 100;

/// First priority handed to a plugin that does not pick its own
pub const AUTO_PRIORITY_START: u32 = BUILTIN_PRIORITY_LIMIT;

/// Composes built-in and discovered transformers into a `PhaseMap`.
pub struct TransformerPipeline {
    root: PathBuf,
    convention: PatternSet,
    markers: PatternSet,
    skip_dirs: Vec<PathBuf>,
    builtins: Vec<TransformerDescriptor>,
    loader: Option<Arc<dyn TransformerLoader>>,
}

impl TransformerPipeline {
    /// `convention` selects plugin units, `markers` removes the convention's
    /// own marker files (declaration-only files) from that selection.
    pub fn new(root: &Path, convention: PatternSet, markers: PatternSet) -> Self {
        Self {
            root: root.to_path_buf(),
            convention,
            markers,
            skip_dirs: Vec::new(),
            builtins: Vec::new(),
            loader: None,
        }
    }

    pub fn with_skip_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.skip_dirs = dirs;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn TransformerLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Register a built-in transformer.
    ///
    /// Built-ins without a priority get the next free slot of the reserved
    /// range; an explicit priority must stay inside it.
    pub fn register_builtin(&mut self, mut descriptor: TransformerDescriptor) -> HotloadResult<()> {
        let priority = match descriptor.priority {
            Some(p) => p,
            None => self.builtins.len() as u32,
        };
        if priority >= BUILTIN_PRIORITY_LIMIT {
            return Err(HotloadError::Plugin {
                path: PathBuf::from(&descriptor.name),
                message: format!(
                    "built-in priority {} is outside the reserved range 0..{}",
                    priority, BUILTIN_PRIORITY_LIMIT
                ),
            });
        }
        descriptor.priority = Some(priority);
        self.builtins.push(descriptor);
        Ok(())
    }

    /// Is `path` a transformer plugin unit?
    pub fn is_plugin(&self, path: &Path) -> bool {
        self.convention.matches(path) && !self.markers.matches(path)
    }

    /// Plugin units under the root, in stable path order
    pub fn discover(&self) -> HotloadResult<Vec<PathBuf>> {
        if self.convention.is_empty() {
            return Ok(Vec::new());
        }
        let files = walk_files(&self.root, &self.skip_dirs)?;
        Ok(files.into_iter().filter(|f| self.is_plugin(f)).collect())
    }

    /// Build the phase map.
    ///
    /// Recomputed from scratch on every call, so resolving twice over the same
    /// plugin set yields the same order.
    pub fn resolve_pipeline(&self) -> HotloadResult<PhaseMap> {
        let mut ordered: Vec<TransformerDescriptor> = self.builtins.clone();

        let plugins = self.discover()?;
        if !plugins.is_empty() && self.loader.is_none() {
            tracing::warn!(
                count = plugins.len(),
                "transformer plugins found but no loader configured; skipping"
            );
        }
        if let Some(loader) = &self.loader {
            let mut next_auto = AUTO_PRIORITY_START;
            for plugin in &plugins {
                for mut descriptor in loader.load(plugin)? {
                    if descriptor.priority.is_none() {
                        descriptor.priority = Some(next_auto);
                        next_auto += 1;
                    }
                    ordered.push(descriptor);
                }
            }
        }

        let mut grouped: BTreeMap<Phase, Vec<TransformerDescriptor>> = BTreeMap::new();
        for descriptor in ordered {
            grouped.entry(descriptor.phase).or_default().push(descriptor);
        }
        for list in grouped.values_mut() {
            // Stable: equal priorities keep discovery order
            list.sort_by_key(|d| d.priority.unwrap_or(u32::MAX));
        }

        let map = PhaseMap::from_grouped(grouped);
        for phase in Phase::ALL {
            if !map.get(phase).is_empty() {
                tracing::debug!(phase = %phase, transformers = ?map.names(phase), "resolved transformer phase");
            }
        }
        Ok(map)
    }
}

impl fmt::Debug for TransformerPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerPipeline")
            .field("root", &self.root)
            .field("convention", &self.convention)
            .field("builtins", &self.builtins)
            .finish()
    }
}
