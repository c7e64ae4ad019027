//! Transformer descriptors and the composed phase map

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Text transform applied during translation
pub type TransformFn = Arc<dyn Fn(&str, &Path) -> anyhow::Result<String> + Send + Sync>;

/// Point in translation at which a transformer runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Before,
    After,
    AfterDeclarations,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Before, Phase::After, Phase::AfterDeclarations];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
            Phase::AfterDeclarations => "after-declarations",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "before" => Ok(Phase::Before),
            "after" => Ok(Phase::After),
            "after-declarations" | "afterdeclarations" | "after_declarations" => {
                Ok(Phase::AfterDeclarations)
            }
            other => Err(format!("unknown transformer phase '{}'", other)),
        }
    }
}

/// One translation-time plugin
#[derive(Clone)]
pub struct TransformerDescriptor {
    pub phase: Phase,
    /// `None` until the pipeline assigns one
    pub priority: Option<u32>,
    pub name: String,
    pub transform: TransformFn,
}

impl TransformerDescriptor {
    pub fn new<F>(phase: Phase, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&str, &Path) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            phase,
            priority: None,
            name: name.into(),
            transform: Arc::new(transform),
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn apply(&self, text: &str, path: &Path) -> anyhow::Result<String> {
        (self.transform)(text, path)
    }
}

impl fmt::Debug for TransformerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerDescriptor")
            .field("phase", &self.phase)
            .field("priority", &self.priority)
            .field("name", &self.name)
            .finish()
    }
}

/// Phase → transformers in application order. Read-only once resolved.
#[derive(Debug, Clone, Default)]
pub struct PhaseMap {
    phases: BTreeMap<Phase, Vec<TransformerDescriptor>>,
}

impl PhaseMap {
    pub(crate) fn from_grouped(phases: BTreeMap<Phase, Vec<TransformerDescriptor>>) -> Self {
        Self { phases }
    }

    pub fn get(&self, phase: Phase) -> &[TransformerDescriptor] {
        self.phases.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names in application order, for logs and assertions
    pub fn names(&self, phase: Phase) -> Vec<&str> {
        self.get(phase).iter().map(|d| d.name.as_str()).collect()
    }

    /// Run every transformer of `phase` over `text` in order
    pub fn apply(&self, phase: Phase, text: &str, path: &Path) -> anyhow::Result<String> {
        let mut current = text.to_string();
        for descriptor in self.get(phase) {
            current = descriptor
                .apply(&current, path)
                .map_err(|e| e.context(format!("transformer '{}' failed", descriptor.name)))?;
        }
        Ok(current)
    }

    pub fn len(&self) -> usize {
        self.phases.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
