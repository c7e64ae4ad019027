//! Transformer pipeline manager
//!
//! Translation-time plugins grouped by phase and ordered by priority.
//!
//! - `TransformerDescriptor` / `PhaseMap` - what a compile consumes
//! - `TransformerLoader` - turns a plugin unit into descriptors
//! - `TransformerPipeline` - discovery, priority assignment and grouping

mod descriptor;
mod discovery;
mod pipeline;


pub use descriptor::{Phase, PhaseMap, TransformFn, TransformerDescriptor};
pub use discovery::{ExportsTransformerLoader, TransformerLoader};
pub use pipeline::{TransformerPipeline, AUTO_PRIORITY_START, BUILTIN_PRIORITY_LIMIT};
