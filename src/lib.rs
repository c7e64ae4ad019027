//! hotload - incremental compiler and hot module reload engine
//!
//! hotload runs inside a long-lived host process. It translates typed source
//! units into host-executable text on first load and on every edit, and lets
//! the running program swap an already-loaded module's implementation without
//! invalidating the references other code holds to it.
//!
//! Everything hangs off one [`HotloadContext`], built from a [`Config`], a
//! [`SourceTranslator`] per content type and the host's [`ModuleExecutor`].

pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod exports;
pub mod fs;
pub mod hash;
pub mod host;
pub mod hotswap;
pub mod interceptor;
pub mod models;
pub mod patterns;
pub mod registry;
pub mod transformers;
pub mod translator;
pub mod watcher;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use compiler::{CompileOutcome, IncrementalCompiler};
pub use config::{Config, ConfigWarning, RuntimeMode};
pub use context::{HotloadContext, HotloadContextBuilder, InitReport};
pub use error::{ExportError, HotloadError, HotloadResult};
pub use exports::{Exports, ModuleExports, ObjectExports, Value};
pub use hash::ContentHash;
pub use host::{
    ExecutionUnit, InMemoryModuleCache, ModuleCache, ModuleExecutor, ModuleRecord, NoRequire,
    Require,
};
pub use hotswap::{HotModule, HotSwapRegistry};
pub use interceptor::ModuleLoadInterceptor;
pub use models::{CompiledModule, Diagnostic, Severity, SourceFile};
pub use patterns::PatternSet;
pub use registry::SourceRegistry;
pub use transformers::{
    Phase, PhaseMap, TransformerDescriptor, TransformerLoader, TransformerPipeline,
};
pub use translator::{ContentTypeResolver, SourceTranslator, TranslateOutput};
pub use watcher::{
    ChangeEvent, NotifyWatchService, RawEvent, RawEventKind, WatchMessage, WatchService,
    WatchSubscription,
};
