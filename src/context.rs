//! Process-wide hotload context
//!
//! One `HotloadContext` owns every piece of engine state: the source
//! registry and compiler, the hot-swap registry, the host module cache, the
//! change stream and the watch pipeline. It is created through
//! `HotloadContextBuilder` and has an explicit `init`/`reset` lifecycle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::compiler::IncrementalCompiler;
use crate::config::Config;
use crate::error::{HotloadError, HotloadResult};
use crate::exports::ModuleExports;
use crate::fs::{canonical, walk_files};
use crate::host::{InMemoryModuleCache, ModuleCache, ModuleExecutor};
use crate::hotswap::{HotModule, HotSwapRegistry};
use crate::interceptor::ModuleLoadInterceptor;
use crate::models::Diagnostic;
use crate::patterns::PatternSet;
use crate::transformers::{
    ExportsTransformerLoader, TransformerDescriptor, TransformerLoader, TransformerPipeline,
};
use crate::translator::{ContentTypeResolver, SourceTranslator};
use crate::watcher::{
    ChangeEvent, ChangeStream, DirState, NotifyWatchService, RawEvent, SubscriberId,
    WatchMessage, WatchPipeline, WatchService,
};

/// Poll interval of `run_watch`
const POLL_MS: u64 = 50;

/// State shared by the interceptor and the watch pipeline.
pub(crate) struct Engine {
    pub(crate) config: Config,
    pub(crate) resolver: Arc<ContentTypeResolver>,
    pub(crate) executor: Arc<dyn ModuleExecutor>,
    pub(crate) cache: Arc<dyn ModuleCache>,
    pub(crate) compiler: Mutex<IncrementalCompiler>,
    pub(crate) hot: HotSwapRegistry,
    pub(crate) stream: ChangeStream,
    /// Paths currently executing, innermost last
    pub(crate) loading: Mutex<Vec<PathBuf>>,
    pub(crate) exclusions: PatternSet,
    pub(crate) library: PathBuf,
    pub(crate) watching: AtomicBool,
}

struct ActiveWatch {
    pipeline: WatchPipeline,
    receiver: Receiver<WatchMessage>,
}

/// Summary of an `init`, `build` or `reset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    /// Root-set files primed
    pub files: usize,
    /// Files whose output is the stub module
    pub stubbed: usize,
    /// Transformers in the composed pipeline
    pub transformers: usize,
    pub watching: bool,
}

/// Builder for `HotloadContext`
pub struct HotloadContextBuilder {
    config: Config,
    extensions: Vec<(String, Arc<dyn SourceTranslator>)>,
    patterns: Vec<(String, Arc<dyn SourceTranslator>)>,
    executor: Option<Arc<dyn ModuleExecutor>>,
    cache: Option<Arc<dyn ModuleCache>>,
    watch_service: Option<Arc<dyn WatchService>>,
    builtins: Vec<TransformerDescriptor>,
    loader: Option<Arc<dyn TransformerLoader>>,
}

impl HotloadContextBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            extensions: Vec::new(),
            patterns: Vec::new(),
            executor: None,
            cache: None,
            watch_service: None,
            builtins: Vec::new(),
            loader: None,
        }
    }

    /// Translate files ending in `.{extension}` with `translator`.
    pub fn translator(mut self, extension: &str, translator: Arc<dyn SourceTranslator>) -> Self {
        self.extensions.push((extension.to_string(), translator));
        self
    }

    /// Translate files matching a glob with `translator`.
    pub fn translator_for_pattern(
        mut self,
        pattern: &str,
        translator: Arc<dyn SourceTranslator>,
    ) -> Self {
        self.patterns.push((pattern.to_string(), translator));
        self
    }

    pub fn executor(mut self, executor: Arc<dyn ModuleExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Defaults to `InMemoryModuleCache`.
    pub fn module_cache(mut self, cache: Arc<dyn ModuleCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Defaults to `NotifyWatchService`.
    pub fn watch_service(mut self, service: Arc<dyn WatchService>) -> Self {
        self.watch_service = Some(service);
        self
    }

    pub fn builtin_transformer(mut self, descriptor: TransformerDescriptor) -> Self {
        self.builtins.push(descriptor);
        self
    }

    /// Defaults to `ExportsTransformerLoader` over the registered translators.
    pub fn transformer_loader(mut self, loader: Arc<dyn TransformerLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Validate the configuration and assemble the context. Nothing is
    /// scanned or compiled until `init`.
    pub fn build(self) -> HotloadResult<HotloadContext> {
        let config = self.config.validate()?;
        let root = config.project_root.clone();
        let config_error = |message: &str| HotloadError::Config {
            file: root.clone(),
            message: message.to_string(),
        };

        let executor = self
            .executor
            .ok_or_else(|| config_error("no module executor configured"))?;

        // Patterns first so they can override an extension
        let mut resolver = ContentTypeResolver::new(&root);
        for (pattern, translator) in self.patterns {
            resolver.register_pattern(&pattern, translator)?;
        }
        for (extension, translator) in self.extensions {
            resolver.register_extension(&extension, translator)?;
        }
        if resolver.is_empty() {
            return Err(config_error("no source translator registered"));
        }
        let resolver = Arc::new(resolver);

        let loader = self.loader.unwrap_or_else(|| {
            Arc::new(ExportsTransformerLoader::new(
                resolver.clone(),
                executor.clone(),
            ))
        });
        let exclusions = config.exclusions()?;
        let library = config.library_path();
        let compiler = IncrementalCompiler::new(resolver.clone(), config.mode, config.watch);

        let engine = Engine {
            resolver,
            executor,
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(InMemoryModuleCache::new())),
            compiler: Mutex::new(compiler),
            hot: HotSwapRegistry::new(),
            stream: ChangeStream::new(),
            loading: Mutex::new(Vec::new()),
            exclusions,
            library,
            watching: AtomicBool::new(false),
            config,
        };

        Ok(HotloadContext {
            engine,
            builtins: self.builtins,
            loader,
            watch_service: self
                .watch_service
                .unwrap_or_else(|| Arc::new(NotifyWatchService::new())),
            watch: Mutex::new(None),
            initialized: AtomicBool::new(false),
        })
    }
}

/// The single process-wide context object.
pub struct HotloadContext {
    engine: Engine,
    builtins: Vec<TransformerDescriptor>,
    loader: Arc<dyn TransformerLoader>,
    watch_service: Arc<dyn WatchService>,
    watch: Mutex<Option<ActiveWatch>>,
    initialized: AtomicBool,
}

impl HotloadContext {
    pub fn builder(config: Config) -> HotloadContextBuilder {
        HotloadContextBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.engine.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_watching(&self) -> bool {
        self.engine.watching.load(Ordering::SeqCst)
    }

    // === Lifecycle ===

    /// Resolve transformers, scan and prime the root set, and start watching
    /// when the configuration asks for it.
    ///
    /// In production mode the first translation error aborts initialization.
    pub fn init(&self) -> HotloadResult<InitReport> {
        if self.is_initialized() {
            self.teardown();
        }
        self.boot(self.engine.config.watch)
    }

    /// One-shot build: prime every root-set file without watching.
    pub fn build(&self) -> HotloadResult<InitReport> {
        if self.is_initialized() {
            self.teardown();
        }
        self.boot(false)
    }

    /// Tear everything down and boot again from a fresh scan.
    ///
    /// Closes every watch subscription and clears the registry, hashes,
    /// snapshots, source maps, hot-swap entries and the host cache.
    pub fn reset(&self) -> HotloadResult<InitReport> {
        let watch = self.is_watching() || self.engine.config.watch;
        self.teardown();
        let report = self.boot(watch)?;
        tracing::info!(files = report.files, watching = report.watching, "hotload reset");
        Ok(report)
    }

    fn teardown(&self) {
        if let Some(mut active) = self.watch.lock().take() {
            active.pipeline.close();
        }
        self.engine.watching.store(false, Ordering::SeqCst);
        self.engine.hot.clear();
        self.engine.cache.clear();
        self.engine.compiler.lock().registry_mut().clear();
        self.engine.loading.lock().clear();
        self.initialized.store(false, Ordering::SeqCst);
    }

    fn boot(&self, watch: bool) -> HotloadResult<InitReport> {
        let config = &self.engine.config;
        let root = &config.project_root;

        let mut transformers = TransformerPipeline::new(
            root,
            config.transformer_convention()?,
            config.declaration_markers()?,
        )
        .with_skip_dirs(config.skip_dirs())
        .with_loader(self.loader.clone());
        for builtin in &self.builtins {
            transformers.register_builtin(builtin.clone())?;
        }
        let phases = transformers.resolve_pipeline()?;
        let transformer_count = phases.len();

        let files = self.scan()?;
        let stubbed = {
            let mut compiler = self.engine.compiler.lock();
            compiler.set_phases(phases);
            compiler.set_watching(watch);
            compiler.prime(&files)?
        };

        if watch {
            let (sender, receiver) = channel();
            let pipeline = WatchPipeline::start(
                root,
                &files,
                self.watch_service.as_ref(),
                &self.engine.resolver.watch_patterns(),
                &sender,
            )?;
            *self.watch.lock() = Some(ActiveWatch { pipeline, receiver });
        }
        self.engine.watching.store(watch, Ordering::SeqCst);
        self.initialized.store(true, Ordering::SeqCst);

        tracing::info!(
            root = %root.display(),
            files = files.len(),
            stubbed,
            transformers = transformer_count,
            watching = watch,
            mode = %config.mode,
            "hotload initialized"
        );
        Ok(InitReport {
            files: files.len(),
            stubbed,
            transformers: transformer_count,
            watching: watch,
        })
    }

    /// Root set candidates: registered content types minus exclusions.
    fn scan(&self) -> HotloadResult<Vec<PathBuf>> {
        let config = &self.engine.config;
        let files = walk_files(&config.project_root, &config.skip_dirs())?;
        Ok(files
            .into_iter()
            .filter(|f| self.engine.resolver.is_source(f) && !self.engine.exclusions.matches(f))
            .collect())
    }

    fn ensure_initialized(&self) -> HotloadResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(HotloadError::NotInitialized)
        }
    }

    // === Loading ===

    /// Loader bound to this context.
    pub fn interceptor(&self) -> ModuleLoadInterceptor<'_> {
        ModuleLoadInterceptor::new(&self.engine)
    }

    /// Load a module the way executing code would.
    ///
    /// Without a parent, relative requests resolve against the project root.
    pub fn require(&self, request: &str, parent: Option<&Path>) -> HotloadResult<ModuleExports> {
        self.ensure_initialized()?;
        self.interceptor().intercept(request, parent)
    }

    /// Load a module by path.
    pub fn require_path(&self, path: &Path) -> HotloadResult<ModuleExports> {
        self.ensure_initialized()?;
        let interceptor = self.interceptor();
        let path = canonical(path);
        if !self.engine.resolver.is_source(&path) {
            return Err(HotloadError::UnsupportedModule { path });
        }
        if !path.is_file() {
            return Err(HotloadError::ModuleNotFound {
                request: path.display().to_string(),
                parent: None,
            });
        }
        interceptor.load(&path)
    }

    // === Change stream ===

    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.engine.stream.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.engine.stream.unsubscribe(id)
    }

    // === Watching ===

    /// Handle every message already delivered by the watch service.
    ///
    /// Returns the number of change events emitted. Watch service errors are
    /// returned, never swallowed.
    pub fn process_pending(&self) -> HotloadResult<usize> {
        let mut emitted = 0;
        loop {
            let event = {
                let mut guard = self.watch.lock();
                let Some(active) = guard.as_mut() else {
                    return Ok(emitted);
                };
                let message = match active.receiver.try_recv() {
                    Ok(message) => message,
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                        return Ok(emitted)
                    }
                };
                active.pipeline.handle(message, &self.engine)?
            };
            if let Some(event) = event {
                self.engine.stream.emit(&event);
                emitted += 1;
            }
        }
    }

    /// Process watch messages until `running` is cleared.
    pub fn run_watch(&self, running: &AtomicBool) -> HotloadResult<()> {
        while running.load(Ordering::SeqCst) {
            let event = {
                let mut guard = self.watch.lock();
                let Some(active) = guard.as_mut() else {
                    return Ok(());
                };
                match active
                    .receiver
                    .recv_timeout(Duration::from_millis(POLL_MS))
                {
                    Ok(message) => active.pipeline.handle(message, &self.engine)?,
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return Ok(()),
                }
            };
            if let Some(event) = event {
                self.engine.stream.emit(&event);
            }
        }
        Ok(())
    }

    /// Feed one raw event through the pipeline, as if the watch service had
    /// delivered it. Ignored when not watching.
    pub fn handle_event(&self, raw: RawEvent) -> HotloadResult<Option<ChangeEvent>> {
        let event = {
            let mut guard = self.watch.lock();
            match guard.as_mut() {
                Some(active) => active
                    .pipeline
                    .handle(WatchMessage::Event(raw), &self.engine)?,
                None => {
                    tracing::debug!(path = %raw.path.display(), "not watching, event ignored");
                    None
                }
            }
        };
        if let Some(event) = &event {
            self.engine.stream.emit(event);
        }
        Ok(event)
    }

    /// Extend the include patterns of every running watch.
    pub fn add_watch_patterns(&self, patterns: &[String]) -> HotloadResult<()> {
        match self.watch.lock().as_mut() {
            Some(active) => active.pipeline.add_patterns(patterns),
            None => Ok(()),
        }
    }

    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.watch
            .lock()
            .as_ref()
            .map(|active| active.pipeline.dirs())
            .unwrap_or_default()
    }

    pub fn dir_state(&self, dir: &Path) -> Option<DirState> {
        self.watch
            .lock()
            .as_ref()
            .and_then(|active| active.pipeline.state(dir))
    }

    // === Introspection ===

    /// Current root set in path order
    pub fn root_set(&self) -> Vec<PathBuf> {
        self.engine.compiler.lock().registry().paths()
    }

    pub fn version(&self, path: &Path) -> Option<u64> {
        self.engine.compiler.lock().registry().version(path)
    }

    /// Source map of the latest compile, for stack-trace rewriting
    pub fn source_map(&self, path: &Path) -> Option<Arc<str>> {
        self.engine.compiler.lock().registry().source_map(path)
    }

    pub fn diagnostics(&self, path: &Path) -> Vec<Diagnostic> {
        self.engine
            .compiler
            .lock()
            .registry()
            .get(path)
            .map(|f| f.diagnostics.clone())
            .unwrap_or_default()
    }

    pub fn is_stubbed(&self, path: &Path) -> bool {
        self.engine
            .compiler
            .lock()
            .registry()
            .get(path)
            .map(|f| f.stubbed)
            .unwrap_or(false)
    }

    pub fn is_reload_pending(&self, path: &Path) -> bool {
        self.engine.compiler.lock().registry().is_reload_pending(path)
    }

    /// Hot-swap indirection for a loaded path
    pub fn hot_module(&self, path: &Path) -> Option<Arc<HotModule>> {
        self.engine.hot.get(path)
    }

    pub fn module_cache(&self) -> &Arc<dyn ModuleCache> {
        &self.engine.cache
    }
}

impl fmt::Debug for HotloadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotloadContext")
            .field("root", &self.engine.config.project_root)
            .field("mode", &self.engine.config.mode)
            .field("initialized", &self.is_initialized())
            .field("watching", &self.is_watching())
            .finish()
    }
}

impl Drop for HotloadContext {
    fn drop(&mut self) {
        if let Some(mut active) = self.watch.lock().take() {
            active.pipeline.close();
        }
    }
}
