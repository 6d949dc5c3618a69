//! Module Loader
//!
//! Orchestrates a load request through a fixed sequence of steps:
//!
//! ```text
//! Lookup -> Resolve -> Load -> Validate -> LoadDeps -> Register -> Cache -> Done
//! ```
//!
//! Any step before `Register` may abort; an aborted load leaves nothing in
//! the registry or the cache. Failures are reported through [`LoadResult`],
//! never as panics or `Err`.
//!
//! # Concurrency
//!
//! - The registry and the cache each sit behind their own short-held lock;
//!   no lock is held across file I/O or a content-loader call.
//! - Concurrent requests for the same resolved path share one content load
//!   through a per-key in-flight table.
//! - `LoadStrategy::Parallel` runs batch members and required dependencies
//!   on a rayon pool sized from [`LoaderConfig::effective_threads`]. Only
//!   callers outside the pool fan out; work already on the pool loads its
//!   dependencies inline, so a pool thread never joins while it leads an
//!   in-flight load.
//!
//! # Cycles
//!
//! The resolved paths (and names) on the current dependency chain travel
//! with each recursive load. A dependency that resolves to a path already
//! on the chain is skipped and recorded as a warning rather than waited on.
//! Across threads, a leader refuses to wait on a load that is itself
//! waiting, directly or transitively, on the leader's chain; that edge is
//! treated as a cycle the same way.
//!
//! # Shared results
//!
//! A caller that joins an in-flight load receives the leader's result. When
//! the leader ran without validation or without dependency loading and the
//! caller asked for them, the caller validates the shared module and loads
//! its dependencies itself before returning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::cache::{CacheStats, ModuleCache};
use super::content::{ContentLoader, ContentLoaderRegistry};
use super::descriptor::{ModuleDescriptor, ModuleKind};
use super::error::ModuleError;
use super::inflight::{Claim, InFlightTable, LoadProfile};
use super::options::{LoadOptions, LoadResult};
use super::path::PathResolver;
use super::resolver::DependencyResolver;
use crate::config::LoaderConfig;

/// One load on the current dependency chain.
#[derive(Clone, Debug)]
struct ChainLink {
    key: String,
    name: String,
}

fn cycle_error(chain: &[ChainLink], reference: &str) -> ModuleError {
    ModuleError::DependencyCycle(
        chain
            .iter()
            .map(|link| link.name.clone())
            .chain(std::iter::once(reference.to_string()))
            .collect(),
    )
}

/// Registered modules, keyed by resolved path with a name index.
#[derive(Default)]
struct Registry {
    by_path: HashMap<PathBuf, Arc<ModuleDescriptor>>,
    by_name: HashMap<String, PathBuf>,
}

impl Registry {
    fn insert(&mut self, path: PathBuf, module: Arc<ModuleDescriptor>) {
        if let Some(previous) = self.by_path.insert(path.clone(), Arc::clone(&module)) {
            if previous.name != module.name
                && self.by_name.get(&previous.name) == Some(&path)
            {
                self.by_name.remove(&previous.name);
            }
        }
        self.by_name.insert(module.name.clone(), path);
    }

    fn remove_path(&mut self, path: &Path) -> Option<Arc<ModuleDescriptor>> {
        let module = self.by_path.remove(path)?;
        if self.by_name.get(&module.name).map(PathBuf::as_path) == Some(path) {
            self.by_name.remove(&module.name);
        }
        Some(module)
    }

    fn by_name(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        self.by_name
            .get(name)
            .and_then(|p| self.by_path.get(p))
            .cloned()
    }

    fn clear(&mut self) {
        self.by_path.clear();
        self.by_name.clear();
    }
}

#[derive(Default)]
struct LoaderStats {
    total_load_count: AtomicU64,
    total_load_time_us: AtomicU64,
    failed_load_count: AtomicU64,
    cache_hits: AtomicU64,
    content_loads: AtomicU64,
}

impl LoaderStats {
    fn reset(&self) {
        self.total_load_count.store(0, Ordering::Relaxed);
        self.total_load_time_us.store(0, Ordering::Relaxed);
        self.failed_load_count.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.content_loads.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time counters.
#[derive(Clone, Debug, Default, Serialize)]
pub struct LoaderStatistics {
    /// Successful loads that ran a content loader.
    pub total_load_count: u64,
    pub total_load_time_ms: f64,
    pub average_load_time_ms: f64,
    pub failed_load_count: u64,
    pub cache_hits: u64,
    /// Content-loader invocations, successful or not.
    pub content_loads: u64,
    /// Callers that waited on another caller's in-flight load.
    pub single_flight_joins: u64,
}

/// One registered module in a diagnostic dump.
#[derive(Clone, Debug, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub version: String,
    pub kind: String,
    pub path: String,
}

/// Diagnostic view of loader state, rendered by `to_json`/`to_yaml`/`to_xml`.
#[derive(Clone, Debug, Serialize)]
pub struct LoaderSnapshot {
    pub enabled: bool,
    pub debug: bool,
    pub loaded_module_count: usize,
    pub cache_size: usize,
    pub total_load_count: u64,
    pub total_load_time_ms: f64,
    pub average_load_time_ms: f64,
    pub failed_load_count: u64,
    pub content_loaders: Vec<String>,
    pub search_paths: Vec<String>,
    pub modules: Vec<ModuleSummary>,
    pub cache: CacheStats,
}

/// Loads, validates, links and caches modules.
///
/// Create one per compilation session and pass it by reference; call
/// [`close`](ModuleLoader::close) when done.
pub struct ModuleLoader {
    config: LoaderConfig,
    enabled: AtomicBool,
    debug: AtomicBool,
    loaders: RwLock<ContentLoaderRegistry>,
    paths: RwLock<PathResolver>,
    cache: RwLock<Arc<ModuleCache>>,
    registry: RwLock<Registry>,
    in_flight: InFlightTable,
    resolver: DependencyResolver,
    stats: LoaderStats,
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("enabled", &self.is_enabled())
            .field("modules", &self.loaded_count())
            .field("search_paths", &self.search_paths())
            .field("loaders", &self.loader_names())
            .finish()
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::with_config(LoaderConfig::default())
    }

    pub fn with_config(config: LoaderConfig) -> Self {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(config.effective_threads())
            .thread_name(|i| format!("chtl-modsys-load-{}", i))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(target: "chtl_modsys::loader", error = %e, "falling back to the global rayon pool");
                None
            }
        };

        Self {
            enabled: AtomicBool::new(config.enabled),
            debug: AtomicBool::new(config.debug),
            loaders: RwLock::new(ContentLoaderRegistry::with_defaults()),
            paths: RwLock::new(Self::resolver_for(&config)),
            cache: RwLock::new(Arc::new(ModuleCache::new(config.cache_max_size, config.cache_ttl()))),
            registry: RwLock::new(Registry::default()),
            in_flight: InFlightTable::default(),
            resolver: DependencyResolver::new(),
            stats: LoaderStats::default(),
            pool,
            config,
        }
    }

    fn resolver_for(config: &LoaderConfig) -> PathResolver {
        let mut resolver = PathResolver::new().with_extensions(&config.default_extensions);
        for path in &config.search_paths {
            resolver.add_search_path(path.clone());
        }
        resolver
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    // ---- loading ------------------------------------------------------

    /// Load a module by name or path.
    pub fn load(&self, reference: &str, options: &LoadOptions) -> LoadResult {
        let deadline = Instant::now() + options.timeout;
        let result = self.load_inner(reference, options, 0, &[], deadline);

        if result.success {
            debug!(
                target: "chtl_modsys::loader",
                reference,
                elapsed_us = result.load_time.as_micros() as u64,
                warnings = result.warnings.len(),
                "module loaded"
            );
        } else {
            self.stats.failed_load_count.fetch_add(1, Ordering::Relaxed);
            debug!(
                target: "chtl_modsys::loader",
                reference,
                error = %result.error_message(),
                "module load failed"
            );
        }
        result
    }

    /// Load several modules. Results are returned in `references` order.
    ///
    /// With `LoadStrategy::Parallel` each reference is loaded as an
    /// independent task and all tasks are joined before returning.
    pub fn load_all<S>(&self, references: &[S], options: &LoadOptions) -> Vec<LoadResult>
    where
        S: AsRef<str> + Sync,
    {
        if options.strategy.is_parallel() && references.len() > 1 && !self.in_pool() {
            self.run_parallel(|| {
                references
                    .par_iter()
                    .map(|r| self.load(r.as_ref(), options))
                    .collect()
            })
        } else {
            references
                .iter()
                .map(|r| self.load(r.as_ref(), options))
                .collect()
        }
    }

    /// Load on tokio's blocking pool.
    #[cfg(feature = "async")]
    pub async fn load_async(self: &Arc<Self>, reference: impl Into<String>, options: LoadOptions) -> LoadResult {
        let loader = Arc::clone(self);
        let reference = reference.into();
        let task_reference = reference.clone();
        let started = Instant::now();

        match tokio::task::spawn_blocking(move || loader.load(&task_reference, &options)).await {
            Ok(result) => result,
            Err(e) => LoadResult::failed(
                ModuleError::LoadFailure {
                    path: PathBuf::from(reference),
                    reason: e.to_string(),
                },
                started.elapsed(),
            ),
        }
    }

    fn run_parallel<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// True on a worker thread of the load pool.
    fn in_pool(&self) -> bool {
        match &self.pool {
            Some(pool) => pool.current_thread_index().is_some(),
            None => rayon::current_thread_index().is_some(),
        }
    }

    fn step(&self, reference: &str, state: &'static str) {
        if self.debug.load(Ordering::Relaxed) {
            debug!(target: "chtl_modsys::loader", reference, state, "load step");
        } else {
            trace!(target: "chtl_modsys::loader", reference, state, "load step");
        }
    }

    fn load_inner(
        &self,
        reference: &str,
        options: &LoadOptions,
        depth: i32,
        chain: &[ChainLink],
        deadline: Instant,
    ) -> LoadResult {
        let start = Instant::now();

        if !self.is_enabled() {
            return LoadResult::failed(ModuleError::Disabled, start.elapsed());
        }

        self.step(reference, "resolve");
        let resolved = self.paths.read().resolve_with(reference, &options.search_paths);
        let Some(path) = resolved else {
            return LoadResult::failed(ModuleError::NotFound(reference.to_string()), start.elapsed());
        };
        let key = cache_key(&path);

        if chain.iter().any(|link| link.key == key) {
            return LoadResult::failed(cycle_error(chain, reference), start.elapsed());
        }

        self.step(reference, "lookup");
        if let Some(hit) = self.cached(&key, options) {
            return LoadResult::ok(hit, Vec::new(), start.elapsed());
        }

        let profile = LoadProfile {
            validate: options.validate,
            recursive: options.recursive,
        };
        match self.in_flight.claim(&key, profile) {
            Claim::Waiter(slot) => {
                let chain_keys: Vec<&str> = chain.iter().map(|link| link.key.as_str()).collect();
                let Some(wait) = self.in_flight.begin_wait(&chain_keys, &key) else {
                    debug!(target: "chtl_modsys::loader", key = %key, "in-flight load waits on this chain");
                    return LoadResult::failed(cycle_error(chain, reference), start.elapsed());
                };
                debug!(target: "chtl_modsys::loader", key = %key, "joining in-flight load");
                let shared = slot.wait_until(deadline);
                drop(wait);
                match shared {
                    Some(result) => {
                        self.adapt_shared(&key, result, slot.profile(), options, depth, chain, deadline)
                    }
                    None => LoadResult::failed(
                        ModuleError::Timeout {
                            reference: reference.to_string(),
                            elapsed: start.elapsed(),
                        },
                        start.elapsed(),
                    ),
                }
            }
            Claim::Leader(guard) => {
                // Another leader may have finished between the lookup and the claim.
                if let Some(hit) = self.cached(&key, options) {
                    return guard.finish(LoadResult::ok(hit, Vec::new(), start.elapsed()));
                }
                let result = self.load_claimed(reference, path, &key, options, depth, chain, deadline, start);
                guard.finish(result)
            }
        }
    }

    /// Apply the checks `options` asks for that the leader skipped.
    #[allow(clippy::too_many_arguments)]
    fn adapt_shared(
        &self,
        key: &str,
        result: LoadResult,
        leader: LoadProfile,
        options: &LoadOptions,
        depth: i32,
        chain: &[ChainLink],
        deadline: Instant,
    ) -> LoadResult {
        let Some(module) = result.module.clone().filter(|_| result.success) else {
            return result;
        };

        if options.validate && !leader.validate {
            let errors = module.validate();
            if !errors.is_empty() {
                return LoadResult::failed(ModuleError::ValidationFailure(errors), result.load_time)
                    .with_module(module)
                    .with_warnings(result.warnings);
            }
        }

        if options.recursive && !leader.recursive && options.allows_depth(depth) {
            let mut warnings = result.warnings;
            let mut child_chain = chain.to_vec();
            child_chain.push(ChainLink {
                key: key.to_string(),
                name: module.name.clone(),
            });
            let missing = self.load_dependencies(&module, options, depth + 1, &child_chain, deadline, &mut warnings);
            if !missing.is_empty() && !options.ignore_errors {
                return LoadResult::failed(ModuleError::DependencyMissing(missing), result.load_time)
                    .with_module(module)
                    .with_warnings(warnings);
            }
            return LoadResult::ok(module, warnings, result.load_time);
        }

        result
    }

    fn cached(&self, key: &str, options: &LoadOptions) -> Option<Arc<ModuleDescriptor>> {
        if !options.use_cache {
            return None;
        }
        let hit = self.cache().get(key)?;
        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        Some(hit)
    }

    #[allow(clippy::too_many_arguments)]
    fn load_claimed(
        &self,
        reference: &str,
        path: PathBuf,
        key: &str,
        options: &LoadOptions,
        depth: i32,
        chain: &[ChainLink],
        deadline: Instant,
        start: Instant,
    ) -> LoadResult {
        let timed_out = |warnings: Vec<String>| {
            LoadResult::failed(
                ModuleError::Timeout {
                    reference: reference.to_string(),
                    elapsed: start.elapsed(),
                },
                start.elapsed(),
            )
            .with_warnings(warnings)
        };

        self.step(reference, "load");
        let loader = self.loaders.read().find_loader(&path);
        let Some(loader) = loader else {
            return LoadResult::failed(ModuleError::NoLoader(path), start.elapsed());
        };

        self.stats.content_loads.fetch_add(1, Ordering::Relaxed);
        let mut module = match loader.load(&path) {
            Ok(module) => module,
            Err(e) => {
                warn!(
                    target: "chtl_modsys::loader",
                    path = %path.display(),
                    loader = loader.name(),
                    error = %e,
                    "content loader failed"
                );
                return LoadResult::failed(
                    ModuleError::LoadFailure {
                        path,
                        reason: e.to_string(),
                    },
                    start.elapsed(),
                );
            }
        };
        module.path = Some(path.clone());
        module.mark_loading();

        if Instant::now() >= deadline {
            return timed_out(Vec::new());
        }

        if options.validate {
            self.step(reference, "validate");
            let errors = module.validate();
            if !errors.is_empty() {
                module.mark_error("Module validation failed");
                return LoadResult::failed(ModuleError::ValidationFailure(errors), start.elapsed())
                    .with_module(Arc::new(module));
            }
        }

        let mut warnings = Vec::new();
        if options.recursive && options.allows_depth(depth) {
            self.step(reference, "load-deps");
            let mut child_chain = chain.to_vec();
            child_chain.push(ChainLink {
                key: key.to_string(),
                name: module.name.clone(),
            });
            let missing = self.load_dependencies(&module, options, depth + 1, &child_chain, deadline, &mut warnings);

            if !missing.is_empty() && !options.ignore_errors {
                let error = ModuleError::DependencyMissing(missing);
                module.mark_error(error.to_string());
                return LoadResult::failed(error, start.elapsed())
                    .with_module(Arc::new(module))
                    .with_warnings(warnings);
            }
        }
        self.check_versions(&module, &mut warnings);

        if Instant::now() >= deadline {
            return timed_out(warnings);
        }

        self.step(reference, "register");
        module.mark_loaded();
        let module = Arc::new(module);
        self.registry.write().insert(path, Arc::clone(&module));

        if options.use_cache {
            self.step(reference, "cache");
            self.cache().put(key, Arc::clone(&module));
        }

        let elapsed = start.elapsed();
        self.stats.total_load_count.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_load_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.step(reference, "done");

        LoadResult::ok(module, warnings, elapsed)
    }

    /// Load required dependencies that are not yet registered.
    /// Returns the names that could not be loaded.
    fn load_dependencies(
        &self,
        module: &ModuleDescriptor,
        options: &LoadOptions,
        depth: i32,
        chain: &[ChainLink],
        deadline: Instant,
        warnings: &mut Vec<String>,
    ) -> Vec<String> {
        let mut pending = Vec::new();
        for dep in module.required_dependencies() {
            if chain.iter().any(|link| link.name == dep.name) {
                warnings.push(cycle_error(chain, &dep.name).to_string());
                warn!(target: "chtl_modsys::loader", module = %module.name, dependency = %dep.name, "dependency cycle");
                continue;
            }
            if self.registry.read().by_name(&dep.name).is_some() {
                continue;
            }
            pending.push(dep.name.as_str());
        }

        let fan_out = options.strategy.is_parallel() && pending.len() > 1 && !self.in_pool();
        let results: Vec<(&str, LoadResult)> = if fan_out {
            self.run_parallel(|| {
                pending
                    .par_iter()
                    .map(|name| (*name, self.load_inner(name, options, depth, chain, deadline)))
                    .collect()
            })
        } else {
            pending
                .iter()
                .map(|name| (*name, self.load_inner(name, options, depth, chain, deadline)))
                .collect()
        };

        let mut missing = Vec::new();
        for (name, result) in results {
            warnings.extend(result.warnings.iter().map(|w| format!("{}: {}", name, w)));
            if let Some(cycle @ ModuleError::DependencyCycle(_)) = &result.error {
                warn!(target: "chtl_modsys::loader", module = %module.name, dependency = name, "dependency cycle");
                warnings.push(cycle.to_string());
                continue;
            }
            if !result.success {
                let message = format!("Failed to load dependency '{}': {}", name, result.error_message());
                warn!(
                    target: "chtl_modsys::loader",
                    module = %module.name,
                    dependency = name,
                    error = %result.error_message(),
                    "dependency load failed"
                );
                warnings.push(message);
                missing.push(name.to_string());
            }
        }
        missing
    }

    fn check_versions(&self, module: &ModuleDescriptor, warnings: &mut Vec<String>) {
        let registry = self.registry.read();
        for dep in module.required_dependencies() {
            if let Some(found) = registry.by_name(&dep.name) {
                if !dep.accepts(&found.version) {
                    let message = format!(
                        "Dependency '{}' version {} does not satisfy '{}'",
                        dep.name, found.version, dep.version_constraint
                    );
                    warn!(
                        target: "chtl_modsys::loader",
                        module = %module.name,
                        dependency = %dep.name,
                        version = %found.version,
                        constraint = %dep.version_constraint,
                        "version constraint not satisfied"
                    );
                    warnings.push(message);
                }
            }
        }
    }

    // ---- dependency queries -------------------------------------------

    /// Load order for a registered module's required dependencies, itself last.
    pub fn resolve_dependencies(&self, name: &str) -> Result<Vec<String>, ModuleError> {
        let module = self
            .get_module_by_name(name)
            .ok_or_else(|| ModuleError::UnknownModule(name.to_string()))?;
        Ok(self.resolver.resolve(&module, |n| self.get_module_by_name(n)))
    }

    /// Same as `resolve_dependencies`, but a cycle is an error.
    pub fn resolve_dependencies_strict(&self, name: &str) -> Result<Vec<String>, ModuleError> {
        let module = self
            .get_module_by_name(name)
            .ok_or_else(|| ModuleError::UnknownModule(name.to_string()))?;
        self.resolver.resolve_strict(&module, |n| self.get_module_by_name(n))
    }

    /// Required dependencies of a registered module that are not registered.
    pub fn missing_dependencies(&self, name: &str) -> Result<Vec<String>, ModuleError> {
        let module = self
            .get_module_by_name(name)
            .ok_or_else(|| ModuleError::UnknownModule(name.to_string()))?;
        Ok(self.resolver.missing(&module, |n| self.get_module_by_name(n)))
    }

    // ---- unloading ----------------------------------------------------

    /// Unload by module name or resolved path.
    ///
    /// Holders of the module keep a valid reference; only the loader's
    /// references are dropped.
    pub fn unload(&self, name_or_path: &str) -> bool {
        let path = {
            let registry = self.registry.read();
            match registry.by_name.get(name_or_path) {
                Some(path) => path.clone(),
                None => PathBuf::from(name_or_path),
            }
        };
        self.unload_path(&path)
    }

    pub fn unload_module(&self, module: &ModuleDescriptor) -> bool {
        match module.path() {
            Some(path) => self.unload_path(path),
            None => self.unload(&module.name),
        }
    }

    fn unload_path(&self, path: &Path) -> bool {
        let removed = self.registry.write().remove_path(path);
        self.cache().remove(&cache_key(path));
        if let Some(module) = &removed {
            debug!(target: "chtl_modsys::loader", name = %module.name, path = %path.display(), "module unloaded");
        }
        removed.is_some()
    }

    /// Drop every module and reset statistics. Content loaders and search
    /// paths are kept.
    pub fn unload_all(&self) {
        self.registry.write().clear();
        self.cache().clear();
        self.stats.reset();
        self.in_flight.reset_counters();
    }

    /// Restore the state right after construction with this loader's config.
    pub fn reset(&self) {
        *self.loaders.write() = ContentLoaderRegistry::with_defaults();
        *self.paths.write() = Self::resolver_for(&self.config);
        *self.cache.write() = Arc::new(ModuleCache::new(
            self.config.cache_max_size,
            self.config.cache_ttl(),
        ));
        self.registry.write().clear();
        self.stats.reset();
        self.in_flight.reset_counters();
        self.enabled.store(self.config.enabled, Ordering::Relaxed);
        self.debug.store(self.config.debug, Ordering::Relaxed);
    }

    /// End the loader's lifecycle. Later loads fail with `Disabled`.
    pub fn close(&self) {
        self.unload_all();
        self.set_enabled(false);
    }

    // ---- registry queries ---------------------------------------------

    /// Registered module at a resolved path.
    pub fn get_module(&self, path: impl AsRef<Path>) -> Option<Arc<ModuleDescriptor>> {
        self.registry.read().by_path.get(path.as_ref()).cloned()
    }

    pub fn get_module_by_name(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        self.registry.read().by_name(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.get_module_by_name(name).is_some()
    }

    /// Registered modules of one kind, sorted by name.
    pub fn get_modules_by_kind(&self, kind: ModuleKind) -> Vec<Arc<ModuleDescriptor>> {
        let mut modules: Vec<_> = self
            .registry
            .read()
            .by_path
            .values()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        modules
    }

    /// All registered modules, sorted by name.
    pub fn modules(&self) -> Vec<Arc<ModuleDescriptor>> {
        let mut modules: Vec<_> = self.registry.read().by_path.values().cloned().collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        modules
    }

    pub fn loaded_count(&self) -> usize {
        self.registry.read().by_path.len()
    }

    /// Non-recursive scan of the search paths (see `PathResolver::find_by_pattern`).
    pub fn find_modules(&self, pattern: &str) -> Vec<PathBuf> {
        self.paths.read().find_by_pattern(pattern)
    }

    /// Resolve a reference without loading it.
    pub fn resolve_path(&self, reference: &str) -> Option<PathBuf> {
        self.paths.read().resolve(reference)
    }

    // ---- administration -----------------------------------------------

    pub fn add_search_path(&self, path: impl Into<PathBuf>) {
        self.paths.write().add_search_path(path);
    }

    pub fn remove_search_path(&self, path: impl AsRef<Path>) -> bool {
        self.paths.write().remove_search_path(path.as_ref())
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.paths.read().search_paths().to_vec()
    }

    pub fn register_loader(&self, loader: Arc<dyn ContentLoader>) {
        self.loaders.write().register(loader);
    }

    pub fn unregister_loader(&self, loader: &Arc<dyn ContentLoader>) -> bool {
        self.loaders.write().unregister(loader)
    }

    pub fn unregister_loader_by_name(&self, name: &str) -> bool {
        self.loaders.write().unregister_by_name(name)
    }

    pub fn clear_loaders(&self) {
        self.loaders.write().clear();
    }

    pub fn loader_names(&self) -> Vec<String> {
        self.loaders.read().names()
    }

    /// Swap in a (possibly shared) cache.
    pub fn set_cache(&self, cache: Arc<ModuleCache>) {
        *self.cache.write() = cache;
    }

    pub fn cache(&self) -> Arc<ModuleCache> {
        Arc::clone(&self.cache.read())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Promote per-step load events from `trace` to `debug`.
    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Loader-level problems: no content loaders, missing search
    /// directories, registered modules that no longer validate.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.loaders.read().is_empty() {
            errors.push("No content loaders registered".to_string());
        }
        for path in self.search_paths() {
            if !path.is_dir() {
                errors.push(format!("Search path does not exist: {}", path.display()));
            }
        }
        for module in self.modules() {
            for err in module.validate() {
                errors.push(format!("Module {}: {}", module.name, err));
            }
        }

        errors
    }

    // ---- diagnostics --------------------------------------------------

    pub fn stats(&self) -> LoaderStatistics {
        let count = self.stats.total_load_count.load(Ordering::Relaxed);
        let total_ms = self.stats.total_load_time_us.load(Ordering::Relaxed) as f64 / 1000.0;
        LoaderStatistics {
            total_load_count: count,
            total_load_time_ms: total_ms,
            average_load_time_ms: if count > 0 { total_ms / count as f64 } else { 0.0 },
            failed_load_count: self.stats.failed_load_count.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            content_loads: self.stats.content_loads.load(Ordering::Relaxed),
            single_flight_joins: self.in_flight.joins(),
        }
    }

    pub fn snapshot(&self) -> LoaderSnapshot {
        let stats = self.stats();
        let cache = self.cache();
        LoaderSnapshot {
            enabled: self.is_enabled(),
            debug: self.is_debug(),
            loaded_module_count: self.loaded_count(),
            cache_size: cache.len(),
            total_load_count: stats.total_load_count,
            total_load_time_ms: stats.total_load_time_ms,
            average_load_time_ms: stats.average_load_time_ms,
            failed_load_count: stats.failed_load_count,
            content_loaders: self.loader_names(),
            search_paths: self
                .search_paths()
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            modules: self
                .modules()
                .iter()
                .map(|m| ModuleSummary {
                    name: m.name.clone(),
                    version: m.version.clone(),
                    kind: m.kind.to_string(),
                    path: m.path().map(|p| p.display().to_string()).unwrap_or_default(),
                })
                .collect(),
            cache: cache.stats(),
        }
    }

    pub fn to_json(&self) -> Result<String, ModuleError> {
        serde_json::to_string_pretty(&self.snapshot()).map_err(|e| ModuleError::Serialization(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, ModuleError> {
        serde_yaml::to_string(&self.snapshot()).map_err(|e| ModuleError::Serialization(e.to_string()))
    }

    pub fn to_xml(&self) -> Result<String, ModuleError> {
        quick_xml::se::to_string_with_root("loader", &self.snapshot())
            .map_err(|e| ModuleError::Serialization(e.to_string()))
    }
}

fn cache_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
