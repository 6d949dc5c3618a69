//! Load options and results.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::descriptor::ModuleDescriptor;
use super::error::ModuleError;

/// Default bound on a single `load` call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How a load (or batch of loads) is executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStrategy {
    /// Inline, in the caller's thread.
    #[default]
    Sync,
    /// Batch members and required dependencies run on the rayon pool.
    Parallel,
    /// Reserved; currently behaves like `Sync`.
    Lazy,
    /// Reserved; currently behaves like `Sync`.
    Eager,
}

impl LoadStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" => Some(LoadStrategy::Sync),
            "parallel" => Some(LoadStrategy::Parallel),
            "lazy" => Some(LoadStrategy::Lazy),
            "eager" => Some(LoadStrategy::Eager),
            _ => None,
        }
    }

    pub fn is_parallel(&self) -> bool {
        *self == LoadStrategy::Parallel
    }
}

/// Per-call load configuration.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub strategy: LoadStrategy,
    /// Load required dependencies before registering the module.
    pub recursive: bool,
    /// Run `ModuleDescriptor::validate` on the loaded module.
    pub validate: bool,
    /// Consult and populate the module cache.
    pub use_cache: bool,
    pub timeout: Duration,
    /// Dependency depth limit; `<= 0` means unbounded.
    pub max_depth: i32,
    /// When false, a failed required dependency fails the parent load.
    pub ignore_errors: bool,
    /// Extra search directories for this call only, consulted after the
    /// loader's own list.
    pub search_paths: Vec<PathBuf>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            strategy: LoadStrategy::Sync,
            recursive: true,
            validate: true,
            use_cache: true,
            timeout: DEFAULT_TIMEOUT,
            max_depth: -1,
            ignore_errors: true,
            search_paths: Vec::new(),
        }
    }
}

impl LoadOptions {
    /// Default options with the parallel strategy.
    pub fn parallel() -> Self {
        Self {
            strategy: LoadStrategy::Parallel,
            ..Self::default()
        }
    }

    /// Default options that fail on any missing required dependency.
    pub fn strict() -> Self {
        Self {
            ignore_errors: false,
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_depth(mut self, max_depth: i32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// True when a dependency at `depth` may still be descended into.
    pub(crate) fn allows_depth(&self, depth: i32) -> bool {
        self.max_depth <= 0 || depth < self.max_depth
    }
}

/// Outcome of a single load.
///
/// A successful result always carries a module. A failed result may carry
/// the partially built module (validation failures do).
#[derive(Clone, Debug)]
pub struct LoadResult {
    pub success: bool,
    pub module: Option<Arc<ModuleDescriptor>>,
    pub error: Option<ModuleError>,
    pub warnings: Vec<String>,
    pub load_time: Duration,
}

impl LoadResult {
    pub fn ok(module: Arc<ModuleDescriptor>, warnings: Vec<String>, load_time: Duration) -> Self {
        Self {
            success: true,
            module: Some(module),
            error: None,
            warnings,
            load_time,
        }
    }

    pub fn failed(error: ModuleError, load_time: Duration) -> Self {
        Self {
            success: false,
            module: None,
            error: Some(error),
            warnings: Vec::new(),
            load_time,
        }
    }

    pub fn with_module(mut self, module: Arc<ModuleDescriptor>) -> Self {
        self.module = Some(module);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Error text, empty on success.
    pub fn error_message(&self) -> String {
        self.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
    }

    /// Error message followed by any details (validation problems).
    pub fn error_lines(&self) -> Vec<String> {
        match &self.error {
            Some(e) => std::iter::once(e.to_string()).chain(e.details()).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = LoadOptions::default();
        assert_eq!(options.strategy, LoadStrategy::Sync);
        assert!(options.recursive && options.validate && options.use_cache);
        assert!(options.ignore_errors);
        assert_eq!(options.max_depth, -1);
        assert_eq!(options.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_depth_limit() {
        let unbounded = LoadOptions::default();
        assert!(unbounded.allows_depth(1_000));
        assert!(LoadOptions::default().with_max_depth(0).allows_depth(50));

        let limited = LoadOptions::default().with_max_depth(2);
        assert!(limited.allows_depth(1));
        assert!(!limited.allows_depth(2));
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(LoadStrategy::parse("Parallel"), Some(LoadStrategy::Parallel));
        assert_eq!(LoadStrategy::parse("lazy"), Some(LoadStrategy::Lazy));
        assert_eq!(LoadStrategy::parse("threads"), None);
    }

    #[test]
    fn test_result_messages() {
        let failed = LoadResult::failed(ModuleError::NotFound("foo".into()), Duration::ZERO);
        assert!(!failed.success);
        assert_eq!(failed.error_message(), "Module not found: foo");

        let invalid = LoadResult::failed(
            ModuleError::ValidationFailure(vec!["Duplicate export name: x".into()]),
            Duration::ZERO,
        );
        assert_eq!(
            invalid.error_lines(),
            vec!["Module validation failed", "Duplicate export name: x"]
        );

        let ok = LoadResult::ok(Arc::new(ModuleDescriptor::new("a", "1.0.0")), vec![], Duration::ZERO);
        assert!(ok.success && ok.module.is_some());
        assert!(ok.error_message().is_empty());
    }
}
