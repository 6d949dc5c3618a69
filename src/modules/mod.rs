//! Module System
//!
//! Resolves, loads, caches and tracks CHTL modules and their
//! script-extension counterparts:
//! - `ModuleDescriptor` - Parsed module record (metadata, dependencies, exports, functions)
//! - `PathResolver` - Reference to file resolution over ordered search directories
//! - `ModuleCache` - Bounded, TTL-limited cache keyed by resolved path
//! - `ContentLoader` / `ContentLoaderRegistry` - Pluggable per-format parsers
//! - `DependencyResolver` - Load order over required dependencies
//! - `ModuleLoader` - Orchestrator with registry, single-flight loads and diagnostics
//! - `HybridComposer` - Markup + script composite modules and function dispatch
//! - `version` - Lenient semver parsing and constraint matching

pub mod cache;
pub mod content;
mod descriptor;
mod error;
mod hybrid;
mod inflight;
mod loader;
mod options;
pub mod path;
mod resolver;
pub mod version;

pub use cache::{CacheStats, ModuleCache};
pub use content::{
    ContentLoader, ContentLoaderRegistry, DefaultContentLoader, MarkupModuleLoader, PackageDirLoader,
    ScriptModuleLoader,
};
pub use descriptor::{
    DependencySpec, ExportItem, ExportKind, ModuleDescriptor, ModuleKind, ModuleStatus, ScriptFunction,
};
pub use error::ModuleError;
pub use hybrid::{detect_kind, find_module_files, HybridComposer, HybridModule, NativeFunction};
pub use loader::{LoaderSnapshot, LoaderStatistics, ModuleLoader, ModuleSummary};
pub use options::{LoadOptions, LoadResult, LoadStrategy, DEFAULT_TIMEOUT};
pub use path::PathResolver;
pub use resolver::DependencyResolver;
