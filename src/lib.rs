//! chtl-modsys - CHTL Module System
//!
//! Loads CHTL markup modules (`.chtl`), script-extension modules (`.cjjs`),
//! structured manifests (JSON, YAML, XML) and packaged module directories,
//! and keeps them in a shared registry.
//!
//! # Architecture
//!
//! 1. **Resolution** (`modules::path`)
//!    - Maps a reference to a file through an ordered list of search paths
//!    - Appends default extensions when the reference has none
//!
//! 2. **Loading** (`modules::ModuleLoader`)
//!    - Cache check, content loading, validation, dependency loading,
//!      registration, in that order
//!    - Concurrent requests for one file share a single content load
//!    - Sync, parallel (rayon) and async (tokio) entry points
//!
//! 3. **Composition** (`modules::HybridComposer`)
//!    - Splits a file into markup and script halves and merges them
//!    - Dispatches script functions to bound native implementations
//!
//! # Example
//!
//! ```rust,no_run
//! use chtl_modsys::{LoadOptions, ModuleLoader};
//!
//! let loader = ModuleLoader::new();
//! loader.add_search_path("./modules");
//!
//! let result = loader.load("ui", &LoadOptions::default());
//! if result.success {
//!     for name in loader.resolve_dependencies("ui").unwrap_or_default() {
//!         println!("{}", name);
//!     }
//! } else {
//!     eprintln!("{}", result.error_message());
//! }
//! ```

pub mod config;
pub mod modules;

pub use config::LoaderConfig;
pub use modules::{
    detect_kind, DependencySpec, ExportItem, ExportKind, HybridComposer, HybridModule, LoadOptions,
    LoadResult, LoadStrategy, ModuleDescriptor, ModuleError, ModuleKind, ModuleLoader, ModuleStatus,
};
