//! Content Loaders
//!
//! A content loader turns one file (or packaged directory) into a
//! [`ModuleDescriptor`]. Loaders are pluggable: the [`ContentLoaderRegistry`]
//! keeps them in registration order and the first one whose `can_load`
//! accepts a path wins.
//!
//! Shipped loaders:
//! - [`DefaultContentLoader`] - `.chtl`, `.json`, `.xml`, `.yaml`, `.yml`
//! - [`ScriptModuleLoader`] - `.cjjs` script-extension modules
//! - [`PackageDirLoader`] - `Name/{info,src}/Name.chtl` directories
//! - [`MarkupModuleLoader`] - `.chtl` only; the hybrid composer's default
//!   markup loader

mod default;
mod header;
mod manifest;
mod markup;
mod package_dir;
mod script;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::error::ModuleError;
use super::descriptor::ModuleDescriptor;

pub use default::DefaultContentLoader;
pub use manifest::{parse_json_manifest, parse_xml_identity, parse_yaml_manifest, ModuleManifest};
pub use markup::{parse_markup_module, MarkupModuleLoader};
pub use package_dir::PackageDirLoader;
pub use script::{parse_script_module, ScriptModuleLoader};

/// Plugin interface for turning a path into a module.
pub trait ContentLoader: Send + Sync {
    /// Short identifier used by `unregister_by_name` and diagnostics.
    fn name(&self) -> &str;

    /// Extensions (without the dot) this loader claims.
    fn supported_extensions(&self) -> Vec<String>;

    /// Whether this loader accepts `path`. Defaults to an extension check.
    fn can_load(&self, path: &Path) -> bool {
        match extension_of(path) {
            Some(ext) => self
                .supported_extensions()
                .iter()
                .any(|e| e.eq_ignore_ascii_case(&ext)),
            None => false,
        }
    }

    /// Read `path` and build a descriptor with at least `name`, `version`
    /// and `kind` populated.
    fn load(&self, path: &Path) -> Result<ModuleDescriptor, ModuleError>;
}

/// Lower-cased extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Module name derived from a file name (`ui.chtl` -> `ui`).
pub fn stem_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub(crate) fn read_source(path: &Path) -> Result<String, ModuleError> {
    fs::read_to_string(path).map_err(|e| ModuleError::io(path, &e))
}

/// Ordered collection of content loaders.
#[derive(Clone, Default)]
pub struct ContentLoaderRegistry {
    loaders: Vec<Arc<dyn ContentLoader>>,
}

impl std::fmt::Debug for ContentLoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentLoaderRegistry")
            .field("loaders", &self.names())
            .finish()
    }
}

impl ContentLoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the shipped loaders in their default order.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DefaultContentLoader::new()));
        registry.register(Arc::new(ScriptModuleLoader::new()));
        registry.register(Arc::new(PackageDirLoader::new()));
        registry
    }

    pub fn register(&mut self, loader: Arc<dyn ContentLoader>) {
        self.loaders.push(loader);
    }

    /// Remove a previously registered loader (by identity).
    pub fn unregister(&mut self, loader: &Arc<dyn ContentLoader>) -> bool {
        let target = Arc::as_ptr(loader) as *const ();
        let before = self.loaders.len();
        self.loaders
            .retain(|l| Arc::as_ptr(l) as *const () != target);
        before != self.loaders.len()
    }

    /// Remove every loader with the given name.
    pub fn unregister_by_name(&mut self, name: &str) -> bool {
        let before = self.loaders.len();
        self.loaders.retain(|l| l.name() != name);
        before != self.loaders.len()
    }

    /// First loader, in registration order, that accepts `path`.
    pub fn find_loader(&self, path: &Path) -> Option<Arc<dyn ContentLoader>> {
        self.loaders.iter().find(|l| l.can_load(path)).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.loaders.iter().map(|l| l.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    pub fn clear(&mut self) {
        self.loaders.clear();
    }
}
