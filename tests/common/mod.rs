//! Shared helpers for the module system integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chtl_modsys::modules::content::parse_markup_module;
use chtl_modsys::modules::ContentLoader;
use chtl_modsys::{LoaderConfig, ModuleDescriptor, ModuleError, ModuleLoader};

/// Directory holding the on-disk module fixtures.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/modules")
}

/// Loader whose only search path is the fixture directory.
pub fn fixture_loader() -> ModuleLoader {
    ModuleLoader::with_config(LoaderConfig::default().with_search_path(fixtures_dir()))
}

/// Loader searching `dir` only.
pub fn loader_in(dir: &Path) -> ModuleLoader {
    ModuleLoader::with_config(LoaderConfig::default().with_search_path(dir))
}

pub fn write_module(dir: &Path, file: &str, text: &str) -> PathBuf {
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, text).unwrap();
    path
}

/// Content loader for `.slow` files that sleeps before parsing and counts
/// how many times it ran.
pub struct CountingLoader {
    pub calls: AtomicUsize,
    pub delay: Duration,
}

impl CountingLoader {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentLoader for CountingLoader {
    fn name(&self) -> &str {
        "counting"
    }

    fn supported_extensions(&self) -> Vec<String> {
        vec!["slow".to_string()]
    }

    fn load(&self, path: &Path) -> Result<ModuleDescriptor, ModuleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let text = fs::read_to_string(path).map_err(|e| ModuleError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(parse_markup_module(path, &text))
    }
}
