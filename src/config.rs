//! Loader Configuration
//!
//! A project may place a `chtl-modsys.toml` next to its sources:
//!
//! ```toml
//! [loader]
//! enabled = true
//! debug = false
//! search_paths = ["modules", "vendor/modules"]
//! default_extensions = ["chtl", "cjjs"]
//! cache_max_size = 1000
//! cache_ttl_secs = 1800
//! parallel_threads = 0   # 0 = one per CPU
//! ```
//!
//! Every key is optional; missing keys take the defaults shown above.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::modules::cache::{DEFAULT_MAX_SIZE, DEFAULT_TTL};
use crate::modules::path::DEFAULT_EXTENSIONS;
use crate::modules::ModuleError;

/// File name looked up by [`LoaderConfig::load`].
pub const CONFIG_FILE_NAME: &str = "chtl-modsys.toml";

/// Settings applied when a `ModuleLoader` is constructed or reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub enabled: bool,
    pub debug: bool,
    pub search_paths: Vec<PathBuf>,
    pub default_extensions: Vec<String>,
    pub cache_max_size: usize,
    pub cache_ttl_secs: u64,
    pub parallel_threads: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            search_paths: Vec::new(),
            default_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            cache_max_size: DEFAULT_MAX_SIZE,
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            parallel_threads: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    loader: LoaderConfig,
}

impl LoaderConfig {
    /// Read `chtl-modsys.toml` from `dir`.
    ///
    /// Returns `Ok(None)` when the file does not exist. Relative search paths
    /// are resolved against `dir`.
    pub fn load(dir: &Path) -> Result<Option<Self>, ModuleError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ModuleError::io(&path, &e))?;
        let mut config = Self::parse_toml(&content)?;
        config.search_paths = config
            .search_paths
            .into_iter()
            .map(|p| if p.is_absolute() { p } else { dir.join(p) })
            .collect();
        Ok(Some(config))
    }

    /// Parse configuration from TOML text.
    pub fn parse_toml(content: &str) -> Result<Self, ModuleError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ModuleError::Config(e.to_string()))?;
        Ok(file.loader)
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Thread count for parallel loads.
    pub fn effective_threads(&self) -> usize {
        if self.parallel_threads == 0 {
            num_cpus::get()
        } else {
            self.parallel_threads
        }
    }

    /// Per-user module directory (`<data dir>/chtl/modules`).
    pub fn user_module_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("chtl").join("modules"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert!(config.enabled);
        assert_eq!(config.cache_max_size, 1000);
        assert_eq!(config.cache_ttl(), Duration::from_secs(1800));
        assert_eq!(config.default_extensions, vec!["chtl", "cjjs"]);
        assert!(config.effective_threads() >= 1);
    }

    #[test]
    fn test_parse_partial_config() {
        let config = LoaderConfig::parse_toml("[loader]\ncache_max_size = 5\ndebug = true\n").unwrap();
        assert_eq!(config.cache_max_size, 5);
        assert!(config.debug);
        assert!(config.enabled);
        assert_eq!(config.cache_ttl_secs, 1800);

        let empty = LoaderConfig::parse_toml("").unwrap();
        assert_eq!(empty, LoaderConfig::default());
    }

    #[test]
    fn test_parse_invalid_config() {
        let err = LoaderConfig::parse_toml("[loader]\ncache_max_size = \"lots\"").unwrap_err();
        assert!(matches!(err, ModuleError::Config(_)));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = TempDir::new().unwrap();
        assert!(LoaderConfig::load(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[loader]\nsearch_paths = [\"modules\", \"/abs/mods\"]\nparallel_threads = 3\n",
        )
        .unwrap();
        let config = LoaderConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.search_paths[0], dir.path().join("modules"));
        assert_eq!(config.search_paths[1], PathBuf::from("/abs/mods"));
        assert_eq!(config.effective_threads(), 3);
    }
}
