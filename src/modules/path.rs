//! Module Path Resolution
//!
//! Turns a module reference into a filesystem path. A reference is tried:
//! 1. as given (absolute or relative to the working directory);
//! 2. joined onto each search path, in registration order;
//! 3. if it has no extension, steps 1-2 again with each default extension.
//!
//! Joined paths are not canonicalized: `./modules` + `foo.chtl` resolves to
//! `./modules/foo.chtl`, which is also the key the loader registers it under.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Extensions appended to extension-less references, in order.
pub const DEFAULT_EXTENSIONS: &[&str] = &["chtl", "cjjs"];

/// True for a directory laid out as a packaged module (`info/` or `src/`).
pub fn is_package_dir(path: &Path) -> bool {
    path.is_dir() && (path.join("info").is_dir() || path.join("src").is_dir())
}

fn is_module_candidate(path: &Path) -> bool {
    path.is_file() || is_package_dir(path)
}

/// Ordered search-path resolver.
#[derive(Clone, Debug)]
pub struct PathResolver {
    search_paths: Vec<PathBuf>,
    default_extensions: Vec<String>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PathResolver {
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
            default_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Replace the default extension list. Leading dots are stripped.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.default_extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Append a search path. Adding an existing path is a no-op.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    /// Returns true if the path was present.
    pub fn remove_search_path(&mut self, path: &Path) -> bool {
        let before = self.search_paths.len();
        self.search_paths.retain(|p| p != path);
        before != self.search_paths.len()
    }

    pub fn clear_search_paths(&mut self) {
        self.search_paths.clear();
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn default_extensions(&self) -> &[String] {
        &self.default_extensions
    }

    /// Resolve a reference using the registered search paths.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        self.resolve_with(reference, &[])
    }

    /// Resolve a reference, consulting `extra` after the registered search
    /// paths. `extra` applies to this call only.
    pub fn resolve_with(&self, reference: &str, extra: &[PathBuf]) -> Option<PathBuf> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        if let Some(found) = self.try_locations(reference, extra) {
            return Some(found);
        }

        if Path::new(reference).extension().is_none() {
            for ext in &self.default_extensions {
                let with_ext = format!("{}.{}", reference, ext);
                if let Some(found) = self.try_locations(&with_ext, extra) {
                    return Some(found);
                }
            }
        }

        None
    }

    fn try_locations(&self, reference: &str, extra: &[PathBuf]) -> Option<PathBuf> {
        let direct = Path::new(reference);
        if is_module_candidate(direct) {
            return Some(direct.to_path_buf());
        }
        if direct.is_absolute() {
            return None;
        }

        self.search_paths
            .iter()
            .chain(extra.iter())
            .map(|dir| dir.join(reference))
            .find(|candidate| is_module_candidate(candidate))
    }

    /// Non-recursive scan of every search path for entries whose file name
    /// matches `pattern`.
    ///
    /// Without `*` the pattern is a substring match. With `*`, only the text
    /// before the first `*` is used, as a prefix.
    pub fn find_by_pattern(&self, pattern: &str) -> Vec<PathBuf> {
        let matcher = NameMatcher::new(pattern);
        let mut found = Vec::new();

        for dir in &self.search_paths {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        target: "chtl_modsys::path",
                        dir = %dir.display(),
                        error = %e,
                        "unreadable search directory"
                    );
                    continue;
                }
            };

            let mut matches: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| matcher.matches(&entry.file_name().to_string_lossy()))
                .map(|entry| entry.path())
                .collect();
            matches.sort();
            found.extend(matches);
        }

        found
    }
}

enum NameMatcher {
    Contains(String),
    Prefix(String),
}

impl NameMatcher {
    fn new(pattern: &str) -> Self {
        match pattern.split_once('*') {
            Some((prefix, _)) => NameMatcher::Prefix(prefix.to_string()),
            None => NameMatcher::Contains(pattern.to_string()),
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NameMatcher::Contains(needle) => name.contains(needle.as_str()),
            NameMatcher::Prefix(prefix) => name.starts_with(prefix.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, "").unwrap();
        path
    }

    #[test]
    fn test_resolve_in_search_path_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        touch(second.path(), "ui.chtl");
        let expected = touch(first.path(), "ui.chtl");

        let mut resolver = PathResolver::new();
        resolver.add_search_path(first.path());
        resolver.add_search_path(second.path());

        assert_eq!(resolver.resolve("ui.chtl"), Some(expected));
    }

    #[test]
    fn test_resolve_appends_default_extension() {
        let dir = TempDir::new().unwrap();
        let expected = touch(dir.path(), "widgets.cjjs");

        let mut resolver = PathResolver::new();
        resolver.add_search_path(dir.path());

        assert_eq!(resolver.resolve("widgets"), Some(expected));
    }

    #[test]
    fn test_explicit_extension_is_not_rewritten() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "theme.chtl");

        let mut resolver = PathResolver::new();
        resolver.add_search_path(dir.path());

        assert!(resolver.resolve("theme.json").is_none());
    }

    #[test]
    fn test_resolve_direct_path() {
        let dir = TempDir::new().unwrap();
        let file = touch(dir.path(), "direct.chtl");

        let resolver = PathResolver::new();
        assert_eq!(resolver.resolve(file.to_str().unwrap()), Some(file));
    }

    #[test]
    fn test_resolve_with_extra_paths_is_per_call() {
        let dir = TempDir::new().unwrap();
        let expected = touch(dir.path(), "extra.chtl");

        let resolver = PathResolver::new();
        let extra = vec![dir.path().to_path_buf()];
        assert_eq!(resolver.resolve_with("extra", &extra), Some(expected));
        assert!(resolver.resolve("extra").is_none());
    }

    #[test]
    fn test_resolve_package_directory() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Ui/src/Ui.chtl");
        fs::create_dir_all(dir.path().join("plain")).unwrap();

        let mut resolver = PathResolver::new();
        resolver.add_search_path(dir.path());

        assert_eq!(resolver.resolve("Ui"), Some(dir.path().join("Ui")));
        assert!(resolver.resolve("plain").is_none());
    }

    #[test]
    fn test_missing_reference_is_none() {
        let resolver = PathResolver::new();
        assert!(resolver.resolve("does-not-exist-anywhere").is_none());
        assert!(resolver.resolve("").is_none());
    }

    #[test]
    fn test_search_path_admin() {
        let mut resolver = PathResolver::new();
        resolver.add_search_path("a");
        resolver.add_search_path("b");
        resolver.add_search_path("a");
        assert_eq!(resolver.search_paths().len(), 2);
        assert!(resolver.remove_search_path(Path::new("a")));
        assert!(!resolver.remove_search_path(Path::new("a")));
        assert_eq!(resolver.search_paths(), &[PathBuf::from("b")]);
    }

    #[test]
    fn test_find_by_pattern() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "ui-buttons.chtl");
        touch(dir.path(), "ui-forms.chtl");
        touch(dir.path(), "charts.cjjs");
        touch(dir.path(), "nested/ui-deep.chtl");

        let mut resolver = PathResolver::new();
        resolver.add_search_path(dir.path());

        let names = |paths: Vec<PathBuf>| -> Vec<String> {
            paths
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        };

        assert_eq!(
            names(resolver.find_by_pattern("ui")),
            vec!["ui-buttons.chtl", "ui-forms.chtl"]
        );
        assert_eq!(names(resolver.find_by_pattern("ch*.json")), vec!["charts.cjjs"]);
        assert_eq!(names(resolver.find_by_pattern("forms")), vec!["ui-forms.chtl"]);
    }

    #[test]
    fn test_custom_extensions() {
        let resolver = PathResolver::new().with_extensions([".chtl", "", "yaml"]);
        assert_eq!(resolver.default_extensions(), &["chtl".to_string(), "yaml".to_string()]);
    }
}
