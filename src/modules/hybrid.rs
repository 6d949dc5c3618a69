//! Hybrid Modules
//!
//! A hybrid module pairs a markup half with a script-extension half that
//! share one name and version. The [`HybridComposer`] decides which halves a
//! file holds with [`detect_kind`], parses each half from the same text and
//! merges them into one composite descriptor:
//!
//! - `dependencies` - union of both halves, by name, markup half first
//! - `exports` - the markup half's exports only
//! - `functions` - the script half's function table
//!
//! Script functions are reached through [`HybridComposer::call_function`],
//! which dispatches to native implementations registered with
//! [`HybridComposer::bind_function`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use itertools::Itertools;
use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use super::content::{read_source, ContentLoader, MarkupModuleLoader, ScriptModuleLoader};
use super::descriptor::{DependencySpec, ExportItem, ModuleDescriptor, ModuleKind};
use super::error::ModuleError;
use super::resolver::DependencyResolver;

/// Native implementation of a script-side function.
pub type NativeFunction = Arc<dyn Fn(&[String]) -> Result<String, String> + Send + Sync>;

fn markup_marker_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)\[Template\]|\[Custom\]|^[ \t]*html[ \t]*(?:\{|$)").ok())
        .as_ref()
}

fn script_marker_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{|\b(?:listen|delegate|animate|fileloader|router|iNeverAway)[ \t]*[({]").ok()
    })
    .as_ref()
}

/// Classify module text by the halves it appears to contain.
///
/// Template or custom blocks, or a bare `html` root, mark a markup half; an
/// enhanced selector (`{{...}}`) or an extension-API call marks a script
/// half. Both, or neither, yield `Hybrid`.
pub fn detect_kind(content: &str) -> ModuleKind {
    let has_markup = markup_marker_re().is_some_and(|re| re.is_match(content));
    let has_script = script_marker_re().is_some_and(|re| re.is_match(content));

    match (has_markup, has_script) {
        (true, false) => ModuleKind::MarkupOnly,
        (false, true) => ModuleKind::ScriptOnly,
        _ => ModuleKind::Hybrid,
    }
}

/// A composite module and the halves it was built from.
#[derive(Debug, Clone)]
pub struct HybridModule {
    pub descriptor: Arc<ModuleDescriptor>,
    pub markup: Option<Arc<ModuleDescriptor>>,
    pub script: Option<Arc<ModuleDescriptor>>,
}

impl HybridModule {
    /// Merge two halves into a composite of the given kind.
    ///
    /// Identity and metadata come from the markup half when present.
    pub fn compose(
        kind: ModuleKind,
        markup: Option<ModuleDescriptor>,
        script: Option<ModuleDescriptor>,
    ) -> Result<Self, ModuleError> {
        let primary = markup
            .as_ref()
            .or(script.as_ref())
            .ok_or_else(|| ModuleError::ValidationFailure(vec!["Hybrid module has no parts".to_string()]))?;

        let mut composite = ModuleDescriptor::new(primary.name.clone(), primary.version.clone())
            .with_kind(kind)
            .with_source(primary.source.clone());
        composite.description = primary.description.clone();
        composite.author = primary.author.clone();
        composite.license = primary.license.clone();
        composite.homepage = primary.homepage.clone();
        composite.keywords = primary.keywords.clone();
        composite.metadata = primary.metadata.clone();
        composite.path = primary.path.clone();
        composite.main_file = primary.main_file.clone();
        composite.entry_point = script
            .as_ref()
            .and_then(|s| s.entry_point.clone())
            .or_else(|| primary.entry_point.clone());

        composite.dependencies = markup
            .iter()
            .chain(script.iter())
            .flat_map(|half| half.dependencies.iter().cloned())
            .unique_by(|d| d.name.clone())
            .collect();
        if let Some(m) = &markup {
            composite.exports = m.exports.clone();
        }
        if let Some(s) = &script {
            composite.functions = s.functions.clone();
        }

        let errors = composite.validate();
        if !errors.is_empty() {
            return Err(ModuleError::ValidationFailure(errors));
        }
        composite.mark_loaded();

        Ok(Self {
            descriptor: Arc::new(composite),
            markup: markup.map(Arc::new),
            script: script.map(Arc::new),
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn kind(&self) -> ModuleKind {
        self.descriptor.kind
    }

    pub fn has_markup(&self) -> bool {
        self.markup.is_some()
    }

    pub fn has_script(&self) -> bool {
        self.script.is_some()
    }
}

/// Loads hybrid modules and answers queries across both halves.
///
/// Each half is read by its own [`ContentLoader`]; the defaults are
/// [`MarkupModuleLoader`] and [`ScriptModuleLoader`].
pub struct HybridComposer {
    modules: RwLock<HashMap<String, Arc<HybridModule>>>,
    bindings: DashMap<String, NativeFunction>,
    resolver: DependencyResolver,
    markup_loader: Arc<dyn ContentLoader>,
    script_loader: Arc<dyn ContentLoader>,
}

impl Default for HybridComposer {
    fn default() -> Self {
        Self::with_loaders(Arc::new(MarkupModuleLoader), Arc::new(ScriptModuleLoader))
    }
}

impl std::fmt::Debug for HybridComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridComposer")
            .field("modules", &self.modules.read().len())
            .field("bindings", &self.bindings.len())
            .field("markup_loader", &self.markup_loader.name())
            .field("script_loader", &self.script_loader.name())
            .finish()
    }
}

fn binding_key(module: &str, function: &str) -> String {
    format!("{}::{}", module, function)
}

impl HybridComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loaders(markup_loader: Arc<dyn ContentLoader>, script_loader: Arc<dyn ContentLoader>) -> Self {
        Self {
            modules: RwLock::new(HashMap::new()),
            bindings: DashMap::new(),
            resolver: DependencyResolver::default(),
            markup_loader,
            script_loader,
        }
    }

    /// Load the file at `path`, detect its halves once and register the
    /// composite under its name (replacing any module of the same name).
    pub fn load(&self, path: &Path) -> Result<Arc<HybridModule>, ModuleError> {
        let text = read_source(path)?;
        let kind = detect_kind(&text);

        let load_half = |loader: &Arc<dyn ContentLoader>| {
            loader.load(path).map(|mut half| {
                half.path = Some(path.to_path_buf());
                half
            })
        };
        let markup = if kind.has_markup() {
            Some(load_half(&self.markup_loader)?)
        } else {
            None
        };
        let script = if kind.has_script() {
            Some(load_half(&self.script_loader)?)
        } else {
            None
        };

        let module = Arc::new(HybridModule::compose(kind, markup, script)?);
        debug!(
            target: "chtl_modsys::hybrid",
            name = %module.name(),
            kind = %kind,
            path = %path.display(),
            "hybrid module loaded"
        );
        self.register(Arc::clone(&module));
        Ok(module)
    }

    pub fn register(&self, module: Arc<HybridModule>) {
        self.modules
            .write()
            .insert(module.name().to_string(), module);
    }

    /// Remove a module and any functions bound to it.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.modules.write().remove(name).is_some();
        if removed {
            let prefix = binding_key(name, "");
            self.bindings.retain(|key, _| !key.starts_with(&prefix));
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Arc<HybridModule>> {
        self.modules.read().get(name).cloned()
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.modules.read().contains_key(name)
    }

    /// Registered modules, sorted by name.
    pub fn modules(&self) -> Vec<Arc<HybridModule>> {
        let mut modules: Vec<_> = self.modules.read().values().cloned().collect();
        modules.sort_by(|a, b| a.name().cmp(b.name()));
        modules
    }

    /// Case-insensitive substring search over module names.
    pub fn search(&self, query: &str) -> Vec<Arc<HybridModule>> {
        let query = query.to_lowercase();
        self.modules()
            .into_iter()
            .filter(|m| m.name().to_lowercase().contains(&query))
            .collect()
    }

    pub fn find_by_kind(&self, kind: ModuleKind) -> Vec<Arc<HybridModule>> {
        self.modules()
            .into_iter()
            .filter(|m| m.kind() == kind)
            .collect()
    }

    fn require(&self, name: &str) -> Result<Arc<HybridModule>, ModuleError> {
        self.get(name)
            .ok_or_else(|| ModuleError::UnknownModule(name.to_string()))
    }

    /// Exports of the markup half; empty for script-only modules.
    pub fn exports(&self, name: &str) -> Result<Vec<ExportItem>, ModuleError> {
        let module = self.require(name)?;
        Ok(module
            .markup
            .as_ref()
            .map(|m| m.exports.clone())
            .unwrap_or_default())
    }

    /// Union of both halves' dependencies.
    pub fn dependencies(&self, name: &str) -> Result<Vec<DependencySpec>, ModuleError> {
        Ok(self.require(name)?.descriptor.dependencies.clone())
    }

    /// True if either half declares `dependency`.
    pub fn has_dependency(&self, name: &str, dependency: &str) -> bool {
        self.get(name).is_some_and(|m| {
            m.markup.iter().chain(m.script.iter()).any(|half| half.has_dependency(dependency))
        })
    }

    fn lookup(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        self.get(name).map(|m| Arc::clone(&m.descriptor))
    }

    /// Load order over registered composites, the module itself last.
    pub fn resolve_dependencies(&self, name: &str) -> Result<Vec<String>, ModuleError> {
        let module = self.require(name)?;
        Ok(self.resolver.resolve(&module.descriptor, |n| self.lookup(n)))
    }

    /// True when a required dependency is not registered.
    pub fn check_dependency_conflicts(&self, name: &str) -> Result<bool, ModuleError> {
        let module = self.require(name)?;
        Ok(self.resolver.check_conflicts(&module.descriptor, |n| self.lookup(n)))
    }

    /// Register the native implementation of `module::function`.
    pub fn bind_function<F>(&self, module: &str, function: &str, implementation: F)
    where
        F: Fn(&[String]) -> Result<String, String> + Send + Sync + 'static,
    {
        self.bindings
            .insert(binding_key(module, function), Arc::new(implementation));
    }

    /// Invoke a script-side function.
    ///
    /// Fails if the module is unknown, has no script half, does not declare
    /// the function, or has no implementation bound for it.
    pub fn call_function(&self, module: &str, function: &str, args: &[String]) -> Result<String, ModuleError> {
        let hybrid = self.require(module)?;
        let script = hybrid
            .script
            .as_ref()
            .ok_or_else(|| ModuleError::NoScriptPart(module.to_string()))?;

        if script.function(function).is_none() {
            return Err(ModuleError::FunctionNotFound {
                module: module.to_string(),
                function: function.to_string(),
            });
        }

        let implementation = self
            .bindings
            .get(&binding_key(module, function))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ModuleError::FunctionUnbound {
                module: module.to_string(),
                function: function.to_string(),
            })?;

        implementation(args).map_err(|message| ModuleError::FunctionFailed {
            module: module.to_string(),
            function: function.to_string(),
            message,
        })
    }

    pub fn clear(&self) {
        self.modules.write().clear();
        self.bindings.clear();
    }
}

/// Recursively collect `.chtl` and `.cjjs` files under `dir`, sorted.
pub fn find_module_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext == "chtl" || ext == "cjjs")
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MARKUP: &str = "[Template] @Style Card { color: red; }";
    const SCRIPT: &str = "listen({ click: () => {} });";
    const BOTH: &str = r#"
[Info] { name = "widgets"; version = "1.1.0"; dependencies = "base"; }

[Export] { [Custom] @Element Card; }

[Custom] @Element Card { div { } }

[Import] @CJmod from effects;

export function mount(selector) {
    {{selector}}->listen({ click: fn });
}
"#;

    #[test]
    fn test_detect_kind() {
        assert_eq!(detect_kind(MARKUP), ModuleKind::MarkupOnly);
        assert_eq!(detect_kind("html\n{\n  body { }\n}"), ModuleKind::MarkupOnly);
        assert_eq!(detect_kind(SCRIPT), ModuleKind::ScriptOnly);
        assert_eq!(detect_kind("const box = {{.box}};"), ModuleKind::ScriptOnly);
        assert_eq!(detect_kind(BOTH), ModuleKind::Hybrid);
        assert_eq!(detect_kind(""), ModuleKind::Hybrid);
        assert_eq!(detect_kind("plain text"), ModuleKind::Hybrid);
    }

    #[test]
    fn test_html_word_inside_text_is_not_a_marker() {
        assert_eq!(detect_kind("text { \"some html here\" }\nlisten({})"), ModuleKind::ScriptOnly);
    }

    fn composer_with(dir: &Path, file: &str, text: &str) -> (HybridComposer, Arc<HybridModule>) {
        let path = dir.join(file);
        fs::write(&path, text).unwrap();
        let composer = HybridComposer::new();
        let module = composer.load(&path).unwrap();
        (composer, module)
    }

    #[test]
    fn test_load_hybrid_merges_halves() {
        let dir = TempDir::new().unwrap();
        let (composer, module) = composer_with(dir.path(), "widgets.chtl", BOTH);

        assert_eq!(module.name(), "widgets");
        assert_eq!(module.kind(), ModuleKind::Hybrid);
        assert!(module.has_markup() && module.has_script());
        assert_eq!(module.descriptor.version, "1.1.0");
        assert!(module.descriptor.is_loaded());

        let deps: Vec<_> = composer
            .dependencies("widgets")
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(deps, vec!["base", "effects"]);

        let exports = composer.exports("widgets").unwrap();
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].name, "Card");
        assert!(module.descriptor.function("mount").is_some());
        assert!(composer.has_dependency("widgets", "effects"));
        assert!(!composer.has_dependency("widgets", "nothing"));
    }

    #[test]
    fn test_markup_only_has_no_script_half() {
        let dir = TempDir::new().unwrap();
        let (composer, module) = composer_with(dir.path(), "card.chtl", MARKUP);
        assert_eq!(module.kind(), ModuleKind::MarkupOnly);
        assert!(module.script.is_none());

        let err = composer.call_function("card", "anything", &[]).unwrap_err();
        assert_eq!(err, ModuleError::NoScriptPart("card".to_string()));
    }

    #[test]
    fn test_script_only_exports_are_empty() {
        let dir = TempDir::new().unwrap();
        let (composer, module) = composer_with(dir.path(), "clicks.cjjs", SCRIPT);
        assert_eq!(module.kind(), ModuleKind::ScriptOnly);
        assert!(composer.exports("clicks").unwrap().is_empty());
    }

    /// Script loader that tags every module it reads.
    struct TaggingScriptLoader;

    impl ContentLoader for TaggingScriptLoader {
        fn name(&self) -> &str {
            "tagging"
        }

        fn supported_extensions(&self) -> Vec<String> {
            vec!["cjjs".to_string()]
        }

        fn load(&self, path: &Path) -> Result<ModuleDescriptor, ModuleError> {
            let mut module = ScriptModuleLoader.load(path)?;
            module.description = "tagged".to_string();
            Ok(module)
        }
    }

    struct FailingLoader;

    impl ContentLoader for FailingLoader {
        fn name(&self) -> &str {
            "failing"
        }

        fn supported_extensions(&self) -> Vec<String> {
            Vec::new()
        }

        fn load(&self, path: &Path) -> Result<ModuleDescriptor, ModuleError> {
            Err(ModuleError::LoadFailure {
                path: path.to_path_buf(),
                reason: "unreadable".to_string(),
            })
        }
    }

    #[test]
    fn test_halves_use_injected_loaders() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clicks.cjjs");
        fs::write(&path, SCRIPT).unwrap();

        let composer = HybridComposer::with_loaders(Arc::new(MarkupModuleLoader), Arc::new(TaggingScriptLoader));
        let module = composer.load(&path).unwrap();
        assert_eq!(module.script.as_ref().unwrap().description, "tagged");
        assert_eq!(module.descriptor.description, "tagged");
        assert_eq!(module.descriptor.path.as_deref(), Some(path.as_path()));

        let markup_path = dir.path().join("card.chtl");
        fs::write(&markup_path, MARKUP).unwrap();
        let failing = HybridComposer::with_loaders(Arc::new(FailingLoader), Arc::new(ScriptModuleLoader));
        assert!(matches!(failing.load(&markup_path), Err(ModuleError::LoadFailure { .. })));
        assert!(!failing.has_module("card"));
    }

    #[test]
    fn test_call_function_errors_and_dispatch() {
        let dir = TempDir::new().unwrap();
        let (composer, _) = composer_with(dir.path(), "widgets.chtl", BOTH);

        assert!(matches!(
            composer.call_function("ghost", "mount", &[]),
            Err(ModuleError::UnknownModule(_))
        ));
        assert!(matches!(
            composer.call_function("widgets", "unmount", &[]),
            Err(ModuleError::FunctionNotFound { .. })
        ));
        assert!(matches!(
            composer.call_function("widgets", "mount", &[]),
            Err(ModuleError::FunctionUnbound { .. })
        ));

        composer.bind_function("widgets", "mount", |args| Ok(format!("mounted {}", args.join(","))));
        let out = composer
            .call_function("widgets", "mount", &["#app".to_string()])
            .unwrap();
        assert_eq!(out, "mounted #app");

        composer.bind_function("widgets", "mount", |_| Err("boom".to_string()));
        assert!(matches!(
            composer.call_function("widgets", "mount", &[]),
            Err(ModuleError::FunctionFailed { .. })
        ));

        assert!(composer.unregister("widgets"));
        assert!(composer.bindings.is_empty());
    }

    #[test]
    fn test_registry_queries() {
        let dir = TempDir::new().unwrap();
        let composer = HybridComposer::new();
        for (file, text) in [("Widgets.chtl", BOTH), ("card.chtl", MARKUP), ("clicks.cjjs", SCRIPT)] {
            let path = dir.path().join(file);
            fs::write(&path, text).unwrap();
            composer.load(&path).unwrap();
        }

        let names: Vec<_> = composer.search("C").iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, vec!["card", "clicks"]);
        assert_eq!(composer.find_by_kind(ModuleKind::ScriptOnly).len(), 1);
        assert!(composer.has_module("widgets"));
        assert!(!composer.has_module("Widgets"));
    }

    #[test]
    fn test_dependency_queries_over_composites() {
        let dir = TempDir::new().unwrap();
        let composer = HybridComposer::new();
        let files = [
            ("app.chtl", "[Template] @Style A {}\n[Import] @Chtl from ui;"),
            ("ui.chtl", "[Template] @Style U {}\n[Import] @CJmod from fx;"),
            ("fx.cjjs", "listen({});"),
        ];
        for (file, text) in files {
            let path = dir.path().join(file);
            fs::write(&path, text).unwrap();
            composer.load(&path).unwrap();
        }

        assert_eq!(composer.resolve_dependencies("app").unwrap(), vec!["fx", "ui", "app"]);
        assert!(!composer.check_dependency_conflicts("app").unwrap());

        composer.unregister("fx");
        assert!(composer.check_dependency_conflicts("ui").unwrap());
        assert!(matches!(
            composer.resolve_dependencies("nope"),
            Err(ModuleError::UnknownModule(_))
        ));
    }

    #[test]
    fn test_find_module_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        for file in ["a.chtl", "nested/b.cjjs", "nested/deeper/c.chtl", "nested/readme.md"] {
            fs::write(dir.path().join(file), "").unwrap();
        }

        let files = find_module_files(dir.path());
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.extension().unwrap() != "md"));
    }
}
