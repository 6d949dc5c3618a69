//! Module Descriptor
//!
//! A `ModuleDescriptor` is the in-memory form of one loaded module: identity,
//! classification, raw source, declared dependencies, exported symbols,
//! script-side functions and owned submodules.
//!
//! Descriptors are built and mutated by content loaders and by the loader
//! while a load is in progress. Once registered they are shared behind an
//! `Arc` and never mutated again.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::version::{self, DEFAULT_VERSION};

/// What a module bundles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    /// Markup templates, styles and custom elements only.
    MarkupOnly,
    /// Script-extension functions only.
    ScriptOnly,
    /// One markup half and one script half sharing name and version.
    Hybrid,
}

impl ModuleKind {
    /// Parse a kind as written in module headers and manifests.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markup" | "markup-only" | "markuponly" | "cmod" | "chtl" => Some(ModuleKind::MarkupOnly),
            "script" | "script-only" | "scriptonly" | "cjmod" | "cjjs" => Some(ModuleKind::ScriptOnly),
            "hybrid" | "mixed" => Some(ModuleKind::Hybrid),
            _ => None,
        }
    }

    pub fn has_markup(&self) -> bool {
        matches!(self, ModuleKind::MarkupOnly | ModuleKind::Hybrid)
    }

    pub fn has_script(&self) -> bool {
        matches!(self, ModuleKind::ScriptOnly | ModuleKind::Hybrid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::MarkupOnly => "markup-only",
            ModuleKind::ScriptOnly => "script-only",
            ModuleKind::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleStatus {
    Unloaded,
    Loading,
    Loaded,
    Error,
    Disabled,
}

/// A declared dependency on another module, by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DependencySpec {
    pub name: String,
    /// Semver requirement; empty means any version.
    pub version_constraint: String,
    pub required: bool,
}

impl DependencySpec {
    pub fn required(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_constraint: constraint.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_constraint: constraint.into(),
            required: false,
        }
    }

    /// Check a concrete version against this spec's constraint.
    pub fn accepts(&self, version: &str) -> bool {
        version::satisfies(&self.version_constraint, version)
    }
}

/// Kind of symbol a markup module exports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportKind {
    Template,
    Style,
    Element,
    VariableGroup,
    Namespace,
    Function,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Template => "template",
            ExportKind::Style => "style",
            ExportKind::Element => "element",
            ExportKind::VariableGroup => "variable-group",
            ExportKind::Namespace => "namespace",
            ExportKind::Function => "function",
        }
    }

    /// Parse an export kind as written in JSON/YAML manifests.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "template" => Some(ExportKind::Template),
            "style" => Some(ExportKind::Style),
            "element" => Some(ExportKind::Element),
            "variable-group" | "var" | "variables" => Some(ExportKind::VariableGroup),
            "namespace" => Some(ExportKind::Namespace),
            "function" => Some(ExportKind::Function),
            _ => None,
        }
    }
}

/// A symbol exported by a markup module.
///
/// The payload is opaque to the module system; the generator interprets it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportItem {
    pub name: String,
    pub kind: ExportKind,
    pub visible: bool,
    pub payload: String,
}

impl ExportItem {
    pub fn new(name: impl Into<String>, kind: ExportKind) -> Self {
        Self {
            name: name.into(),
            kind,
            visible: true,
            payload: String::new(),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }
}

/// A function declared by a script-extension module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScriptFunction {
    pub name: String,
    pub params: Vec<String>,
    pub public: bool,
}

/// The central module entity.
#[derive(Clone, Debug, Serialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub version: String,
    pub kind: ModuleKind,
    pub description: String,
    pub author: String,
    pub license: String,
    pub homepage: String,
    pub keywords: Vec<String>,
    /// Free-form `[Info]` or manifest keys the descriptor has no field for.
    pub metadata: BTreeMap<String, String>,
    /// Raw module text.
    #[serde(skip)]
    pub source: String,
    /// Path the module was loaded from; set by the loader.
    pub path: Option<PathBuf>,
    pub main_file: Option<PathBuf>,
    pub entry_point: Option<PathBuf>,
    pub dependencies: Vec<DependencySpec>,
    pub exports: Vec<ExportItem>,
    pub functions: Vec<ScriptFunction>,
    pub submodules: Vec<ModuleDescriptor>,
    pub status: ModuleStatus,
    pub last_error: String,
}

impl Default for ModuleDescriptor {
    fn default() -> Self {
        Self::new("", DEFAULT_VERSION)
    }
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            kind: ModuleKind::MarkupOnly,
            description: String::new(),
            author: String::new(),
            license: String::new(),
            homepage: String::new(),
            keywords: Vec::new(),
            metadata: BTreeMap::new(),
            source: String::new(),
            path: None,
            main_file: None,
            entry_point: None,
            dependencies: Vec::new(),
            exports: Vec::new(),
            functions: Vec::new(),
            submodules: Vec::new(),
            status: ModuleStatus::Unloaded,
            last_error: String::new(),
        }
    }

    pub fn with_kind(mut self, kind: ModuleKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ---- dependencies -------------------------------------------------

    /// Add a dependency, replacing any existing spec with the same name.
    pub fn add_dependency(&mut self, spec: DependencySpec) {
        match self.dependencies.iter_mut().find(|d| d.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.dependencies.push(spec),
        }
    }

    pub fn remove_dependency(&mut self, name: &str) {
        self.dependencies.retain(|d| d.name != name);
    }

    pub fn dependency(&self, name: &str) -> Option<&DependencySpec> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependency(name).is_some()
    }

    pub fn required_dependencies(&self) -> impl Iterator<Item = &DependencySpec> {
        self.dependencies.iter().filter(|d| d.required)
    }

    pub fn optional_dependencies(&self) -> impl Iterator<Item = &DependencySpec> {
        self.dependencies.iter().filter(|d| !d.required)
    }

    // ---- exports ------------------------------------------------------

    /// Append an export. Duplicates are kept so that `validate` can report them.
    pub fn add_export(&mut self, item: ExportItem) {
        self.exports.push(item);
    }

    pub fn export(&self, name: &str) -> Option<&ExportItem> {
        self.exports.iter().find(|e| e.name == name)
    }

    pub fn visible_exports(&self) -> impl Iterator<Item = &ExportItem> {
        self.exports.iter().filter(|e| e.visible)
    }

    // ---- script functions ---------------------------------------------

    pub fn add_function(&mut self, function: ScriptFunction) {
        self.functions.push(function);
    }

    pub fn function(&self, name: &str) -> Option<&ScriptFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    // ---- submodules ---------------------------------------------------

    pub fn add_submodule(&mut self, submodule: ModuleDescriptor) {
        self.submodules.retain(|s| s.name != submodule.name);
        self.submodules.push(submodule);
    }

    pub fn submodule(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.submodules.iter().find(|s| s.name == name)
    }

    // ---- lifecycle ----------------------------------------------------

    pub fn mark_loading(&mut self) {
        self.status = ModuleStatus::Loading;
        self.last_error.clear();
    }

    pub fn mark_loaded(&mut self) {
        self.status = ModuleStatus::Loaded;
        self.last_error.clear();
    }

    pub fn mark_error(&mut self, error: impl Into<String>) {
        self.status = ModuleStatus::Error;
        self.last_error = error.into();
    }

    pub fn is_loaded(&self) -> bool {
        self.status == ModuleStatus::Loaded
    }

    // ---- validation ---------------------------------------------------

    /// Run every structural check and collect all problems.
    ///
    /// An empty result means the descriptor is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Module name is required".to_string());
        }

        if self.version.trim().is_empty() {
            errors.push("Module version is required".to_string());
        } else if !version::is_valid(&self.version) {
            errors.push(format!("Invalid module version: {}", self.version));
        }

        let mut seen = HashSet::new();
        for dep in &self.dependencies {
            if dep.name.trim().is_empty() {
                errors.push("Dependency name is required".to_string());
            } else if !seen.insert(dep.name.as_str()) {
                errors.push(format!("Duplicate dependency: {}", dep.name));
            }
            if version::parse_constraint(&dep.version_constraint).is_err() {
                errors.push(format!(
                    "Invalid version constraint for {}: {}",
                    dep.name, dep.version_constraint
                ));
            }
        }

        let mut seen = HashSet::new();
        for export in &self.exports {
            if export.name.trim().is_empty() {
                errors.push("Export name is required".to_string());
            } else if !seen.insert(export.name.as_str()) {
                errors.push(format!("Duplicate export name: {}", export.name));
            }
        }

        let mut seen = HashSet::new();
        for function in &self.functions {
            if !seen.insert(function.name.as_str()) {
                errors.push(format!("Duplicate function name: {}", function.name));
            }
        }

        match self.kind {
            ModuleKind::MarkupOnly if !self.functions.is_empty() => {
                errors.push("markup-only module cannot declare script functions".to_string());
            }
            ModuleKind::ScriptOnly if !self.exports.is_empty() => {
                errors.push("script-only module cannot declare markup exports".to_string());
            }
            _ => {}
        }

        for sub in &self.submodules {
            let label = if sub.name.is_empty() { "<unnamed>" } else { &sub.name };
            for err in sub.validate() {
                errors.push(format!("Submodule {}: {}", label, err));
            }
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
