//! Markup (`.chtl`) module loading.

use std::path::Path;

use super::header::{apply_imports, apply_info, parse_export_statement, parse_sections};
use super::{read_source, stem_name, ContentLoader};
use crate::modules::descriptor::{ModuleDescriptor, ModuleKind};
use crate::modules::error::ModuleError;
use crate::modules::version::DEFAULT_VERSION;

/// Build a markup module from its text.
///
/// Name falls back to the file stem and version to `1.0.0`. The kind is
/// `MarkupOnly` unless the `[Info]` block declares otherwise.
pub fn parse_markup_module(path: &Path, text: &str) -> ModuleDescriptor {
    let sections = parse_sections(text);
    let mut module = ModuleDescriptor::new(stem_name(path), DEFAULT_VERSION)
        .with_kind(ModuleKind::MarkupOnly)
        .with_source(text);

    if let Some(kind) = apply_info(&mut module, &sections.info) {
        module.kind = kind;
    }
    if module.name.trim().is_empty() {
        module.name = stem_name(path);
    }
    if module.version.trim().is_empty() {
        module.version = DEFAULT_VERSION.to_string();
    }

    for statement in &sections.exports {
        for item in parse_export_statement(statement) {
            module.add_export(item);
        }
    }
    apply_imports(&mut module, &sections.imports);

    module
}

/// Content loader for `.chtl` files only.
#[derive(Debug, Default, Clone)]
pub struct MarkupModuleLoader;

impl MarkupModuleLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ContentLoader for MarkupModuleLoader {
    fn name(&self) -> &str {
        "markup"
    }

    fn supported_extensions(&self) -> Vec<String> {
        vec!["chtl".to_string()]
    }

    fn load(&self, path: &Path) -> Result<ModuleDescriptor, ModuleError> {
        let text = read_source(path)?;
        Ok(parse_markup_module(path, &text))
    }
}
