//! The loader registered first by default.

use std::path::Path;

use super::manifest::{parse_json_manifest, parse_xml_identity, parse_yaml_manifest};
use super::markup::parse_markup_module;
use super::{extension_of, read_source, ContentLoader};
use crate::modules::descriptor::ModuleDescriptor;
use crate::modules::error::ModuleError;

const EXTENSIONS: &[&str] = &["chtl", "json", "xml", "yaml", "yml"];

/// Handles markup text plus the JSON, XML and YAML manifest formats.
#[derive(Debug, Default, Clone)]
pub struct DefaultContentLoader;

impl DefaultContentLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ContentLoader for DefaultContentLoader {
    fn name(&self) -> &str {
        "default"
    }

    fn supported_extensions(&self) -> Vec<String> {
        EXTENSIONS.iter().map(|e| e.to_string()).collect()
    }

    fn load(&self, path: &Path) -> Result<ModuleDescriptor, ModuleError> {
        let text = read_source(path)?;
        match extension_of(path).as_deref() {
            Some("json") => parse_json_manifest(path, &text),
            Some("xml") => parse_xml_identity(path, &text),
            Some("yaml") | Some("yml") => parse_yaml_manifest(path, &text),
            Some("chtl") => Ok(parse_markup_module(path, &text)),
            _ => Err(ModuleError::NoLoader(path.to_path_buf())),
        }
    }
}
