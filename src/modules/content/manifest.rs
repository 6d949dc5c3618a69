//! Structured Module Manifests
//!
//! JSON and YAML modules describe themselves with the same shape:
//!
//! ```yaml
//! name: ui
//! version: "1.2.0"
//! kind: markup
//! description: Shared widgets
//! homepage: https://chtl.dev/ui
//! keywords: [widgets, layout]
//! metadata:
//!   category: components
//! dependencies:
//!   base: "^1.0"
//!   icons: { version: "2", optional: true }
//! exports:
//!   - { name: Box, kind: element }
//!   - { name: Internal, kind: style, visible: false }
//! ```
//!
//! XML modules only carry identity (`name`, `version`, `kind`), either as
//! attributes on the root element or as its direct child elements.

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use super::stem_name;
use crate::modules::descriptor::{
    DependencySpec, ExportItem, ExportKind, ModuleDescriptor, ModuleKind,
};
use crate::modules::error::ModuleError;
use crate::modules::version::DEFAULT_VERSION;

/// Deserialized JSON/YAML module manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, ManifestDependency>,
    #[serde(default)]
    pub exports: Vec<ManifestExport>,
}

/// A dependency as written in a manifest.
///
/// - `"^1.0"` - required, with a constraint
/// - `{ version = "^1.0", optional = true }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ManifestDependency {
    Version(String),
    Detailed {
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        optional: bool,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestExport {
    pub name: String,
    #[serde(default = "default_export_kind")]
    pub kind: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub payload: String,
}

fn default_export_kind() -> String {
    "template".to_string()
}

fn default_visible() -> bool {
    true
}

impl ModuleManifest {
    /// Convert into a descriptor. Missing identity falls back to the file
    /// stem and the default version.
    pub fn into_descriptor(self, path: &Path, source: &str) -> Result<ModuleDescriptor, ModuleError> {
        let kind = match self.kind.as_deref() {
            Some(k) => ModuleKind::parse(k)
                .ok_or_else(|| ModuleError::parse(path, format!("unknown module kind '{}'", k)))?,
            None => ModuleKind::MarkupOnly,
        };

        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| stem_name(path));
        let version = self
            .version
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());

        let mut module = ModuleDescriptor::new(name, version)
            .with_kind(kind)
            .with_source(source);
        module.description = self.description.unwrap_or_default();
        module.author = self.author.unwrap_or_default();
        module.license = self.license.unwrap_or_default();
        module.homepage = self.homepage.unwrap_or_default();
        module.keywords = self.keywords;
        module.metadata = self.metadata;

        for (dep_name, dep) in self.dependencies {
            module.add_dependency(match dep {
                ManifestDependency::Version(v) => DependencySpec::required(dep_name, v),
                ManifestDependency::Detailed { version, optional } => DependencySpec {
                    name: dep_name,
                    version_constraint: version.unwrap_or_default(),
                    required: !optional,
                },
            });
        }

        for export in self.exports {
            let kind = ExportKind::parse(&export.kind).ok_or_else(|| {
                ModuleError::parse(path, format!("unknown export kind '{}'", export.kind))
            })?;
            module.add_export(ExportItem {
                name: export.name,
                kind,
                visible: export.visible,
                payload: export.payload,
            });
        }

        Ok(module)
    }
}

pub fn parse_json_manifest(path: &Path, text: &str) -> Result<ModuleDescriptor, ModuleError> {
    let manifest: ModuleManifest =
        serde_json::from_str(text).map_err(|e| ModuleError::parse(path, e.to_string()))?;
    manifest.into_descriptor(path, text)
}

pub fn parse_yaml_manifest(path: &Path, text: &str) -> Result<ModuleDescriptor, ModuleError> {
    // An empty YAML document is a module with no declared metadata.
    if text.trim().is_empty() {
        return ModuleManifest::default().into_descriptor(path, text);
    }
    let manifest: ModuleManifest =
        serde_yaml::from_str(text).map_err(|e| ModuleError::parse(path, e.to_string()))?;
    manifest.into_descriptor(path, text)
}

/// Read identity fields from an XML module.
pub fn parse_xml_identity(path: &Path, text: &str) -> Result<ModuleDescriptor, ModuleError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut manifest = ModuleManifest::default();
    let mut depth = 0usize;
    let mut current_field: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ModuleError::parse(path, e.to_string()))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                if depth == 0 {
                    for attr in e.attributes() {
                        let attr = attr.map_err(|e| ModuleError::parse(path, e.to_string()))?;
                        let value = attr
                            .unescape_value()
                            .map_err(|e| ModuleError::parse(path, e.to_string()))?
                            .into_owned();
                        set_identity_field(&mut manifest, attr.key.as_ref(), value);
                    }
                } else if depth == 1 && !is_empty {
                    current_field = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
                if !is_empty {
                    depth += 1;
                }
            }
            Event::Text(t) => {
                if let Some(field) = current_field.as_deref() {
                    let value = t
                        .unescape()
                        .map_err(|e| ModuleError::parse(path, e.to_string()))?
                        .into_owned();
                    set_identity_field(&mut manifest, field.as_bytes(), value);
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                current_field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    manifest.into_descriptor(path, text)
}

fn set_identity_field(manifest: &mut ModuleManifest, key: &[u8], value: String) {
    match key {
        b"name" => manifest.name = Some(value),
        b"version" => manifest.version = Some(value),
        b"kind" | b"type" => manifest.kind = Some(value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_manifest() {
        let text = r#"{
            "name": "ui",
            "version": "1.2.0",
            "kind": "hybrid",
            "dependencies": {
                "base": "^1.0",
                "icons": { "version": "2", "optional": true }
            },
            "exports": [
                { "name": "Box", "kind": "element" },
                { "name": "Hidden", "kind": "style", "visible": false }
            ]
        }"#;
        let module = parse_json_manifest(Path::new("ui.json"), text).unwrap();
        assert_eq!(module.name, "ui");
        assert_eq!(module.kind, ModuleKind::Hybrid);
        assert!(module.dependency("base").unwrap().required);
        assert!(!module.dependency("icons").unwrap().required);
        assert_eq!(module.exports.len(), 2);
        assert!(!module.export("Hidden").unwrap().visible);
    }

    #[test]
    fn test_manifest_homepage_keywords_metadata() {
        let text = "name: ui\nhomepage: https://chtl.dev/ui\nkeywords: [widgets, layout]\nmetadata:\n  category: components\n  maintainer: core\n";
        let module = parse_yaml_manifest(Path::new("ui.yaml"), text).unwrap();
        assert_eq!(module.homepage, "https://chtl.dev/ui");
        assert_eq!(module.keywords, vec!["widgets", "layout"]);
        assert_eq!(module.metadata.get("maintainer").map(String::as_str), Some("core"));

        let json = r#"{"keywords": ["a"], "metadata": {"category": "forms"}}"#;
        let module = parse_json_manifest(Path::new("forms.json"), json).unwrap();
        assert_eq!(module.keywords, vec!["a"]);
        assert_eq!(module.metadata["category"], "forms");
    }

    #[test]
    fn test_minimal_json_uses_stem() {
        let module = parse_json_manifest(Path::new("mods/theme.json"), "{}").unwrap();
        assert_eq!(module.name, "theme");
        assert_eq!(module.version, "1.0.0");
        assert_eq!(module.kind, ModuleKind::MarkupOnly);
    }

    #[test]
    fn test_yaml_manifest() {
        let text = "name: charts\nkind: script\ndependencies:\n  base: \"1.0\"\n";
        let module = parse_yaml_manifest(Path::new("charts.yml"), text).unwrap();
        assert_eq!(module.name, "charts");
        assert_eq!(module.kind, ModuleKind::ScriptOnly);
        assert_eq!(module.dependency("base").unwrap().version_constraint, "1.0");
        assert!(module.keywords.is_empty() && module.metadata.is_empty());

        let empty = parse_yaml_manifest(Path::new("blank.yaml"), "").unwrap();
        assert_eq!(empty.name, "blank");
    }

    #[test]
    fn test_invalid_manifests() {
        assert!(matches!(
            parse_json_manifest(Path::new("x.json"), "{ not json"),
            Err(ModuleError::Parse { .. })
        ));
        assert!(matches!(
            parse_json_manifest(Path::new("x.json"), r#"{"kind": "widget"}"#),
            Err(ModuleError::Parse { .. })
        ));
        assert!(matches!(
            parse_json_manifest(Path::new("x.json"), r#"{"exports": [{"name": "a", "kind": "bogus"}]}"#),
            Err(ModuleError::Parse { .. })
        ));
    }

    #[test]
    fn test_xml_identity_from_attributes() {
        let text = r#"<module name="grid" version="3.1.0" kind="markup"><exports/></module>"#;
        let module = parse_xml_identity(Path::new("grid.xml"), text).unwrap();
        assert_eq!(module.name, "grid");
        assert_eq!(module.version, "3.1.0");
        assert!(module.exports.is_empty());
    }

    #[test]
    fn test_xml_identity_from_children() {
        let text = "<?xml version=\"1.0\"?>\n<module>\n  <name>forms</name>\n  <version>0.2.0</version>\n  <kind>hybrid</kind>\n  <extra><name>ignored</name></extra>\n</module>";
        let module = parse_xml_identity(Path::new("x.xml"), text).unwrap();
        assert_eq!(module.name, "forms");
        assert_eq!(module.version, "0.2.0");
        assert_eq!(module.kind, ModuleKind::Hybrid);
    }
}
