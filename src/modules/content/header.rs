//! Shared `[Info]` / `[Export]` / `[Import]` section parsing.
//!
//! ```text
//! [Info] {
//!     name = "ui";
//!     version = "1.2";
//!     dependencies = "base@^1.0, icons?";
//! }
//!
//! [Export] {
//!     [Custom] @Element Box, Card;
//!     -[Template] @Style Internal;
//! }
//!
//! [Import] @Chtl from theme;
//! ```
//!
//! A section body is either brace-delimited or, without a brace, runs to the
//! next blank line.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::modules::descriptor::{
    DependencySpec, ExportItem, ExportKind, ModuleDescriptor, ModuleKind,
};

fn section_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*\[(Info|Export)\]").ok())
        .as_ref()
}

fn import_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*\[Import\][ \t]*(?:\[\w+\][ \t]*)?@(\w+)[ \t]+from[ \t]+"?([^\s;"]+)"?"#).ok()
    })
    .as_ref()
}

/// Raw sections found in a module text.
#[derive(Debug, Default)]
pub(crate) struct Sections {
    pub info: Vec<(String, String)>,
    pub exports: Vec<String>,
    pub imports: Vec<Import>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Import {
    /// `Chtl`, `CJmod`, `Style`, ...
    pub kind: String,
    pub target: String,
}

impl Import {
    /// Module name the import refers to (`./lib/ui.chtl` -> `ui`).
    pub fn module_name(&self) -> String {
        let target = self.target.trim_matches('"');
        if target.contains('/') || target.contains('\\') || Path::new(target).extension().is_some() {
            super::stem_name(Path::new(target))
        } else {
            target.to_string()
        }
    }
}

/// Split module text into its header sections.
pub(crate) fn parse_sections(text: &str) -> Sections {
    let mut sections = Sections::default();

    for caps in section_re().into_iter().flat_map(|re| re.captures_iter(text)) {
        let (Some(whole), Some(tag)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let body = section_body(&text[whole.end()..]);
        let statements = split_statements(body);
        match tag.as_str() {
            "Info" => sections
                .info
                .extend(statements.iter().filter_map(|s| key_value(s))),
            _ => sections.exports.extend(statements),
        }
    }

    for caps in import_re().into_iter().flat_map(|re| re.captures_iter(text)) {
        if let (Some(kind), Some(target)) = (caps.get(1), caps.get(2)) {
            sections.imports.push(Import {
                kind: kind.as_str().to_string(),
                target: target.as_str().to_string(),
            });
        }
    }

    sections
}

/// Body text following a section tag.
fn section_body(rest: &str) -> &str {
    let trimmed = rest.trim_start();
    let Some(inner) = trimmed.strip_prefix('{') else {
        let end = rest.find("\n\n").or_else(|| rest.find("\r\n\r\n")).unwrap_or(rest.len());
        return &rest[..end];
    };

    let mut depth = 1usize;
    let mut in_string = false;
    for (i, c) in inner.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return &inner[..i];
                }
            }
            _ => {}
        }
    }
    inner
}

fn split_statements(body: &str) -> Vec<String> {
    body.lines()
        .map(|line| match line.find("//") {
            Some(pos) => &line[..pos],
            None => line,
        })
        .flat_map(|line| line.split(';'))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn key_value(statement: &str) -> Option<(String, String)> {
    let (key, value) = statement.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"').trim_matches('\'').trim();
    Some((key.to_ascii_lowercase(), value.to_string()))
}

/// Parse `base@^1.0, icons?, theme` into dependency specs.
pub(crate) fn parse_dependency_list(list: &str) -> Vec<DependencySpec> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| {
            let (item, required) = match item.strip_suffix('?') {
                Some(rest) => (rest.trim(), false),
                None => (item, true),
            };
            let (name, constraint) = match item.split_once('@') {
                Some((n, c)) => (n.trim(), c.trim()),
                None => (item, ""),
            };
            DependencySpec {
                name: name.to_string(),
                version_constraint: constraint.to_string(),
                required,
            }
        })
        .collect()
}

/// Apply `[Info]` keys to a descriptor. Unknown keys land in `metadata`.
///
/// Returns the declared kind, if any.
pub(crate) fn apply_info(module: &mut ModuleDescriptor, info: &[(String, String)]) -> Option<ModuleKind> {
    let mut kind = None;
    for (key, value) in info {
        match key.as_str() {
            "name" => module.name = value.clone(),
            "version" => module.version = value.clone(),
            "description" => module.description = value.clone(),
            "author" => module.author = value.clone(),
            "license" => module.license = value.clone(),
            "homepage" => module.homepage = value.clone(),
            "keywords" => module.keywords = parse_keywords(value),
            "kind" | "type" => kind = ModuleKind::parse(value),
            "dependencies" => {
                for dep in parse_dependency_list(value) {
                    module.add_dependency(dep);
                }
            }
            _ => {
                module.metadata.insert(key.clone(), value.clone());
            }
        }
    }
    kind
}

fn parse_keywords(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Add `[Import]` targets as required dependencies, keeping any spec the
/// `[Info]` block already declared for the same name.
pub(crate) fn apply_imports<'a>(
    module: &mut ModuleDescriptor,
    imports: impl IntoIterator<Item = &'a Import>,
) {
    for import in imports {
        let name = import.module_name();
        if !name.is_empty() && !module.has_dependency(&name) && name != module.name {
            module.add_dependency(DependencySpec::required(name, ""));
        }
    }
}

/// Parse one `[Export]` statement into zero or more export items.
///
/// - `-` or `[Private]` prefix marks the items hidden.
/// - `@Style`, `@Element`, `@Var`, `@Function` pick the kind; otherwise
///   `[Namespace]` gives a namespace and anything else a template.
/// - Names are comma separated; the payload is the qualifier text.
pub(crate) fn parse_export_statement(statement: &str) -> Vec<ExportItem> {
    let mut rest = statement.trim();
    let mut visible = true;

    if let Some(r) = rest.strip_prefix('-') {
        visible = false;
        rest = r.trim_start();
    }
    if let Some(r) = rest.strip_prefix("[Private]") {
        visible = false;
        rest = r.trim_start();
    }

    let mut qualifiers = Vec::new();
    let mut kind = None;
    loop {
        let Some(token) = rest.split_whitespace().next() else {
            break;
        };
        let is_qualifier = token.starts_with('[') || token.starts_with('@');
        if !is_qualifier {
            break;
        }
        match token {
            "@Style" => kind = Some(ExportKind::Style),
            "@Element" => kind = Some(ExportKind::Element),
            "@Var" => kind = Some(ExportKind::VariableGroup),
            "@Function" => kind = Some(ExportKind::Function),
            "[Namespace]" => kind = kind.or(Some(ExportKind::Namespace)),
            _ => {}
        }
        qualifiers.push(token);
        rest = rest[token.len()..].trim_start();
    }

    let kind = kind.unwrap_or(ExportKind::Template);
    let payload = qualifiers.join(" ");

    rest.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|name| ExportItem {
            name: name.to_string(),
            kind,
            visible,
            payload: payload.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[Info] {
    name = "ui";
    version = "1.2";
    author = "CHTL Team";
    dependencies = "base@^1.0, icons?";
}

[Export] {
    [Custom] @Element Box, Card;
    [Template] @Style Theme;
    @Var Palette;
    [Namespace] widgets;
    -[Template] @Style Internal;
    [Private] [Custom] @Element Hidden;
}

[Import] @Chtl from theme;
[Import] @CJmod from "./ext/effects.cjjs";
"#;

    #[test]
    fn test_parse_info_section() {
        let sections = parse_sections(SAMPLE);
        let mut module = ModuleDescriptor::new("fallback", "1.0.0");
        let kind = apply_info(&mut module, &sections.info);

        assert!(kind.is_none());
        assert_eq!(module.name, "ui");
        assert_eq!(module.version, "1.2");
        assert_eq!(module.author, "CHTL Team");
        assert_eq!(module.dependencies.len(), 2);
        assert_eq!(module.dependency("base").unwrap().version_constraint, "^1.0");
        assert!(!module.dependency("icons").unwrap().required);
    }

    #[test]
    fn test_info_extra_fields() {
        let text = r#"[Info] {
    name = "ui";
    homepage = "https://chtl.dev/ui";
    keywords = "widgets, layout,,forms ";
    category = "components";
    Compiler = "1.0.0";
}"#;
        let mut module = ModuleDescriptor::default();
        apply_info(&mut module, &parse_sections(text).info);

        assert_eq!(module.homepage, "https://chtl.dev/ui");
        assert_eq!(module.keywords, vec!["widgets", "layout", "forms"]);
        assert_eq!(module.metadata.len(), 2);
        assert_eq!(module.metadata["category"], "components");
        assert_eq!(module.metadata["compiler"], "1.0.0");
        assert!(!module.metadata.contains_key("name"));
    }

    #[test]
    fn test_parse_export_section() {
        let sections = parse_sections(SAMPLE);
        let items: Vec<ExportItem> = sections
            .exports
            .iter()
            .flat_map(|s| parse_export_statement(s))
            .collect();

        let names: Vec<_> = items.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Box", "Card", "Theme", "Palette", "widgets", "Internal", "Hidden"]);
        assert_eq!(items[0].kind, ExportKind::Element);
        assert_eq!(items[0].payload, "[Custom] @Element");
        assert_eq!(items[2].kind, ExportKind::Style);
        assert_eq!(items[3].kind, ExportKind::VariableGroup);
        assert_eq!(items[4].kind, ExportKind::Namespace);
        assert!(items[..5].iter().all(|e| e.visible));
        assert!(!items[5].visible);
        assert!(!items[6].visible);
    }

    #[test]
    fn test_parse_imports() {
        let sections = parse_sections(SAMPLE);
        assert_eq!(sections.imports.len(), 2);
        assert_eq!(sections.imports[0].module_name(), "theme");
        assert_eq!(sections.imports[1].kind, "CJmod");
        assert_eq!(sections.imports[1].module_name(), "effects");

        let mut module = ModuleDescriptor::new("ui", "1.0.0");
        apply_imports(&mut module, &sections.imports);
        assert!(module.dependency("theme").unwrap().required);
        assert!(module.has_dependency("effects"));
    }

    #[test]
    fn test_single_line_and_braceless_sections() {
        let text = "[Info] { name = \"one\"; kind = \"script\"; }\n\n[Info]\nversion = 2.0\n\nbody";
        let sections = parse_sections(text);
        let mut module = ModuleDescriptor::default();
        let kind = apply_info(&mut module, &sections.info);
        assert_eq!(module.name, "one");
        assert_eq!(module.version, "2.0");
        assert_eq!(kind, Some(ModuleKind::ScriptOnly));
    }

    #[test]
    fn test_template_is_default_export_kind() {
        let items = parse_export_statement("[Template] Page");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, ExportKind::Template);
        assert!(parse_export_statement("[Custom]").is_empty());
    }

    #[test]
    fn test_dependency_list() {
        let deps = parse_dependency_list(" a , b@>=2.0 , c? ,, d@1.0? ");
        assert_eq!(deps.len(), 4);
        assert!(deps[0].required && deps[0].version_constraint.is_empty());
        assert_eq!(deps[1].version_constraint, ">=2.0");
        assert!(!deps[2].required);
        assert_eq!(deps[3].name, "d");
        assert_eq!(deps[3].version_constraint, "1.0");
        assert!(!deps[3].required);
    }
}
