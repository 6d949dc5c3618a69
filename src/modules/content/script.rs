//! Script-extension (`.cjjs`) module loading.
//!
//! Shares the `[Info]` and `[Import]` header with markup modules. Every
//! top-level `function name(a, b) {` declaration becomes an entry in the
//! function table; `export function` marks it public.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::header::{apply_imports, apply_info, parse_sections};
use super::{read_source, stem_name, ContentLoader};
use crate::modules::descriptor::{ModuleDescriptor, ModuleKind, ScriptFunction};
use crate::modules::error::ModuleError;
use crate::modules::version::DEFAULT_VERSION;

fn function_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(export[ \t]+)?function[ \t]+([A-Za-z_$][\w$]*)[ \t]*\(([^)]*)\)").ok()
    })
    .as_ref()
}

/// Collect function declarations from script text.
pub(crate) fn scan_functions(text: &str) -> Vec<ScriptFunction> {
    function_re()
        .into_iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| {
            let name = caps.get(2)?.as_str().to_string();
            let params = caps
                .get(3)
                .map(|p| {
                    p.as_str()
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            Some(ScriptFunction {
                name,
                params,
                public: caps.get(1).is_some(),
            })
        })
        .collect()
}

/// Build a script-extension module from its text.
pub fn parse_script_module(path: &Path, text: &str) -> ModuleDescriptor {
    let sections = parse_sections(text);
    let mut module = ModuleDescriptor::new(stem_name(path), DEFAULT_VERSION)
        .with_kind(ModuleKind::ScriptOnly)
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

    for function in scan_functions(text) {
        module.add_function(function);
    }
    apply_imports(&mut module, &sections.imports);

    module
}

/// Content loader for `.cjjs` script-extension modules.
#[derive(Debug, Default, Clone)]
pub struct ScriptModuleLoader;

impl ScriptModuleLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ContentLoader for ScriptModuleLoader {
    fn name(&self) -> &str {
        "script"
    }

    fn supported_extensions(&self) -> Vec<String> {
        vec!["cjjs".to_string()]
    }

    fn load(&self, path: &Path) -> Result<ModuleDescriptor, ModuleError> {
        let text = read_source(path)?;
        Ok(parse_script_module(path, &text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
[Info] { name = "effects"; version = "0.3"; }

[Import] @CJmod from easing;

export function fadeIn(selector, duration) {
    return animate({ target: selector, duration: duration });
}

function helper() {
    return 1;
}

  export function $reset ( ) { }
"#;

    #[test]
    fn test_scan_functions() {
        let functions = scan_functions(SCRIPT);
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["fadeIn", "helper", "$reset"]);
        assert_eq!(functions[0].params, vec!["selector", "duration"]);
        assert!(functions[0].public);
        assert!(!functions[1].public);
        assert!(functions[2].params.is_empty());
    }

    #[test]
    fn test_parse_script_module() {
        let module = parse_script_module(Path::new("ext/effects.cjjs"), SCRIPT);
        assert_eq!(module.name, "effects");
        assert_eq!(module.version, "0.3");
        assert_eq!(module.kind, ModuleKind::ScriptOnly);
        assert_eq!(module.functions.len(), 3);
        assert!(module.exports.is_empty());
        assert!(module.dependency("easing").unwrap().required);
        assert!(module.is_valid());
    }

    #[test]
    fn test_call_sites_are_not_declarations() {
        let functions = scan_functions("const x = function() {};\nrun(function named() {});");
        assert!(functions.is_empty());
    }
}
