//! Packaged (directory) modules.
//!
//! ```text
//! Ui/
//!   info/Ui.chtl      [Info] / [Export] header
//!   src/Ui.chtl       markup main file
//!   src/Ui.cjjs       optional script half
//!   src/Buttons/      submodule with the same layout
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use super::header::parse_sections;
use super::markup::parse_markup_module;
use super::script::scan_functions;
use super::{read_source, ContentLoader};
use crate::modules::descriptor::{ModuleDescriptor, ModuleKind};
use crate::modules::error::ModuleError;
use crate::modules::path::is_package_dir;
use crate::modules::version::DEFAULT_VERSION;

#[derive(Debug, Default, Clone)]
pub struct PackageDirLoader;

impl PackageDirLoader {
    pub fn new() -> Self {
        Self
    }

    fn load_package(&self, dir: &Path) -> Result<ModuleDescriptor, ModuleError> {
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let info_file = dir.join("info").join(format!("{}.chtl", dir_name));
        let main_file = dir.join("src").join(format!("{}.chtl", dir_name));
        let script_file = dir.join("src").join(format!("{}.cjjs", dir_name));

        let has_info = info_file.is_file();
        let has_main = main_file.is_file();
        let has_script = script_file.is_file();

        if !has_info && !has_main && !has_script {
            return Err(ModuleError::LoadFailure {
                path: dir.to_path_buf(),
                reason: format!("package '{}' has no info or main file", dir_name),
            });
        }

        let mut module = if has_info {
            let text = read_source(&info_file)?;
            parse_markup_module(&info_file, &text)
        } else {
            ModuleDescriptor::new(dir_name.clone(), DEFAULT_VERSION)
        };
        let declared_kind = has_info && declares_kind(&module.source);

        if has_main {
            module.source = read_source(&main_file)?;
            module.main_file = Some(main_file.clone());
            module.entry_point = Some(main_file);
        }

        if has_script {
            let script = read_source(&script_file)?;
            for function in scan_functions(&script) {
                module.add_function(function);
            }
            if !has_main {
                module.source = script;
                module.main_file = Some(script_file.clone());
            }
            module.entry_point = Some(script_file);
        }

        if !declared_kind {
            module.kind = match (has_main || !module.exports.is_empty(), has_script) {
                (true, true) => ModuleKind::Hybrid,
                (false, true) => ModuleKind::ScriptOnly,
                _ => ModuleKind::MarkupOnly,
            };
        }

        for sub_dir in subpackage_dirs(&dir.join("src"))? {
            module.add_submodule(self.load_package(&sub_dir)?);
        }

        Ok(module)
    }
}

fn declares_kind(info_text: &str) -> bool {
    parse_sections(info_text)
        .info
        .iter()
        .any(|(key, _)| key == "kind" || key == "type")
}

fn subpackage_dirs(src: &Path) -> Result<Vec<PathBuf>, ModuleError> {
    if !src.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(src)
        .map_err(|e| ModuleError::io(src, &e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| is_package_dir(p))
        .collect();
    dirs.sort();
    Ok(dirs)
}

impl ContentLoader for PackageDirLoader {
    fn name(&self) -> &str {
        "package-dir"
    }

    fn supported_extensions(&self) -> Vec<String> {
        Vec::new()
    }

    fn can_load(&self, path: &Path) -> bool {
        is_package_dir(path)
    }

    fn load(&self, path: &Path) -> Result<ModuleDescriptor, ModuleError> {
        self.load_package(path)
    }
}
