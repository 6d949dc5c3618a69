//! Module System Errors
//!
//! A single error type covers every failure the module system can report.
//! Loader entry points never return these directly; they are carried inside
//! a failed [`LoadResult`](super::LoadResult) instead. Content loaders, the
//! hybrid composer and configuration loading return them through `Result`.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while resolving, loading or using a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// The loader has been switched off (`set_enabled(false)` or `close()`).
    Disabled,
    /// The module reference could not be resolved to a file.
    NotFound(String),
    /// No registered content loader claims the resolved path.
    NoLoader(PathBuf),
    /// A content loader ran but produced nothing usable.
    LoadFailure { path: PathBuf, reason: String },
    /// The module loaded but failed structural checks.
    /// Carries every problem found, not just the first.
    ValidationFailure(Vec<String>),
    /// One or more required dependencies could not be loaded or found.
    DependencyMissing(Vec<String>),
    /// A cycle among required dependencies, listed from the first repeated name.
    DependencyCycle(Vec<String>),
    /// The load did not finish within `LoadOptions::timeout`.
    Timeout { reference: String, elapsed: Duration },
    /// File system access failed.
    Io { path: PathBuf, message: String },
    /// Module content could not be parsed.
    Parse { path: PathBuf, message: String },
    /// The module has no script half (`call_function` on a markup-only module).
    NoScriptPart(String),
    /// The script half does not declare the requested function.
    FunctionNotFound { module: String, function: String },
    /// The function is declared but no native implementation is bound.
    FunctionUnbound { module: String, function: String },
    /// The bound implementation returned an error.
    FunctionFailed { module: String, function: String, message: String },
    /// No module with this name is registered.
    UnknownModule(String),
    /// A diagnostic dump could not be serialized.
    Serialization(String),
    /// The loader configuration file is malformed.
    Config(String),
}

impl ModuleError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        ModuleError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ModuleError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Extra lines worth showing next to the one-line message.
    ///
    /// Validation failures list each problem; load failures carry the
    /// loader's reason.
    pub fn details(&self) -> Vec<String> {
        match self {
            ModuleError::ValidationFailure(errors) => errors.clone(),
            ModuleError::LoadFailure { reason, .. } => vec![reason.clone()],
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Display for ModuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleError::Disabled => write!(f, "Loader is disabled"),
            ModuleError::NotFound(reference) => write!(f, "Module not found: {}", reference),
            ModuleError::NoLoader(path) => write!(f, "No loader found for: {}", path.display()),
            ModuleError::LoadFailure { path, .. } => {
                write!(f, "Failed to load module: {}", path.display())
            }
            ModuleError::ValidationFailure(_) => write!(f, "Module validation failed"),
            ModuleError::DependencyMissing(names) => {
                write!(f, "Missing required dependencies: {}", names.join(", "))
            }
            ModuleError::DependencyCycle(chain) => {
                write!(f, "Dependency cycle detected: {}", chain.join(" -> "))
            }
            ModuleError::Timeout { reference, elapsed } => write!(
                f,
                "Timed out loading '{}' after {}ms",
                reference,
                elapsed.as_millis()
            ),
            ModuleError::Io { path, message } => {
                write!(f, "Failed to read '{}': {}", path.display(), message)
            }
            ModuleError::Parse { path, message } => {
                write!(f, "Failed to parse '{}': {}", path.display(), message)
            }
            ModuleError::NoScriptPart(module) => {
                write!(f, "Module '{}' has no script part", module)
            }
            ModuleError::FunctionNotFound { module, function } => {
                write!(f, "Function not found: {} in module {}", function, module)
            }
            ModuleError::FunctionUnbound { module, function } => write!(
                f,
                "Function implementation not available: {}::{}",
                module, function
            ),
            ModuleError::FunctionFailed { module, function, message } => {
                write!(f, "Function {}::{} failed: {}", module, function, message)
            }
            ModuleError::UnknownModule(name) => write!(f, "Unknown module: {}", name),
            ModuleError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ModuleError::Config(msg) => write!(f, "Invalid loader configuration: {}", msg),
        }
    }
}

impl std::error::Error for ModuleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_messages() {
        assert_eq!(ModuleError::Disabled.to_string(), "Loader is disabled");
        assert_eq!(
            ModuleError::NotFound("foo".to_string()).to_string(),
            "Module not found: foo"
        );
        assert_eq!(
            ModuleError::NoLoader(PathBuf::from("mods/foo.txt")).to_string(),
            "No loader found for: mods/foo.txt"
        );
        let err = ModuleError::LoadFailure {
            path: PathBuf::from("mods/foo.chtl"),
            reason: "empty file".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to load module: mods/foo.chtl");
        assert_eq!(err.details(), vec!["empty file".to_string()]);
    }

    #[test]
    fn test_validation_failure_details() {
        let err = ModuleError::ValidationFailure(vec![
            "Module name is required".to_string(),
            "Duplicate export name: x".to_string(),
        ]);
        assert_eq!(err.to_string(), "Module validation failed");
        assert_eq!(err.details().len(), 2);
    }

    #[test]
    fn test_cycle_display() {
        let err = ModuleError::DependencyCycle(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert!(err.to_string().contains("a -> b -> a"));
    }
}
