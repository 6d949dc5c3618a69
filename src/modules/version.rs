//! Version constraint parsing and validation.
//!
//! Module headers are written by hand, so versions such as `1.0` or `2` are
//! common. They are padded to full `major.minor.patch` form before being
//! handed to `semver`.

use semver::{Version, VersionReq};

/// Default version assigned to modules that do not declare one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Parse a version string, padding missing minor/patch components.
///
/// - `"1.2.3"` -> `1.2.3`
/// - `"1.2"` -> `1.2.0`
/// - `"3"` -> `3.0.0`
pub fn parse_lenient(version: &str) -> Option<Version> {
    let trimmed = version.trim();
    if let Ok(v) = Version::parse(trimmed) {
        return Some(v);
    }

    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.is_empty() || parts.len() > 2 {
        return None;
    }
    if !parts
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }

    let padded = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        _ => format!("{}.{}.0", parts[0], parts[1]),
    };
    Version::parse(&padded).ok()
}

/// Parse a version constraint string into a semver requirement.
///
/// Supports common constraint formats:
/// - `"^1.0"` - Compatible with 1.0 (1.x.x)
/// - `"~1.0"` - Approximately 1.0 (1.0.x)
/// - `">=1.0.0"` - Greater than or equal to 1.0.0
/// - `"=1.0.0"` - Exactly 1.0.0
/// - `"1.0"` - Shorthand for ^1.0
/// - `""` or `"*"` - Any version
pub fn parse_constraint(constraint: &str) -> Result<VersionReq, semver::Error> {
    let constraint = constraint.trim();
    if constraint.is_empty() {
        return Ok(VersionReq::STAR);
    }

    // If no operator prefix, treat as caret requirement
    let normalized = if constraint
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false)
    {
        format!("^{}", constraint)
    } else {
        constraint.to_string()
    };

    VersionReq::parse(&normalized)
}

/// Check if a version satisfies a constraint.
///
/// Invalid constraints or versions never satisfy anything.
pub fn satisfies(constraint: &str, version: &str) -> bool {
    let req = match parse_constraint(constraint) {
        Ok(r) => r,
        Err(_) => return false,
    };

    match parse_lenient(version) {
        Some(v) => req.matches(&v),
        None => false,
    }
}

/// Check if a version string is acceptable as a module version.
pub fn is_valid(version: &str) -> bool {
    parse_lenient(version).is_some()
}
