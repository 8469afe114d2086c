//! Path utilities.
//!
//! Platform directories plus the helpers that keep caller-supplied relative
//! paths inside a repository root.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Environment variable that overrides the configuration directory.
pub const CONFIG_DIR_ENV: &str = "DEVPILOT_CONFIG_DIR";

/// Get the devpilot configuration directory.
///
/// `$DEVPILOT_CONFIG_DIR` wins when set, otherwise the platform config
/// directory (`~/.config/devpilot` on Linux,
/// `~/Library/Application Support/devpilot` on macOS, `%APPDATA%\devpilot`
/// on Windows).
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir));
        }
    }
    dirs::config_dir().map(|p| p.join("devpilot"))
}

/// Get the devpilot logs directory.
pub fn logs_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        if let Some(state_dir) = dirs::state_dir() {
            return Some(state_dir.join("devpilot").join("logs"));
        }
    }

    dirs::data_local_dir().map(|p| p.join("devpilot").join("logs"))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Validate a caller-supplied relative path.
///
/// Rejects empty paths, absolute or rooted paths, drive prefixes and any `..`
/// segment (with either separator). `.` segments are dropped. Returns the
/// cleaned relative path.
pub fn validate_relative(path: &str) -> Result<PathBuf> {
    if path.trim().is_empty() {
        return Err(Error::invalid_input("path is required"));
    }
    if path.contains('\0') {
        return Err(Error::invalid_input(format!("path contains NUL byte: {path:?}")));
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(Error::path_escape(format!("absolute path not allowed: {path}")));
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(Error::path_escape(format!(
            "parent directory segments not allowed: {path}"
        )));
    }

    let mut cleaned = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::path_escape(format!("path escapes the root: {path}")));
            }
        }
    }

    if cleaned.as_os_str().is_empty() {
        return Err(Error::invalid_input(format!("path names no file: {path}")));
    }

    Ok(cleaned)
}

/// Render a relative path with `/` separators.
pub fn to_posix(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Check if a path is within a base directory.
pub fn is_within(path: &Path, base: &Path) -> bool {
    let canonical_path = path.canonicalize().ok();
    let canonical_base = base.canonicalize().ok();

    match (canonical_path, canonical_base) {
        (Some(p), Some(b)) => p.starts_with(&b),
        _ => path.starts_with(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn test_validate_relative_accepts_nested() {
        let path = validate_relative("src/lib.rs").unwrap();
        assert_eq!(path, PathBuf::from("src").join("lib.rs"));
    }

    #[test]
    fn test_validate_relative_drops_cur_dir() {
        let path = validate_relative("./src/./main.rs").unwrap();
        assert_eq!(to_posix(&path), "src/main.rs");
    }

    #[test]
    fn test_validate_relative_rejects_parent() {
        let err = validate_relative("../escape.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathEscape);

        let err = validate_relative("src/../../escape.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathEscape);

        let err = validate_relative("src\\..\\escape.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathEscape);
    }

    #[test]
    fn test_validate_relative_rejects_absolute() {
        let err = validate_relative("/etc/passwd").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathEscape);

        let err = validate_relative("\\windows\\system32").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathEscape);
    }

    #[test]
    fn test_validate_relative_rejects_empty() {
        assert_eq!(
            validate_relative("").unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            validate_relative("   ").unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            validate_relative(".").unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_to_posix() {
        let path = PathBuf::from("a").join("b").join("c.txt");
        assert_eq!(to_posix(&path), "a/b/c.txt");
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/x"), PathBuf::from("/tmp/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/code"), home.join("code"));
        }
    }

    #[test]
    fn test_is_within() {
        let dir = tempdir().unwrap();
        let inner = dir.path().join("src");
        std::fs::create_dir(&inner).unwrap();
        assert!(is_within(&inner, dir.path()));
        assert!(!is_within(Path::new("/"), dir.path()));
    }
}
