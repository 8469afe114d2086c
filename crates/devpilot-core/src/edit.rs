//! Proposed edits and their up-front validation.

use crate::error::{CoreError, CoreResult};
use devpilot_backup::BACKUP_DIR_NAME;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// A full-content replacement proposed for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedEdit {
    /// Path relative to the repository root. Missing paths deserialize as
    /// empty and fail validation.
    #[serde(default)]
    pub path: String,

    /// New file content, written verbatim.
    #[serde(alias = "code")]
    pub content: String,

    /// What the caller believes is on disk. Only used to detect conflicts.
    #[serde(
        default,
        alias = "expected_current",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_current: Option<String>,

    /// Write even when `expected_current` does not match.
    #[serde(default)]
    pub force: bool,
}

impl ProposedEdit {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            expected_current: None,
            force: false,
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected_current = Some(expected.into());
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// An edit whose path has been checked against the root.
#[derive(Debug, Clone)]
pub struct ValidatedEdit<'a> {
    /// Cleaned relative path.
    pub rel: PathBuf,
    /// Relative path with `/` separators, as reported back to callers.
    pub display: String,
    pub edit: &'a ProposedEdit,
}

impl ValidatedEdit<'_> {
    /// Absolute target path under `root`.
    pub fn target(&self, root: &Path) -> PathBuf {
        root.join(&self.rel)
    }
}

/// Validate a caller-supplied relative path.
///
/// Empty, absolute and `..`-containing paths are rejected, as are paths
/// inside the backup directory.
pub fn validate_path(path: &str) -> CoreResult<PathBuf> {
    let rel = devpilot_util::path::validate_relative(path)?;
    if let Some(Component::Normal(first)) = rel.components().next() {
        if first == BACKUP_DIR_NAME {
            return Err(CoreError::InvalidInput(format!(
                "path inside the backup directory is not editable: {path}"
            )));
        }
    }
    Ok(rel)
}

/// Validate every edit of a batch. The first invalid edit fails the batch.
pub fn validate_edits(edits: &[ProposedEdit]) -> CoreResult<Vec<ValidatedEdit<'_>>> {
    edits
        .iter()
        .map(|edit| {
            let rel = validate_path(&edit.path)?;
            let display = devpilot_util::path::to_posix(&rel);
            Ok(ValidatedEdit { rel, display, edit })
        })
        .collect()
}

/// Check that `rel` stays under `root` once symlinks are resolved.
///
/// The deepest existing ancestor of the target is canonicalized and must lie
/// under the canonical root. A dangling symlink on the way counts as an
/// escape.
pub async fn ensure_contained(root: &Path, rel: &Path) -> CoreResult<()> {
    let canonical_root = fs::canonicalize(root).await?;
    let escape = || CoreError::PathEscape(devpilot_util::path::to_posix(rel));

    let mut existing = root.join(rel);
    while fs::symlink_metadata(&existing).await.is_err() {
        if !existing.pop() {
            return Err(escape());
        }
    }

    let resolved = fs::canonicalize(&existing).await.map_err(|_| escape())?;
    if resolved.starts_with(&canonical_root) {
        Ok(())
    } else {
        Err(escape())
    }
}

/// Validate a batch and check every target against `root`.
///
/// Runs before anything is read or written, so one escaping edit fails the
/// whole batch.
pub async fn validate_batch<'a>(
    root: &Path,
    edits: &'a [ProposedEdit],
) -> CoreResult<Vec<ValidatedEdit<'a>>> {
    let validated = validate_edits(edits)?;
    for item in &validated {
        ensure_contained(root, &item.rel).await?;
    }
    Ok(validated)
}

/// Read a file's current bytes. `None` when the file does not exist.
pub(crate) async fn read_current(path: &Path) -> CoreResult<Option<Vec<u8>>> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {
            return Err(CoreError::InvalidInput(format!(
                "target is a directory: {}",
                path.display()
            )))
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CoreError::Io(e)),
    }
    Ok(Some(fs::read(path).await?))
}
