//! Conflict-aware application of proposed edits.
//!
//! Every edit in a batch is validated before anything is written. After
//! that, each file is handled on its own: a conflict or a failed write for
//! one file does not stop the others, and nothing already written is rolled
//! back.

use crate::edit::{read_current, validate_batch, ProposedEdit, ValidatedEdit};
use crate::error::{CoreError, CoreResult};
use devpilot_backup::BackupStore;
use devpilot_util::TimingGuard;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

/// Batch-wide apply policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOptions {
    /// Report what would be written without touching the filesystem.
    #[serde(default, alias = "dry_run")]
    pub dry_run: bool,
    /// Write even when an edit's baseline does not match disk.
    #[serde(default)]
    pub force: bool,
}

/// A file whose write failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of an apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Files written (or that would be written, for a dry run).
    pub written: Vec<String>,
    /// Files skipped because their baseline did not match disk.
    pub conflicts: Vec<String>,
    /// Files whose write failed.
    pub failed: Vec<ApplyFailure>,
    /// Files for which this apply took the first backup.
    pub backed_up: Vec<String>,
    pub dry_run: bool,
}

impl ApplyReport {
    /// Whether any file was actually changed on disk.
    pub fn mutated(&self) -> bool {
        !self.dry_run && !self.written.is_empty()
    }
}

enum Outcome {
    Written { backed_up: bool },
    Conflict,
}

/// Apply edits under `root`, backing up each file before its first overwrite.
pub async fn apply(
    root: &Path,
    backups: &BackupStore,
    edits: &[ProposedEdit],
    options: ApplyOptions,
) -> CoreResult<ApplyReport> {
    let validated = validate_batch(root, edits).await?;
    let mut report = ApplyReport {
        dry_run: options.dry_run,
        ..Default::default()
    };

    if options.dry_run {
        report.written = validated.into_iter().map(|v| v.display).collect();
        debug!(files = report.written.len(), "Dry run, nothing written");
        return Ok(report);
    }

    let _timing = TimingGuard::new("apply", root.display().to_string());

    for item in &validated {
        match apply_one(root, backups, item, options.force).await {
            Ok(Outcome::Written { backed_up }) => {
                if backed_up {
                    report.backed_up.push(item.display.clone());
                }
                report.written.push(item.display.clone());
            }
            Ok(Outcome::Conflict) => {
                debug!(path = %item.display, "Baseline mismatch, skipping");
                report.conflicts.push(item.display.clone());
            }
            Err(e) => {
                warn!(path = %item.display, error = %e, "Failed to apply edit");
                report.failed.push(ApplyFailure {
                    path: item.display.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        written = report.written.len(),
        conflicts = report.conflicts.len(),
        failed = report.failed.len(),
        "Applied edits"
    );
    Ok(report)
}

async fn apply_one(
    root: &Path,
    backups: &BackupStore,
    item: &ValidatedEdit<'_>,
    force: bool,
) -> CoreResult<Outcome> {
    let edit = item.edit;
    let target = item.target(root);

    if let Some(expected) = &edit.expected_current {
        if !(edit.force || force) {
            let current = read_current(&target).await?.unwrap_or_default();
            if current != expected.as_bytes() {
                return Ok(Outcome::Conflict);
            }
        }
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    let backed_up = backups.backup_if_needed(&item.rel).await?;
    fs::write(&target, edit.content.as_bytes())
        .await
        .map_err(CoreError::Io)?;

    Ok(Outcome::Written { backed_up })
}
