//! Diff planning: classify proposed edits against what is on disk.
//!
//! Planning never touches the filesystem beyond reading the targets, so the
//! same edits against the same tree always produce the same report.

use crate::diff;
use crate::edit::{read_current, validate_batch, ProposedEdit};
use crate::error::CoreResult;
use devpilot_backup::BackupStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// How a proposed edit relates to the file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// No file exists yet.
    Create,
    /// Proposed content is byte-identical to disk.
    Unchanged,
    /// Content differs and there is no conflict.
    Update,
    /// The expected baseline does not match disk.
    Conflict,
}

/// Classify one edit given the current bytes on disk.
///
/// An absent file is always a creation, whatever baseline was supplied.
pub fn classify(current: Option<&[u8]>, edit: &ProposedEdit) -> Classification {
    let Some(current) = current else {
        return Classification::Create;
    };
    if current == edit.content.as_bytes() {
        return Classification::Unchanged;
    }
    match &edit.expected_current {
        Some(expected) if expected.as_bytes() != current => Classification::Conflict,
        _ => Classification::Update,
    }
}

/// A file the edit would create or change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedChange {
    pub path: String,
    pub diff: String,
    /// Whether a backup already exists, i.e. applying will not take a new one.
    pub has_backup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnchangedFile {
    pub path: String,
}

/// An edit whose baseline no longer matches disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedConflict {
    pub path: String,
    pub expected_vs_current: String,
    pub current_vs_proposed: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub unchanged: usize,
    pub conflict: usize,
}

/// Classification of a batch of edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanReport {
    pub create: Vec<PlannedChange>,
    pub update: Vec<PlannedChange>,
    pub unchanged: Vec<UnchangedFile>,
    pub conflict: Vec<PlannedConflict>,
    pub summary: PlanSummary,
}

impl PlanReport {
    /// Classification of `path`, if it was part of the batch.
    pub fn classification_of(&self, path: &str) -> Option<Classification> {
        if self.create.iter().any(|c| c.path == path) {
            Some(Classification::Create)
        } else if self.update.iter().any(|c| c.path == path) {
            Some(Classification::Update)
        } else if self.unchanged.iter().any(|c| c.path == path) {
            Some(Classification::Unchanged)
        } else if self.conflict.iter().any(|c| c.path == path) {
            Some(Classification::Conflict)
        } else {
            None
        }
    }

    fn finish(mut self) -> Self {
        self.summary = PlanSummary {
            create: self.create.len(),
            update: self.update.len(),
            unchanged: self.unchanged.len(),
            conflict: self.conflict.len(),
        };
        self
    }
}

/// Classify every edit against the tree under `root`.
///
/// Any invalid path fails the whole batch before anything is read.
pub async fn plan(
    root: &Path,
    backups: &BackupStore,
    edits: &[ProposedEdit],
) -> CoreResult<PlanReport> {
    let validated = validate_batch(root, edits).await?;
    let mut report = PlanReport::default();

    for item in &validated {
        let edit = item.edit;
        let path = item.display.clone();
        let current = read_current(&item.target(root)).await?;

        match classify(current.as_deref(), edit) {
            Classification::Create => {
                let diff = diff::file_diff(&path, "", &edit.content);
                report.create.push(PlannedChange {
                    path,
                    diff,
                    has_backup: backups.has_backup(&item.rel).await?,
                });
            }
            Classification::Unchanged => report.unchanged.push(UnchangedFile { path }),
            Classification::Update => {
                let current = String::from_utf8_lossy(current.as_deref().unwrap_or_default());
                let diff = diff::file_diff(&path, &current, &edit.content);
                report.update.push(PlannedChange {
                    path,
                    diff,
                    has_backup: backups.has_backup(&item.rel).await?,
                });
            }
            Classification::Conflict => {
                let current = String::from_utf8_lossy(current.as_deref().unwrap_or_default());
                let expected = edit.expected_current.as_deref().unwrap_or_default();
                report.conflict.push(PlannedConflict {
                    expected_vs_current: diff::expected_vs_current(&path, expected, &current),
                    current_vs_proposed: diff::current_vs_proposed(&path, &current, &edit.content),
                    path,
                });
            }
        }
    }

    let report = report.finish();
    debug!(
        create = report.summary.create,
        update = report.summary.update,
        unchanged = report.summary.unchanged,
        conflict = report.summary.conflict,
        "Planned edits"
    );
    Ok(report)
}

/// The three texts a merge view needs for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeWayView {
    pub path: String,
    /// The caller's baseline, or the current content when none was given.
    pub expected: String,
    /// Current content, empty when the file does not exist.
    pub current: String,
    pub proposed: String,
}

/// Build a three-way view for every edit, whatever its classification.
pub async fn three_way(root: &Path, edits: &[ProposedEdit]) -> CoreResult<Vec<ThreeWayView>> {
    let validated = validate_batch(root, edits).await?;
    let mut views = Vec::with_capacity(validated.len());

    for item in &validated {
        let current = read_current(&item.target(root))
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        let expected = item
            .edit
            .expected_current
            .clone()
            .unwrap_or_else(|| current.clone());
        views.push(ThreeWayView {
            path: item.display.clone(),
            expected,
            current,
            proposed: item.edit.content.clone(),
        });
    }

    Ok(views)
}
