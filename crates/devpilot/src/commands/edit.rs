//! One-shot repository commands: scan, plan, apply and revert.
//!
//! Each command attaches to the root without clearing backups, prints its
//! result as pretty JSON on stdout and exits.

use anyhow::Context;
use devpilot_core::{ApplyOptions, ProposedEdit, RepoSession};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Edits file contents: a bare array or the `/plan` request body.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EditsFile {
    List(Vec<ProposedEdit>),
    Request { files: Vec<ProposedEdit> },
}

impl EditsFile {
    fn into_edits(self) -> Vec<ProposedEdit> {
        match self {
            EditsFile::List(edits) | EditsFile::Request { files: edits } => edits,
        }
    }
}

/// Parse the contents of an edits file.
pub fn parse_edits(contents: &str) -> anyhow::Result<Vec<ProposedEdit>> {
    let file: EditsFile = serde_json::from_str(contents)
        .context("edits must be a JSON array or an object with a `files` array")?;
    Ok(file.into_edits())
}

async fn read_edits(path: &Path) -> anyhow::Result<Vec<ProposedEdit>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read edits file {}", path.display()))?;
    parse_edits(&contents)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Scan a repository and print its file count.
pub async fn handle_scan(session: &RepoSession, root: &str) -> anyhow::Result<()> {
    let summary = session.attach(root).await?;
    print_json(&summary)
}

/// Classify edits from a file against the repository.
pub async fn handle_plan(session: &RepoSession, root: &str, edits: &Path) -> anyhow::Result<()> {
    let edits = read_edits(edits).await?;
    session.attach(root).await?;
    let report = session.plan(&edits).await?;
    print_json(&report)
}

/// Apply edits from a file to the repository.
pub async fn handle_apply(
    session: &RepoSession,
    root: &str,
    edits: &Path,
    options: ApplyOptions,
) -> anyhow::Result<()> {
    let edits = read_edits(edits).await?;
    session.attach(root).await?;
    let report = session.apply(&edits, options).await?;
    print_json(&report)?;

    if !report.failed.is_empty() {
        anyhow::bail!("{} file(s) failed to apply", report.failed.len());
    }
    Ok(())
}

/// Restore files from their backups.
pub async fn handle_revert(
    session: &RepoSession,
    root: &str,
    paths: &[String],
) -> anyhow::Result<()> {
    session.attach(root).await?;
    let report = session.revert(paths).await?;
    print_json(&report)
}
