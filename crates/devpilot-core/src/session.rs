//! The repository session every operation runs against.
//!
//! A session holds the active repository root, its current snapshot and the
//! loaded settings. It is cheap to clone; clones share state.
//!
//! # Example
//!
//! ```ignore
//! use devpilot_core::{ApplyOptions, ProposedEdit, RepoSession, SettingsStore};
//!
//! let session = RepoSession::open(SettingsStore::default_location()?).await;
//! session.scan("~/code/project").await?;
//!
//! let edits = vec![ProposedEdit::new("src/lib.rs", "pub fn answer() -> u32 { 42 }\n")];
//! let plan = session.plan(&edits).await?;
//! let report = session.apply(&edits, ApplyOptions::default()).await?;
//! ```

use crate::apply::{self, ApplyOptions, ApplyReport};
use crate::config::{Settings, SettingsStore};
use crate::edit::{ensure_contained, validate_path, ProposedEdit};
use crate::error::{CoreError, CoreResult, SettingsError};
use crate::ignore::{self, IgnoreResolver, REPO_IGNORE_FILE};
use crate::plan::{self, PlanReport, ThreeWayView};
use crate::snapshot::{build_snapshot, RepoSnapshot, TreeNode};
use devpilot_backup::BackupStore;
use devpilot_util::path::{expand_home, is_within, to_posix};
use devpilot_util::TimingGuard;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Result of selecting or rescanning a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub root: String,
    pub files: usize,
}

/// Result of a revert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertReport {
    /// Paths restored from their backups. Paths without a backup are absent.
    pub restored: Vec<String>,
}

/// A file read from the active repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// Active repository root.
    pub repo: String,
    /// Relative path with `/` separators.
    pub file: String,
    /// Content, decoded lossily as UTF-8.
    pub code: String,
}

#[derive(Clone)]
struct ActiveRepo {
    root: PathBuf,
    snapshot: Arc<RepoSnapshot>,
}

/// Shared engine state for one front-end.
#[derive(Clone)]
pub struct RepoSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    /// Serializes every sequence that mutates the tree, backups or settings.
    op_lock: Mutex<()>,

    repo: RwLock<Option<ActiveRepo>>,

    settings: RwLock<Settings>,

    settings_store: SettingsStore,
}

impl RepoSession {
    /// Create a session, loading settings from `settings_store`.
    pub async fn open(settings_store: SettingsStore) -> Self {
        let settings = settings_store.load().await;
        debug!(dir = %settings_store.dir().display(), "Opened session");
        Self {
            inner: Arc::new(SessionInner {
                op_lock: Mutex::new(()),
                repo: RwLock::new(None),
                settings: RwLock::new(settings),
                settings_store,
            }),
        }
    }

    /// The active repository root, if one has been scanned.
    pub async fn root(&self) -> Option<PathBuf> {
        self.inner.repo.read().await.as_ref().map(|r| r.root.clone())
    }

    async fn active_root(&self) -> CoreResult<PathBuf> {
        self.root().await.ok_or(CoreError::NoRepo)
    }

    /// Select a repository root and build its first snapshot.
    ///
    /// With `clear_backups_on_scan` set, the root's previous backups are
    /// discarded and a new backup epoch begins.
    pub async fn scan(&self, root_path: &str) -> CoreResult<ScanSummary> {
        let clear = self.inner.settings.read().await.clear_backups_on_scan;
        self.select_root(root_path, clear).await
    }

    /// Select a repository root without touching its backups.
    ///
    /// Used by one-shot callers (such as the CLI) that must be able to revert
    /// edits applied by an earlier process.
    pub async fn attach(&self, root_path: &str) -> CoreResult<ScanSummary> {
        self.select_root(root_path, false).await
    }

    async fn select_root(&self, root_path: &str, clear_backups: bool) -> CoreResult<ScanSummary> {
        if root_path.trim().is_empty() {
            return Err(CoreError::InvalidInput("repo_root is required".to_string()));
        }

        let requested = expand_home(root_path.trim());
        let root = tokio::fs::canonicalize(&requested)
            .await
            .map_err(|_| CoreError::RootNotFound(root_path.to_string()))?;
        let is_dir = tokio::fs::metadata(&root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(CoreError::RootNotFound(root_path.to_string()));
        }

        let _guard = self.inner.op_lock.lock().await;
        let _timing = TimingGuard::new("scan", root.display().to_string());

        if clear_backups {
            BackupStore::new(&root).clear().await?;
        }

        let snapshot = self.rebuild_locked(root.clone()).await?;
        info!(root = %root.display(), files = snapshot.len(), "Scanned repository");
        Ok(ScanSummary {
            root: root.display().to_string(),
            files: snapshot.len(),
        })
    }

    /// Rebuild the snapshot of the active root.
    pub async fn rescan(&self) -> CoreResult<ScanSummary> {
        let _guard = self.inner.op_lock.lock().await;
        let root = self.active_root().await?;
        let snapshot = self.rebuild_locked(root.clone()).await?;
        Ok(ScanSummary {
            root: root.display().to_string(),
            files: snapshot.len(),
        })
    }

    /// Walk `root` and swap the new snapshot in. Callers hold `op_lock`.
    async fn rebuild_locked(&self, root: PathBuf) -> CoreResult<Arc<RepoSnapshot>> {
        let patterns = self.inner.settings.read().await.ignore_patterns.clone();
        let walk_root = root.clone();
        let snapshot = tokio::task::spawn_blocking(move || {
            let resolver = IgnoreResolver::load(&walk_root, &patterns);
            build_snapshot(&walk_root, &resolver)
        })
        .await?;

        let snapshot = Arc::new(snapshot);
        *self.inner.repo.write().await = Some(ActiveRepo {
            root,
            snapshot: Arc::clone(&snapshot),
        });
        Ok(snapshot)
    }

    /// Rebuild if a root is active. Callers hold `op_lock`.
    async fn refresh_locked(&self) -> CoreResult<()> {
        if let Some(root) = self.root().await {
            self.rebuild_locked(root).await?;
        }
        Ok(())
    }

    /// The current snapshot, empty when no root is active.
    pub async fn snapshot(&self) -> Arc<RepoSnapshot> {
        match self.inner.repo.read().await.as_ref() {
            Some(repo) => Arc::clone(&repo.snapshot),
            None => Arc::new(RepoSnapshot::default()),
        }
    }

    /// The current snapshot as a tree; just the root node when no root is
    /// active.
    pub async fn tree(&self) -> TreeNode {
        self.snapshot().await.tree()
    }

    /// Read one file of the active repository.
    pub async fn read_file(&self, path: &str) -> CoreResult<FileContent> {
        let root = self.active_root().await?;
        let rel = validate_path(path)?;
        let full = root.join(&rel);

        let is_file = tokio::fs::metadata(&full)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(CoreError::NotFound(format!("File not found: {path}")));
        }
        if !is_within(&full, &root) {
            return Err(CoreError::PathEscape(path.to_string()));
        }

        let bytes = tokio::fs::read(&full).await?;
        Ok(FileContent {
            repo: root.display().to_string(),
            file: to_posix(&rel),
            code: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Classify edits against the active repository. Read-only.
    pub async fn plan(&self, edits: &[ProposedEdit]) -> CoreResult<PlanReport> {
        let root = self.active_root().await?;
        plan::plan(&root, &BackupStore::new(&root), edits).await
    }

    /// Expected/current/proposed texts for every edit. Read-only.
    pub async fn three_way(&self, edits: &[ProposedEdit]) -> CoreResult<Vec<ThreeWayView>> {
        let root = self.active_root().await?;
        plan::three_way(&root, edits).await
    }

    /// Apply edits to the active repository and rebuild the snapshot.
    pub async fn apply(
        &self,
        edits: &[ProposedEdit],
        options: ApplyOptions,
    ) -> CoreResult<ApplyReport> {
        let _guard = self.inner.op_lock.lock().await;
        let root = self.active_root().await?;

        let report = apply::apply(&root, &BackupStore::new(&root), edits, options).await?;
        if !options.dry_run {
            self.rebuild_locked(root).await?;
        }
        Ok(report)
    }

    /// Restore files from their backups and rebuild the snapshot.
    pub async fn revert(&self, paths: &[String]) -> CoreResult<RevertReport> {
        let rels = paths
            .iter()
            .map(|p| validate_path(p))
            .collect::<CoreResult<Vec<_>>>()?;

        let _guard = self.inner.op_lock.lock().await;
        let root = self.active_root().await?;
        for rel in &rels {
            ensure_contained(&root, rel).await?;
        }

        let restored = BackupStore::new(&root).restore(&rels).await?;
        self.rebuild_locked(root).await?;
        Ok(RevertReport {
            restored: restored.iter().map(|p| to_posix(p)).collect(),
        })
    }

    /// Relative paths that currently have a backup.
    pub async fn list_backups(&self) -> CoreResult<Vec<String>> {
        let root = self.active_root().await?;
        let backups = BackupStore::new(&root).list().await?;
        Ok(backups.iter().map(|p| to_posix(p)).collect())
    }

    /// Discard every backup of the active repository.
    pub async fn clear_backups(&self) -> CoreResult<usize> {
        let _guard = self.inner.op_lock.lock().await;
        let root = self.active_root().await?;
        let cleared = BackupStore::new(&root).clear().await?;
        self.rebuild_locked(root).await?;
        Ok(cleared)
    }

    /// User ignore patterns from settings.
    pub async fn ignore_patterns(&self) -> Vec<String> {
        self.inner.settings.read().await.ignore_patterns.clone()
    }

    /// Replace the user ignore patterns, persist them and rebuild.
    pub async fn set_ignore_patterns(&self, patterns: &[String]) -> CoreResult<Vec<String>> {
        let _guard = self.inner.op_lock.lock().await;

        let mut settings = self.inner.settings.read().await.clone();
        settings.ignore_patterns = ignore::normalize_patterns(patterns);
        self.inner.settings_store.save(&settings).await?;
        let saved = settings.ignore_patterns.clone();
        *self.inner.settings.write().await = settings;

        self.refresh_locked().await?;
        Ok(saved)
    }

    /// Patterns in the active repository's `.devpilotignore`.
    pub async fn repo_ignore_patterns(&self) -> CoreResult<Vec<String>> {
        let root = self.active_root().await?;
        match tokio::fs::read_to_string(root.join(REPO_IGNORE_FILE)).await {
            Ok(content) => Ok(ignore::parse_patterns(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(CoreError::Io(e)),
        }
    }

    /// Rewrite the active repository's `.devpilotignore` and rebuild.
    pub async fn set_repo_ignore_patterns(&self, patterns: &[String]) -> CoreResult<Vec<String>> {
        let _guard = self.inner.op_lock.lock().await;
        let root = self.active_root().await?;

        let content = ignore::render_patterns(patterns);
        tokio::fs::write(root.join(REPO_IGNORE_FILE), &content).await?;
        self.rebuild_locked(root).await?;
        Ok(ignore::parse_patterns(&content))
    }

    /// Current settings.
    pub async fn settings(&self) -> Settings {
        self.inner.settings.read().await.clone()
    }

    /// Deep-merge a JSON object into the settings and persist the result.
    pub async fn update_settings(&self, patch: Value) -> CoreResult<Settings> {
        let _guard = self.inner.op_lock.lock().await;

        let current = self.inner.settings.read().await.clone();
        let updated = current.merged_with(patch).map_err(|e| match e {
            SettingsError::InvalidJson { message, .. } => CoreError::InvalidInput(message),
            other => CoreError::Settings(other),
        })?;
        self.inner.settings_store.save(&updated).await?;
        *self.inner.settings.write().await = updated.clone();

        if updated.ignore_patterns != current.ignore_patterns {
            self.refresh_locked().await?;
        }
        Ok(updated)
    }
}
