//! Backup storage implementation.

use crate::{BackupError, BackupResult};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Directory under the repository root that holds backups.
pub const BACKUP_DIR_NAME: &str = ".devpilot_backups";

/// Suffix appended to every backed-up file name.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Storage for first-overwrite file backups.
///
/// The backup for `<repo>/<rel>` lives at `<backup_root>/<rel>.bak`. A backup
/// is written at most once per path until the backup root is cleared.
#[derive(Debug, Clone)]
pub struct BackupStore {
    /// Directory holding the mirrored backups.
    backup_root: PathBuf,

    /// Repository root (for resolving relative paths).
    repo_root: PathBuf,
}

impl BackupStore {
    /// Create a store using the default `.devpilot_backups` directory.
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        Self {
            backup_root: repo_root.join(BACKUP_DIR_NAME),
            repo_root,
        }
    }

    /// Location of the backup for a relative path.
    pub fn backup_path(&self, rel: &Path) -> BackupResult<PathBuf> {
        let normalized = self.normalize_path(rel)?;
        let mut os: OsString = self.backup_root.join(normalized).into_os_string();
        os.push(BACKUP_SUFFIX);
        Ok(PathBuf::from(os))
    }

    /// Check whether a backup exists for a relative path.
    pub async fn has_backup(&self, rel: &Path) -> BackupResult<bool> {
        let backup = self.backup_path(rel)?;
        Ok(fs::try_exists(&backup).await?)
    }

    /// Copy the live file to its backup location unless a backup already exists.
    ///
    /// Call this immediately before overwriting `rel`. Returns `true` when a new
    /// backup was written. A missing live file (about to be created) or an
    /// existing backup is a no-op; an existing backup is never replaced.
    pub async fn backup_if_needed(&self, rel: &Path) -> BackupResult<bool> {
        let normalized = self.normalize_path(rel)?;
        let src = self.repo_root.join(&normalized);
        let dst = self.backup_path(&normalized)?;

        if !fs::try_exists(&src).await? {
            debug!(path = %normalized.display(), "No live file, nothing to back up");
            return Ok(false);
        }

        if fs::try_exists(&dst).await? {
            debug!(path = %normalized.display(), "Backup already exists, keeping original");
            return Ok(false);
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::copy(&src, &dst).await.map_err(|e| {
            BackupError::operation_failed(format!("Failed to back up {}: {}", src.display(), e))
        })?;

        debug!(path = %normalized.display(), backup = %dst.display(), "Backed up");
        Ok(true)
    }

    /// Read the backed-up content for a relative path, if any.
    pub async fn read_backup(&self, rel: &Path) -> BackupResult<Option<Vec<u8>>> {
        let backup = self.backup_path(rel)?;
        match fs::read(&backup).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BackupError::Io(e)),
        }
    }

    /// Restore files from their backups.
    ///
    /// Paths without a backup are skipped and left out of the returned list.
    /// Backups are kept, so the same path can be reverted again later.
    pub async fn restore(&self, paths: &[PathBuf]) -> BackupResult<Vec<PathBuf>> {
        let mut restored = Vec::new();

        for path in paths {
            let normalized = self.normalize_path(path)?;
            let src = self.backup_path(&normalized)?;
            let dst = self.repo_root.join(&normalized);

            if !fs::try_exists(&src).await? {
                debug!(path = %normalized.display(), "No backup to restore");
                continue;
            }

            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent).await?;
            }

            fs::copy(&src, &dst).await.map_err(|e| {
                BackupError::operation_failed(format!(
                    "Failed to restore {}: {}",
                    dst.display(),
                    e
                ))
            })?;

            debug!(path = %normalized.display(), "Restored");
            restored.push(normalized);
        }

        info!(
            requested = paths.len(),
            restored = restored.len(),
            "Restored files from backups"
        );

        Ok(restored)
    }

    /// List the relative paths that currently have a backup, sorted.
    pub async fn list(&self) -> BackupResult<Vec<PathBuf>> {
        let mut found = Vec::new();
        let mut pending = vec![self.backup_root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(BackupError::Io(e)),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(rel) = path.strip_prefix(&self.backup_root) else {
                    continue;
                };
                let rel = rel.to_string_lossy();
                match rel.strip_suffix(BACKUP_SUFFIX) {
                    Some(original) if !original.is_empty() => found.push(PathBuf::from(original)),
                    _ => warn!(path = %path.display(), "Ignoring stray file in backup root"),
                }
            }
        }

        found.sort();
        Ok(found)
    }

    /// Remove every backup, starting a new backup epoch.
    ///
    /// Returns the number of backups removed.
    pub async fn clear(&self) -> BackupResult<usize> {
        let count = self.list().await?.len();

        match fs::remove_dir_all(&self.backup_root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BackupError::Io(e)),
        }

        if count > 0 {
            info!(count, root = %self.backup_root.display(), "Cleared backups");
        }
        Ok(count)
    }

    /// Normalize a path to be relative to the repository root.
    fn normalize_path(&self, path: &Path) -> BackupResult<PathBuf> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.repo_root).map_err(|_| {
                BackupError::invalid_path(format!(
                    "Path {:?} is not under repository root {:?}",
                    path, self.repo_root
                ))
            })?
        } else {
            path
        };

        let mut normalized = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(BackupError::invalid_path(format!(
                        "Path {:?} escapes the repository root",
                        path
                    )))
                }
            }
        }

        if normalized.as_os_str().is_empty() {
            return Err(BackupError::invalid_path("Empty path"));
        }

        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test() -> (TempDir, BackupStore) {
        let dir = TempDir::new().unwrap();
        let store = BackupStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_backup_and_restore() {
        let (dir, store) = setup_test();

        let test_file = dir.path().join("test.txt");
        fs::write(&test_file, "original content").await.unwrap();

        let created = store.backup_if_needed(Path::new("test.txt")).await.unwrap();
        assert!(created);

        fs::write(&test_file, "modified content").await.unwrap();

        let restored = store.restore(&[PathBuf::from("test.txt")]).await.unwrap();
        assert_eq!(restored, vec![PathBuf::from("test.txt")]);

        let content = fs::read_to_string(&test_file).await.unwrap();
        assert_eq!(content, "original content");
    }

    #[tokio::test]
    async fn test_backup_is_taken_only_once() {
        let (dir, store) = setup_test();
        let test_file = dir.path().join("a.txt");

        fs::write(&test_file, "first").await.unwrap();
        assert!(store.backup_if_needed(Path::new("a.txt")).await.unwrap());

        fs::write(&test_file, "second").await.unwrap();
        assert!(!store.backup_if_needed(Path::new("a.txt")).await.unwrap());

        let backup = store.read_backup(Path::new("a.txt")).await.unwrap();
        assert_eq!(backup.as_deref(), Some("first".as_bytes()));
    }

    #[tokio::test]
    async fn test_backup_of_missing_file_is_noop() {
        let (_dir, store) = setup_test();

        let created = store.backup_if_needed(Path::new("new.txt")).await.unwrap();
        assert!(!created);
        assert!(!store.has_backup(Path::new("new.txt")).await.unwrap());
    }

    #[tokio::test]
    async fn test_backup_path_mirrors_structure() {
        let (dir, store) = setup_test();

        let path = store.backup_path(Path::new("src/lib.rs")).unwrap();
        assert_eq!(
            path,
            dir.path()
                .join(BACKUP_DIR_NAME)
                .join("src")
                .join("lib.rs.bak")
        );
    }

    #[tokio::test]
    async fn test_nested_backup_creates_parents() {
        let (dir, store) = setup_test();
        let nested = dir.path().join("src/deep/mod.rs");
        fs::create_dir_all(nested.parent().unwrap()).await.unwrap();
        fs::write(&nested, "pub mod x;").await.unwrap();

        assert!(store
            .backup_if_needed(Path::new("src/deep/mod.rs"))
            .await
            .unwrap());
        assert!(store.has_backup(Path::new("src/deep/mod.rs")).await.unwrap());
    }

    #[tokio::test]
    async fn test_restore_skips_missing_backups() {
        let (dir, store) = setup_test();
        fs::write(dir.path().join("kept.txt"), "v1").await.unwrap();
        store.backup_if_needed(Path::new("kept.txt")).await.unwrap();

        let restored = store
            .restore(&[PathBuf::from("kept.txt"), PathBuf::from("never.txt")])
            .await
            .unwrap();
        assert_eq!(restored, vec![PathBuf::from("kept.txt")]);
    }

    #[tokio::test]
    async fn test_restore_keeps_backup() {
        let (dir, store) = setup_test();
        let file = dir.path().join("a.txt");
        fs::write(&file, "v1").await.unwrap();
        store.backup_if_needed(Path::new("a.txt")).await.unwrap();

        fs::write(&file, "v2").await.unwrap();
        store.restore(&[PathBuf::from("a.txt")]).await.unwrap();
        fs::write(&file, "v3").await.unwrap();
        store.restore(&[PathBuf::from("a.txt")]).await.unwrap();

        assert_eq!(fs::read_to_string(&file).await.unwrap(), "v1");
    }

    #[tokio::test]
    async fn test_restore_recreates_deleted_file() {
        let (dir, store) = setup_test();
        let file = dir.path().join("docs/guide.md");
        fs::create_dir_all(file.parent().unwrap()).await.unwrap();
        fs::write(&file, "guide").await.unwrap();
        store
            .backup_if_needed(Path::new("docs/guide.md"))
            .await
            .unwrap();

        fs::remove_dir_all(dir.path().join("docs")).await.unwrap();
        store
            .restore(&[PathBuf::from("docs/guide.md")])
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(&file).await.unwrap(), "guide");
    }

    #[tokio::test]
    async fn test_list_and_clear() {
        let (dir, store) = setup_test();
        fs::create_dir_all(dir.path().join("src")).await.unwrap();
        fs::write(dir.path().join("src/a.rs"), "a").await.unwrap();
        fs::write(dir.path().join("b.txt"), "b").await.unwrap();
        store.backup_if_needed(Path::new("src/a.rs")).await.unwrap();
        store.backup_if_needed(Path::new("b.txt")).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(
            listed,
            vec![PathBuf::from("b.txt"), PathBuf::from("src").join("a.rs")]
        );

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.list().await.unwrap().is_empty());

        // A new epoch takes a fresh backup.
        fs::write(dir.path().join("b.txt"), "b2").await.unwrap();
        assert!(store.backup_if_needed(Path::new("b.txt")).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let (_dir, store) = setup_test();

        let err = store
            .backup_if_needed(Path::new("../outside.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::InvalidPath(_)));

        let err = store.backup_path(Path::new("/etc/passwd")).unwrap_err();
        assert!(matches!(err, BackupError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_clear_without_backups() {
        let (_dir, store) = setup_test();
        assert_eq!(store.clear().await.unwrap(), 0);
    }
}
