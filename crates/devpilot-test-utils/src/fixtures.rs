//! Test fixtures for creating reproducible repositories.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Directory the backup store writes into, relative to the repository root.
pub const BACKUP_DIR: &str = ".devpilot_backups";

/// Name of the repo-local ignore file.
pub const IGNORE_FILE: &str = ".devpilotignore";

/// A temporary repository with a configurable file structure.
///
/// The directory is removed when the built project is dropped.
///
/// # Example
///
/// ```rust
/// use devpilot_test_utils::fixtures::TestProject;
///
/// let project = TestProject::new()
///     .with_file("src/main.rs", "fn main() {}")
///     .with_ignore_file("dist/**\n")
///     .with_dir("empty")
///     .build();
///
/// assert!(project.path().join("src/main.rs").exists());
/// assert!(project.path().join(".devpilotignore").exists());
/// ```
pub struct TestProject {
    temp_dir: TempDir,
    files: BTreeMap<PathBuf, String>,
    dirs: Vec<PathBuf>,
}

impl TestProject {
    /// Create a new test project builder.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            files: BTreeMap::new(),
            dirs: Vec::new(),
        }
    }

    /// Add a file. Parent directories are created automatically.
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.files
            .insert(path.as_ref().to_path_buf(), contents.into());
        self
    }

    /// Add an empty directory.
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.dirs.push(path.as_ref().to_path_buf());
        self
    }

    /// Add a `.devpilotignore` file.
    pub fn with_ignore_file(self, contents: &str) -> Self {
        self.with_file(IGNORE_FILE, contents)
    }

    /// Seed a backup for `path` as if it had already been overwritten once.
    pub fn with_backup(self, path: &str, contents: impl Into<String>) -> Self {
        let backup = Path::new(BACKUP_DIR).join(format!("{path}.bak"));
        self.with_file(backup, contents)
    }

    /// Create all files and directories on disk.
    pub fn build(self) -> BuiltTestProject {
        let root = self.temp_dir.path();

        for dir in &self.dirs {
            let full_path = root.join(dir);
            fs::create_dir_all(&full_path).unwrap_or_else(|e| {
                panic!("Failed to create directory {}: {}", full_path.display(), e)
            });
        }

        for (path, contents) in &self.files {
            let full_path = root.join(path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent).unwrap_or_else(|e| {
                    panic!(
                        "Failed to create parent directory for {}: {}",
                        full_path.display(),
                        e
                    )
                });
            }
            fs::write(&full_path, contents)
                .unwrap_or_else(|e| panic!("Failed to write file {}: {}", full_path.display(), e));
        }

        BuiltTestProject {
            temp_dir: self.temp_dir,
        }
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// A test project whose files exist on disk.
pub struct BuiltTestProject {
    temp_dir: TempDir,
}

impl BuiltTestProject {
    /// Path to the repository root.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Root path as a string, the way callers hand it to `scan`.
    pub fn root_str(&self) -> String {
        self.path().to_string_lossy().into_owned()
    }

    /// Read a file from the project.
    pub fn read_file(&self, path: impl AsRef<Path>) -> String {
        let full_path = self.path().join(path.as_ref());
        fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Failed to read file {}: {}", full_path.display(), e))
    }

    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.path().join(path.as_ref()).exists()
    }

    /// Overwrite a file behind the engine's back.
    pub fn write_file(&self, path: impl AsRef<Path>, contents: impl AsRef<str>) {
        let full_path = self.path().join(path.as_ref());
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).ok();
        }
        fs::write(&full_path, contents.as_ref())
            .unwrap_or_else(|e| panic!("Failed to write file {}: {}", full_path.display(), e));
    }

    pub fn delete_file(&self, path: impl AsRef<Path>) {
        let full_path = self.path().join(path.as_ref());
        fs::remove_file(&full_path)
            .unwrap_or_else(|e| panic!("Failed to delete file {}: {}", full_path.display(), e));
    }

    /// Where the backup of `path` lives.
    pub fn backup_path(&self, path: &str) -> PathBuf {
        self.path().join(BACKUP_DIR).join(format!("{path}.bak"))
    }

    /// Contents of the backup of `path`, if one exists.
    pub fn read_backup(&self, path: &str) -> Option<String> {
        fs::read_to_string(self.backup_path(path)).ok()
    }
}

/// Build one proposed edit as the JSON the engine accepts.
pub fn edit_json(path: &str, content: &str, expected: Option<&str>) -> serde_json::Value {
    let mut edit = serde_json::json!({ "path": path, "content": content });
    if let Some(expected) = expected {
        edit["expectedCurrent"] = serde_json::Value::String(expected.to_string());
    }
    edit
}
