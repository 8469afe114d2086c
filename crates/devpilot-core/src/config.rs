//! Persistent engine settings.
//!
//! Settings live in `settings.json` inside the devpilot configuration
//! directory. Every save rotates the previous file into `settings.json.bak`
//! and that one into `settings.json.bak2`. A file that fails to parse is
//! renamed to `settings.bad.json` and defaults are used instead.

use crate::error::{SettingsError, SettingsResult};
use crate::ignore::DEFAULT_IGNORE_PATTERNS;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Current settings schema version.
pub const SCHEMA_VERSION: u32 = 1;

const SETTINGS_FILE: &str = "settings.json";
const BACKUP_FILE: &str = "settings.json.bak";
const BACKUP2_FILE: &str = "settings.json.bak2";
const QUARANTINE_FILE: &str = "settings.bad.json";

/// Engine settings.
///
/// Unknown keys are preserved in `extra` so that front-ends can store their
/// own preferences next to the engine's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version, always [`SCHEMA_VERSION`] once loaded.
    #[serde(rename = "_schema", default = "schema_version")]
    pub schema: u32,

    /// User ignore patterns applied to every scan.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Whether selecting a repository root starts a fresh backup epoch.
    #[serde(default = "default_true")]
    pub clear_backups_on_scan: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_true() -> bool {
    true
}

/// The built-in ignore patterns as owned strings.
pub fn default_ignore_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema: SCHEMA_VERSION,
            ignore_patterns: default_ignore_patterns(),
            clear_backups_on_scan: true,
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Merge a JSON object into these settings.
    ///
    /// Nested objects merge key by key; any other value replaces the
    /// existing one. The result must still deserialize into [`Settings`].
    pub fn merged_with(&self, patch: Value) -> SettingsResult<Self> {
        if !patch.is_object() {
            return Err(SettingsError::InvalidJson {
                path: "<patch>".to_string(),
                message: "settings patch must be a JSON object".to_string(),
            });
        }
        let mut base = serde_json::to_value(self)?;
        deep_merge(&mut base, patch);
        let mut merged: Settings =
            serde_json::from_value(base).map_err(|e| SettingsError::InvalidJson {
                path: "<patch>".to_string(),
                message: e.to_string(),
            })?;
        merged.schema = SCHEMA_VERSION;
        Ok(merged)
    }
}

/// Recursively merge `overlay` into `base`.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value);
                    }
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Reads and writes [`Settings`] in a directory.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create a store in the platform configuration directory
    /// (honours `DEVPILOT_CONFIG_DIR`).
    pub fn default_location() -> SettingsResult<Self> {
        devpilot_util::path::config_dir()
            .map(Self::new)
            .ok_or_else(|| {
                SettingsError::InvalidPath("Could not determine config directory".to_string())
            })
    }

    /// Directory holding the settings files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the live settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Load settings, falling back to defaults.
    ///
    /// Never fails: a missing file yields defaults, and an unreadable one is
    /// quarantined before defaults are returned.
    pub async fn load(&self) -> Settings {
        match self.try_load().await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!(dir = %self.dir.display(), "No settings file, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(
                    path = %self.settings_path().display(),
                    error = %e,
                    "Settings file is unreadable, using defaults"
                );
                self.quarantine().await;
                Settings::default()
            }
        }
    }

    async fn try_load(&self) -> SettingsResult<Option<Settings>> {
        let path = self.settings_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SettingsError::Io(e)),
        };

        let invalid = |message: String| SettingsError::InvalidJson {
            path: path.display().to_string(),
            message,
        };

        let data: Value = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        if !data.is_object() {
            return Err(invalid("settings must be a JSON object".to_string()));
        }
        if data.get("_schema").and_then(Value::as_u64) != Some(u64::from(SCHEMA_VERSION)) {
            debug!(path = %path.display(), "Migrating settings to schema {}", SCHEMA_VERSION);
        }

        let mut merged = serde_json::to_value(Settings::default())?;
        deep_merge(&mut merged, data);
        let mut settings: Settings =
            serde_json::from_value(merged).map_err(|e| invalid(e.to_string()))?;
        settings.schema = SCHEMA_VERSION;
        Ok(Some(settings))
    }

    async fn quarantine(&self) {
        let path = self.settings_path();
        let bad = self.dir.join(QUARANTINE_FILE);
        if let Err(e) = fs::rename(&path, &bad).await {
            debug!(error = %e, "Could not quarantine settings file");
        } else {
            info!(path = %bad.display(), "Moved unreadable settings aside");
        }
    }

    /// Save settings, rotating the two previous versions.
    ///
    /// The new content is written to a temporary file first so a failed
    /// serialization or write leaves the existing files untouched.
    pub async fn save(&self, settings: &Settings) -> SettingsResult<()> {
        fs::create_dir_all(&self.dir).await?;

        let mut settings = settings.clone();
        settings.schema = SCHEMA_VERSION;
        let content = serde_json::to_string_pretty(&settings)?;

        let path = self.settings_path();
        let temp_path = self.dir.join(format!("{SETTINGS_FILE}.tmp"));
        fs::write(&temp_path, &content).await?;

        let bak1 = self.dir.join(BACKUP_FILE);
        let bak2 = self.dir.join(BACKUP2_FILE);
        if fs::try_exists(&bak1).await? {
            if fs::try_exists(&bak2).await? {
                fs::remove_file(&bak2).await?;
            }
            fs::rename(&bak1, &bak2).await?;
        }
        if fs::try_exists(&path).await? {
            fs::rename(&path, &bak1).await?;
        }
        fs::rename(&temp_path, &path).await?;

        info!("Saved settings to {}", path.display());
        Ok(())
    }
}
