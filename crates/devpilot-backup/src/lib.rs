//! First-overwrite backup store for devpilot.
//!
//! Before the engine overwrites a file it asks the store to keep a copy of
//! the original. Only the first overwrite of a path creates a backup; later
//! overwrites leave it alone, so the backup always holds the content the file
//! had when the current backup epoch started. Backups are plain file copies:
//!
//! ```text
//! <repo>/.devpilot_backups/
//!   src/
//!     main.rs.bak
//!   README.md.bak
//! ```
//!
//! # Example
//!
//! ```no_run
//! use devpilot_backup::BackupStore;
//! use std::path::{Path, PathBuf};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = BackupStore::new("/project/root");
//!
//! // Keep the original before editing
//! store.backup_if_needed(Path::new("src/main.rs")).await?;
//!
//! // ... write the file ...
//!
//! // Put the original back
//! let restored = store.restore(&[PathBuf::from("src/main.rs")]).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod store;

pub use error::{BackupError, BackupResult};
pub use store::{BackupStore, BACKUP_DIR_NAME, BACKUP_SUFFIX};
