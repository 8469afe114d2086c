//! Testing utilities and fixtures for devpilot.
//!
//! - **Fixtures**: temporary repositories with files, ignore files and
//!   pre-seeded backups, plus JSON helpers for edit batches
//! - **Assertions**: file, backup and string assertions with readable
//!   failure output
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use devpilot_test_utils::{assertions::assert_backup_equals, TestProject};
//!
//! #[tokio::test]
//! async fn test_apply_takes_backup() {
//!     let project = TestProject::new().with_file("a.txt", "hello").build();
//!
//!     // ... apply an edit to a.txt ...
//!
//!     assert_backup_equals(project.path(), "a.txt", "hello");
//! }
//! ```

pub mod assertions;
pub mod fixtures;

pub use fixtures::{edit_json, BuiltTestProject, TestProject};
