//! Repository snapshot and patch application engine for devpilot.
//!
//! This crate holds everything that reads or mutates a working tree:
//! - Settings persistence (schema-tagged JSON with rotated backups)
//! - Ignore resolution (user patterns plus the repo-local `.devpilotignore`)
//! - Snapshot building and the hierarchical tree projection
//! - Diff planning and three-way views for proposed edits
//! - Conflict-aware application of edits with first-overwrite backups
//! - [`RepoSession`], the shared context every operation goes through

pub mod apply;
pub mod config;
pub mod diff;
pub mod edit;
pub mod error;
pub mod ignore;
pub mod plan;
pub mod session;
pub mod snapshot;

pub use apply::{ApplyFailure, ApplyOptions, ApplyReport};
pub use config::{Settings, SettingsStore};
pub use edit::ProposedEdit;
pub use error::{CoreError, CoreResult, SettingsError};
pub use ignore::IgnoreResolver;
pub use plan::{Classification, PlanReport, PlanSummary, ThreeWayView};
pub use session::{FileContent, RepoSession, RevertReport, ScanSummary};
pub use snapshot::{FileMeta, RepoSnapshot, TreeNode};
