//! HTTP server for the devpilot engine.
//!
//! Exposes a [`RepoSession`](devpilot_core::RepoSession) as a JSON API for
//! the desktop front-end: repository scanning and tree views, edit planning,
//! apply/revert, ignore patterns, settings and backups.

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
