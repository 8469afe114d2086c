//! Server state.

use devpilot_core::RepoSession;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// The engine session. Clones share the same repository and settings.
    pub session: RepoSession,
}

impl AppState {
    pub fn new(session: RepoSession) -> Self {
        Self { session }
    }
}
