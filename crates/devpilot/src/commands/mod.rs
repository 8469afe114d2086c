//! Command handlers for the devpilot CLI.

pub mod edit;
pub mod logging;
pub mod serve;

pub use edit::*;
pub use logging::*;
pub use serve::*;
