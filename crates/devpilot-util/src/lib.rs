//! Shared utilities for devpilot.
//!
//! This crate provides common utilities used across the devpilot workspace:
//! - Error handling patterns
//! - Logging setup with tracing
//! - Path utilities (platform directories, relative path validation)
//! - RAII-based timing for operation measurement

pub mod error;
pub mod log;
pub mod path;
pub mod timing;

pub use error::{Error, ErrorKind, Result};
pub use timing::TimingGuard;
