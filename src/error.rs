//! Error taxonomy for the enforcement core
//!
//! Every control operation returns one of these. Messages never include
//! password material.

use std::path::PathBuf;
use thiserror::Error;

/// Typed failure reasons surfaced by the control plane
#[derive(Debug, Error)]
pub enum EnforcementError {
    /// Empty password, mismatched confirmation, or an operation that is not
    /// valid in the current state
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The path does not point at an installed application bundle
    #[error("not a valid application: {}", .0.display())]
    NotAValidApplication(PathBuf),

    /// The OS has not granted the capability to manage other applications
    #[error("permission required to manage other applications")]
    PermissionRequired,

    /// Password verification failed
    #[error("incorrect password")]
    IncorrectPassword,

    /// Unrecoverable filesystem failure while persisting state
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Per-cycle enumeration or termination failure inside the monitor.
    /// Logged and recovered; never returned by the controller.
    #[error("monitor error: {0}")]
    TransientMonitor(String),
}

pub type Result<T> = std::result::Result<T, EnforcementError>;
