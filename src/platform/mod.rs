//! Platform capabilities consumed by the enforcement core
//!
//! The monitor and controller only talk to the OS through these two traits,
//! so tests can substitute deterministic doubles.

pub mod bundle;
pub mod permission;
pub mod system;

use crate::error::Result;
use crate::models::RunningApplication;

pub use permission::SystemPermissionGate;
pub use system::SystemProcessDirectory;

/// Enumerates running applications and requests their termination
pub trait ProcessDirectory: Send + Sync {
    /// Currently known applications, one entry per identifier
    fn list(&self) -> Result<Vec<RunningApplication>>;

    /// Ask the application to quit. Returns whether the request was delivered.
    fn terminate(&self, identifier: &str) -> bool;

    /// Kill the application outright. Defaults to a plain termination request
    /// for directories with no stronger mechanism.
    fn force_terminate(&self, identifier: &str) -> bool {
        self.terminate(identifier)
    }
}

/// OS authorization to enumerate and terminate other applications
pub trait PermissionGate: Send + Sync {
    fn is_granted(&self) -> bool;

    /// Start the platform's permission-request flow. Returns immediately;
    /// the user grants asynchronously.
    fn request_grant(&self);
}
