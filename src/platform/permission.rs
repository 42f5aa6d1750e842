//! Permission gate for managing other applications
//!
//! On macOS quitting other applications through Apple Events requires the
//! user to authorize this process. The check is repeated on every call; a
//! grant can be revoked at any time from System Settings.

use super::PermissionGate;

#[cfg(target_os = "macos")]
const PRIVACY_PANE_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility";

/// [`PermissionGate`] backed by the running OS
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPermissionGate;

impl SystemPermissionGate {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "macos")]
impl PermissionGate for SystemPermissionGate {
    fn is_granted(&self) -> bool {
        // Scripting System Events fails (-1743 / -25211) until the user
        // authorizes this process
        std::process::Command::new("osascript")
            .arg("-e")
            .arg("tell application \"System Events\" to count processes")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn request_grant(&self) {
        if let Err(e) = std::process::Command::new("open").arg(PRIVACY_PANE_URL).spawn() {
            log::error!("Failed to open privacy settings: {}", e);
        }
    }
}

/// Elsewhere signalling processes owned by the same user needs no grant
#[cfg(not(target_os = "macos"))]
impl PermissionGate for SystemPermissionGate {
    fn is_granted(&self) -> bool {
        true
    }

    fn request_grant(&self) {}
}
