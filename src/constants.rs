//! Global constants for focusguard
//!
//! Centralized location for application-wide constants

use std::time::Duration;

/// Application subsystem identifier for macOS Unified Logging System
pub const APP_SUBSYSTEM: &str = "com.focusguard.enforcer";

/// Directory name under the platform data directory
/// (`~/Library/Application Support` on macOS)
pub const APP_SUPPORT_DIR: &str = "FocusGuard";

/// Durable state file name
pub const STATE_FILE_NAME: &str = "settings.json";

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Subcommand that hosts a long-lived enforcement session
pub const RUN_SUBCOMMAND: &str = "run";

/// Environment variable consulted before prompting for a password
pub const PASSWORD_ENV_VAR: &str = "FOCUSGUARD_PASSWORD";

/// Environment variable holding the new password for set/reset
pub const NEW_PASSWORD_ENV_VAR: &str = "FOCUSGUARD_NEW_PASSWORD";

/// Default monitor poll period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default time an application gets to honour a graceful quit
/// before the monitor escalates to forced termination
pub const DEFAULT_QUIT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Polling interval bounds in seconds
pub const POLLING_INTERVAL_MIN: f64 = 0.1;
pub const POLLING_INTERVAL_MAX: f64 = 300.0;

/// Upper bound for the quit grace period in seconds
pub const QUIT_GRACE_PERIOD_MAX: f64 = 300.0;

/// PBKDF2-HMAC-SHA256 iteration count
pub const KEY_DERIVATION_ITERATIONS: u32 = 100_000;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes
pub const KEY_LEN: usize = 32;

/// Domain label authenticated by the persisted key check
pub const KEY_CHECK_LABEL: &[u8] = b"focusguard/key-check/v1";

/// Structured log event names
pub const EVENT_MONITOR_STARTED: &str = "monitor_started";
pub const EVENT_MONITOR_STOPPED: &str = "monitor_stopped";
pub const EVENT_TERMINATION: &str = "termination_requested";
pub const EVENT_STATE_CHANGED: &str = "enforcement_state_changed";
pub const EVENT_BLOCKLIST_CHANGED: &str = "blocklist_changed";
pub const EVENT_ERROR: &str = "error";
