//! Structured logging for enforcement events
//!
//! Events go through the `log` facade as `message | {json}`. On macOS the
//! backend is the Unified Logging System via `oslog`.

use crate::constants::{
    EVENT_BLOCKLIST_CHANGED, EVENT_ERROR, EVENT_MONITOR_STARTED, EVENT_MONITOR_STOPPED,
    EVENT_STATE_CHANGED, EVENT_TERMINATION,
};
use anyhow::Result;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Log levels for enforcement events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Info,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// How a termination request was delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationKind {
    Graceful,
    Forced,
}

impl TerminationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationKind::Graceful => "graceful",
            TerminationKind::Forced => "forced",
        }
    }
}

/// Install the platform log backend under `subsystem`
pub fn init_backend(subsystem: &str) -> Result<()> {
    if !subsystem.contains('.') {
        anyhow::bail!("Subsystem must be in reverse DNS format (e.g., 'com.example.app')");
    }

    #[cfg(target_os = "macos")]
    {
        let logger = oslog::OsLogger::new(subsystem);
        log::set_boxed_logger(Box::new(logger))
            .map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))?;
        log::set_max_level(log::LevelFilter::Debug);
        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    {
        Err(anyhow::anyhow!("Unified Logging only available on macOS"))
    }
}

/// Emits structured enforcement events
#[derive(Debug, Clone, Default)]
pub struct EventLogger {
    level: LogLevel,
}

impl EventLogger {
    pub fn new(level: LogLevel) -> Self {
        Self { level }
    }

    pub fn log_monitor_started(&self, session_id: &str, interval: Duration) {
        let message = json!({
            "event": EVENT_MONITOR_STARTED,
            "session": session_id,
            "poll_interval_ms": interval.as_millis() as u64,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.log_structured(LogLevel::Info, "Enforcement monitor started", &message);
    }

    pub fn log_monitor_stopped(&self, session_id: &str, cycles: u64) {
        let message = json!({
            "event": EVENT_MONITOR_STOPPED,
            "session": session_id,
            "cycles": cycles,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.log_structured(LogLevel::Info, "Enforcement monitor stopped", &message);
    }

    pub fn log_termination(&self, identifier: &str, pids: &[u32], kind: TerminationKind, delivered: bool) {
        let message = json!({
            "event": EVENT_TERMINATION,
            "identifier": identifier,
            "pids": pids,
            "kind": kind.as_str(),
            "delivered": delivered,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        let level = if delivered { LogLevel::Info } else { LogLevel::Error };
        self.log_structured(level, &format!("Blocking {}", identifier), &message);
    }

    pub fn log_state_change(&self, blocking_enabled: bool, downtime_enabled: bool, enforcing: bool) {
        let message = json!({
            "event": EVENT_STATE_CHANGED,
            "blocking_enabled": blocking_enabled,
            "downtime_enabled": downtime_enabled,
            "enforcing": enforcing,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.log_structured(LogLevel::Info, "Enforcement state changed", &message);
    }

    pub fn log_blocklist_change(&self, action: &str, identifier: &str, size: usize) {
        let message = json!({
            "event": EVENT_BLOCKLIST_CHANGED,
            "action": action,
            "identifier": identifier,
            "blocklist_size": size,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.log_structured(LogLevel::Info, &format!("Blocklist {}: {}", action, identifier), &message);
    }

    pub fn log_error(&self, error_message: &str, context: Option<&str>) {
        let message = json!({
            "event": EVENT_ERROR,
            "message": error_message,
            "context": context,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        self.log_structured(LogLevel::Error, error_message, &message);
    }

    fn log_structured(&self, level: LogLevel, message: &str, data: &serde_json::Value) {
        if !self.should_log(level) {
            return;
        }

        let full_message = format!("{} | {}", message, data);
        match level {
            LogLevel::Error => error!("{}", full_message),
            LogLevel::Info => info!("{}", full_message),
        }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        match (self.level, level) {
            (_, LogLevel::Error) => true,
            (LogLevel::Info, LogLevel::Info) => true,
            (LogLevel::Error, LogLevel::Info) => false,
        }
    }
}
