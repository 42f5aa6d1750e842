//! Output formatting module
//!
//! Handles:
//! - Human-readable status output
//! - JSON status output for scripting
//! - One-line messages for control operation results

use anyhow::Result;
use focusguard::models::{LastKnownState, MonitorState, StatusReport};
use serde::Serialize;

/// Everything `status` reports
#[derive(Debug, Clone, Serialize)]
pub struct StatusOutput {
    #[serde(flatten)]
    pub report: StatusReport,
    /// Toggles recorded by the most recent session
    pub last_state: LastKnownState,
    /// PIDs of running enforcement sessions
    pub sessions: Vec<u32>,
    pub state_path: String,
}

pub fn format_status_json(status: &StatusOutput) -> Result<String> {
    Ok(serde_json::to_string_pretty(status)?)
}

pub fn format_status_human(status: &StatusOutput) -> String {
    let report = &status.report;
    let mut lines = Vec::new();

    lines.push(format!("Password:          {}", if report.has_password { "set" } else { "not set" }));
    lines.push(format!("Permission:        {}", if report.permission_granted { "granted" } else { "required" }));

    if status.sessions.is_empty() {
        lines.push("Session:           not running".to_string());
    } else {
        let pids: Vec<String> = status.sessions.iter().map(u32::to_string).collect();
        lines.push(format!("Session:           running (PID {})", pids.join(", ")));
    }

    if report.monitor_state == MonitorState::Running {
        lines.push(format!("Blocking:          {}", on_off(report.blocking_enabled)));
        lines.push(format!("Downtime:          {}", on_off(report.downtime_enabled)));
        lines.push(format!("Enforcing:         {}", if report.enforcing { "yes" } else { "no" }));
    } else {
        lines.push(format!(
            "Last session:      blocking {}, downtime {}",
            on_off(status.last_state.blocking_enabled),
            on_off(status.last_state.downtime_enabled)
        ));
    }
    lines.push(format!("Settings file:     {}", status.state_path));

    lines.push(String::new());
    lines.push(format_blocklist(report));
    lines.join("\n")
}

pub fn format_blocklist(report: &StatusReport) -> String {
    if report.blocked_applications.is_empty() {
        return "No blocked applications.".to_string();
    }

    let mut out = format!("Blocked applications ({}):", report.blocked_applications.len());
    for application in &report.blocked_applications {
        out.push_str(&format!("\n  {}\n    {}", application.display_name, application.identifier));
    }
    out
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use focusguard::models::BlockedApplication;

    fn sample(monitor_state: MonitorState) -> StatusOutput {
        StatusOutput {
            report: StatusReport {
                has_password: true,
                blocking_enabled: true,
                downtime_enabled: false,
                enforcing: monitor_state == MonitorState::Running,
                monitor_state,
                permission_granted: true,
                tutorial_shown: true,
                blocked_applications: vec![BlockedApplication {
                    identifier: "/Applications/Games.app".to_string(),
                    display_name: "Games".to_string(),
                }],
            },
            last_state: LastKnownState {
                blocking_enabled: true,
                downtime_enabled: false,
            },
            sessions: vec![],
            state_path: "/tmp/settings.json".to_string(),
        }
    }

    #[test]
    fn test_human_lists_blocked_applications() {
        let text = format_status_human(&sample(MonitorState::Idle));
        assert!(text.contains("Password:          set"));
        assert!(text.contains("Session:           not running"));
        assert!(text.contains("Last session:      blocking on, downtime off"));
        assert!(text.contains("Blocked applications (1):"));
        assert!(text.contains("/Applications/Games.app"));
    }

    #[test]
    fn test_human_shows_live_toggles_while_running() {
        let text = format_status_human(&sample(MonitorState::Running));
        assert!(text.contains("Enforcing:         yes"));
        assert!(!text.contains("Last session"));
    }

    #[test]
    fn test_json_flattens_report() {
        let json = format_status_json(&sample(MonitorState::Idle)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["has_password"], true);
        assert_eq!(value["monitor_state"], "idle");
        assert_eq!(value["blocked_applications"][0]["display_name"], "Games");
        assert_eq!(value["last_state"]["blocking_enabled"], true);
    }

    #[test]
    fn test_empty_blocklist() {
        let mut status = sample(MonitorState::Idle);
        status.report.blocked_applications.clear();
        assert_eq!(format_blocklist(&status.report), "No blocked applications.");
    }
}
