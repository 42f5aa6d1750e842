//! Process directory backed by the live process table
//!
//! Every process is attributed to the outermost `.app` bundle containing its
//! executable; processes outside any bundle are ignored.

use super::bundle::{bundle_identifier, enclosing_bundle};
use super::ProcessDirectory;
use crate::constants::RUN_SUBCOMMAND;
use crate::error::Result;
use crate::models::{ApplicationMetadata, RunningApplication};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, Signal, System, UpdateKind};

/// Bound on how long an application may take to acknowledge an AppleScript quit
#[cfg(target_os = "macos")]
const APPLESCRIPT_TIMEOUT_SECS: u32 = 3;

struct DirectoryState {
    system: System,
    /// bundle path -> CFBundleIdentifier, read once per bundle
    bundle_ids: HashMap<String, Option<String>>,
}

/// [`ProcessDirectory`] over the OS process table
pub struct SystemProcessDirectory {
    state: Mutex<DirectoryState>,
}

impl SystemProcessDirectory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DirectoryState {
                system: System::new(),
                bundle_ids: HashMap::new(),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Send `signal` to every process attributed to `identifier`
    fn signal_bundle(&self, identifier: &str, signal: Signal) -> bool {
        let mut state = self.lock_state();
        refresh_executables(&mut state.system);

        let mut delivered = false;
        for process in state.system.processes().values() {
            let belongs = process
                .exe()
                .and_then(enclosing_bundle)
                .is_some_and(|bundle| bundle == Path::new(identifier));
            if !belongs {
                continue;
            }
            let sent = match process.kill_with(signal) {
                Some(sent) => sent,
                // Signal not supported on this platform
                None if signal == Signal::Kill => process.kill(),
                None => false,
            };
            delivered |= sent;
        }
        delivered
    }

    #[cfg(target_os = "macos")]
    fn quit_via_applescript(&self, identifier: &str) -> bool {
        let bundle_id = {
            let mut state = self.lock_state();
            cached_bundle_id(&mut state.bundle_ids, identifier)
        };
        let Some(bundle_id) = bundle_id.filter(|id| is_plain_bundle_id(id)) else {
            return false;
        };

        std::process::Command::new("osascript")
            .arg("-e")
            .arg(format!("with timeout of {} seconds", APPLESCRIPT_TIMEOUT_SECS))
            .arg("-e")
            .arg(format!("tell application id \"{}\" to quit", bundle_id))
            .arg("-e")
            .arg("end timeout")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

impl Default for SystemProcessDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessDirectory for SystemProcessDirectory {
    fn list(&self) -> Result<Vec<RunningApplication>> {
        let mut guard = self.lock_state();
        let state = &mut *guard;
        refresh_executables(&mut state.system);

        let mut applications: BTreeMap<String, RunningApplication> = BTreeMap::new();
        for (pid, process) in state.system.processes() {
            let Some(executable) = process.exe() else {
                continue; // Skip processes without a known executable
            };
            let Some(bundle) = enclosing_bundle(executable) else {
                continue;
            };
            let identifier = bundle.to_string_lossy().into_owned();

            let entry = applications
                .entry(identifier.clone())
                .or_insert_with(|| RunningApplication {
                    identifier,
                    is_running: true,
                    metadata: ApplicationMetadata::default(),
                });
            entry.metadata.pids.push(pid.as_u32());

            // The bundle's main executable names the application
            if executable.parent() == Some(bundle.join("Contents").join("MacOS").as_path()) {
                entry.metadata.name = process.name().to_string_lossy().into_owned();
            }
        }

        for application in applications.values_mut() {
            application.metadata.pids.sort_unstable();
            if application.metadata.name.is_empty() {
                application.metadata.name = Path::new(&application.identifier)
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
            }
            application.metadata.bundle_id =
                cached_bundle_id(&mut state.bundle_ids, &application.identifier);
        }

        Ok(applications.into_values().collect())
    }

    fn terminate(&self, identifier: &str) -> bool {
        #[cfg(target_os = "macos")]
        if self.quit_via_applescript(identifier) {
            return true;
        }
        self.signal_bundle(identifier, Signal::Term)
    }

    fn force_terminate(&self, identifier: &str) -> bool {
        self.signal_bundle(identifier, Signal::Kill)
    }
}

fn cached_bundle_id(cache: &mut HashMap<String, Option<String>>, identifier: &str) -> Option<String> {
    cache
        .entry(identifier.to_string())
        .or_insert_with(|| bundle_identifier(Path::new(identifier)))
        .clone()
}

/// Reverse-DNS characters only, so the id can be embedded in AppleScript
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn is_plain_bundle_id(bundle_id: &str) -> bool {
    !bundle_id.is_empty()
        && bundle_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
}

fn refresh_executables(system: &mut System) {
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
    );
}

/// PIDs of other processes hosting a long-lived enforcement session
pub fn find_session_pids() -> Vec<u32> {
    let mut system = System::new();
    // Command lines are not part of the default refresh
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
    );

    let current_pid = std::process::id();

    system
        .processes()
        .iter()
        .filter_map(|(pid, process)| {
            let pid_u32 = pid.as_u32();
            if pid_u32 == current_pid {
                return None;
            }

            let cmd = process.cmd();
            let is_ours = cmd
                .first()
                .map(|arg| arg.to_string_lossy().contains(env!("CARGO_PKG_NAME")))
                .unwrap_or(false);
            let is_run = cmd.iter().skip(1).any(|arg| arg.to_string_lossy() == RUN_SUBCOMMAND);

            if is_ours && is_run {
                Some(pid_u32)
            } else {
                None
            }
        })
        .collect()
}
