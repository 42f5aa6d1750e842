#![allow(dead_code)]

use focusguard::logging::{EventLogger, TerminationKind};
use focusguard::models::{ApplicationMetadata, RunningApplication};
use focusguard::monitor::MonitorSettings;
use focusguard::platform::{PermissionGate, ProcessDirectory};
use focusguard::store::PersistentStore;
use focusguard::EnforcementController;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const PASSWORD: &str = "focus123";

/// Process directory double with a scripted set of running applications
#[derive(Default)]
pub struct FakeDirectory {
    running: Mutex<BTreeSet<String>>,
    cycles: AtomicUsize,
    requests: Mutex<Vec<(String, TerminationKind)>>,
    /// When set, a graceful request makes the application exit
    pub obedient: AtomicBool,
}

impl FakeDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn launch(&self, identifier: &str) {
        self.running.lock().unwrap().insert(identifier.to_string());
    }

    pub fn is_running(&self, identifier: &str) -> bool {
        self.running.lock().unwrap().contains(identifier)
    }

    /// Number of `list()` calls, one per poll cycle
    pub fn cycles(&self) -> usize {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, TerminationKind)> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, identifier: &str, kind: TerminationKind) {
        self.requests
            .lock()
            .unwrap()
            .push((identifier.to_string(), kind));
    }
}

impl ProcessDirectory for FakeDirectory {
    fn list(&self) -> focusguard::Result<Vec<RunningApplication>> {
        // Hold the lock across the count so cycles and requests stay in step
        let running = self.running.lock().unwrap();
        self.cycles.fetch_add(1, Ordering::SeqCst);
        Ok(running
            .iter()
            .map(|identifier| RunningApplication {
                identifier: identifier.clone(),
                is_running: true,
                metadata: ApplicationMetadata {
                    name: "fake".to_string(),
                    pids: vec![4242],
                    bundle_id: None,
                },
            })
            .collect())
    }

    fn terminate(&self, identifier: &str) -> bool {
        self.record(identifier, TerminationKind::Graceful);
        if self.obedient.load(Ordering::SeqCst) {
            self.running.lock().unwrap().remove(identifier);
        }
        true
    }

    fn force_terminate(&self, identifier: &str) -> bool {
        self.record(identifier, TerminationKind::Forced);
        self.running.lock().unwrap().remove(identifier);
        true
    }
}

/// Permission gate double
pub struct FakeGate {
    pub granted: AtomicBool,
    pub requests: AtomicUsize,
}

impl FakeGate {
    pub fn new(granted: bool) -> Arc<Self> {
        Arc::new(Self {
            granted: AtomicBool::new(granted),
            requests: AtomicUsize::new(0),
        })
    }
}

impl PermissionGate for FakeGate {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_grant(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Isolated settings file plus a place to create application bundles
pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn state_path(&self) -> PathBuf {
        self.path().join("settings.json")
    }

    pub fn store(&self) -> PersistentStore {
        PersistentStore::new(self.state_path())
    }

    /// Create an empty `<name>.app` bundle directory
    pub fn bundle(&self, name: &str) -> PathBuf {
        let path = self.path().join(format!("{}.app", name));
        fs::create_dir_all(path.join("Contents")).unwrap();
        path
    }

    pub fn controller(
        &self,
        directory: Arc<FakeDirectory>,
        gate: Arc<FakeGate>,
        settings: MonitorSettings,
    ) -> EnforcementController {
        self.controller_with_store(self.store(), directory, gate, settings)
    }

    pub fn controller_with_store(
        &self,
        store: PersistentStore,
        directory: Arc<FakeDirectory>,
        gate: Arc<FakeGate>,
        settings: MonitorSettings,
    ) -> EnforcementController {
        EnforcementController::new(store, directory, gate, settings, EventLogger::default())
    }
}

pub fn fast_settings(grace: Duration) -> MonitorSettings {
    MonitorSettings {
        poll_interval: Duration::from_millis(25),
        quit_grace_period: grace,
    }
}

/// Poll `condition` for up to five seconds
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
