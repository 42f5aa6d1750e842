use super::blocklist::Blocklist;
use super::escalation::QuitEscalation;
use super::MonitorSettings;
use crate::logging::{EventLogger, TerminationKind};
use crate::platform::ProcessDirectory;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Outcome of one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Blocked applications found running
    pub matched: usize,
    /// Termination requests issued (one per matched application)
    pub requests: usize,
    /// Requests the directory could not deliver
    pub failures: usize,
}

/// Enumerate running applications once and issue one termination request
/// per running blocked application.
///
/// Errors are logged and swallowed; the caller's loop always continues.
pub fn run_cycle(
    directory: &dyn ProcessDirectory,
    blocklist: &BTreeSet<String>,
    escalation: &mut QuitEscalation,
    logger: &EventLogger,
) -> CycleReport {
    let mut report = CycleReport::default();

    if blocklist.is_empty() {
        escalation.retain_targeted(&HashSet::new());
        return report;
    }

    let applications = match directory.list() {
        Ok(applications) => applications,
        Err(e) => {
            logger.log_error(&format!("Failed to enumerate applications: {}", e), Some("poll_cycle"));
            return report;
        }
    };

    let now = Instant::now();
    let mut targeted = HashSet::new();

    for application in &applications {
        if !application.is_running || !blocklist.contains(&application.identifier) {
            continue;
        }
        // A directory may list the same identifier twice; request once
        if !targeted.insert(application.identifier.clone()) {
            continue;
        }

        report.matched += 1;
        let kind = escalation.next_request(&application.identifier, now);
        let delivered = match kind {
            TerminationKind::Graceful => directory.terminate(&application.identifier),
            TerminationKind::Forced => directory.force_terminate(&application.identifier),
        };
        report.requests += 1;
        if !delivered {
            report.failures += 1;
        }

        logger.log_termination(&application.identifier, &application.metadata.pids, kind, delivered);
    }

    escalation.retain_targeted(&targeted);
    report
}

/// Body of one monitor session's thread
pub(super) struct PollLoop {
    pub directory: Arc<dyn ProcessDirectory>,
    pub blocklist: Blocklist,
    pub settings: MonitorSettings,
    pub logger: EventLogger,
    pub running: Arc<AtomicBool>,
    pub active_loops: Arc<AtomicUsize>,
    pub session_id: String,
}

/// Keeps the live-loop count accurate even if a cycle panics
struct ActiveLoop(Arc<AtomicUsize>);

impl ActiveLoop {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveLoop {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PollLoop {
    pub fn run(self) {
        let _active = ActiveLoop::enter(&self.active_loops);
        self.logger
            .log_monitor_started(&self.session_id, self.settings.poll_interval);

        let mut escalation = QuitEscalation::new(self.settings.quit_grace_period);
        let mut cycles: u64 = 0;

        while self.running.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();

            // Fresh snapshot every cycle so blocklist edits apply immediately
            let snapshot = self.blocklist.snapshot();
            run_cycle(self.directory.as_ref(), &snapshot, &mut escalation, &self.logger);
            cycles += 1;

            // Sleep out the rest of the interval; stop() unparks early
            let deadline = cycle_start + self.settings.poll_interval;
            while self.running.load(Ordering::SeqCst) {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                std::thread::park_timeout(deadline - now);
            }
        }

        self.logger.log_monitor_stopped(&self.session_id, cycles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EnforcementError, Result};
    use crate::models::{ApplicationMetadata, RunningApplication};
    use std::sync::Mutex;
    use std::time::Duration;

    const GAMES: &str = "/Applications/Games.app";
    const NOTES: &str = "/Applications/Notes.app";

    #[derive(Default)]
    struct ScriptedDirectory {
        running: Vec<RunningApplication>,
        fail_listing: bool,
        deliver: bool,
        requests: Mutex<Vec<(String, TerminationKind)>>,
    }

    impl ScriptedDirectory {
        fn with_running(identifiers: &[&str]) -> Self {
            Self {
                running: identifiers.iter().map(|id| app(id, true)).collect(),
                deliver: true,
                ..Default::default()
            }
        }

        fn requests(&self) -> Vec<(String, TerminationKind)> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn app(identifier: &str, is_running: bool) -> RunningApplication {
        RunningApplication {
            identifier: identifier.to_string(),
            is_running,
            metadata: ApplicationMetadata {
                name: "test".to_string(),
                pids: vec![100],
                bundle_id: None,
            },
        }
    }

    impl ProcessDirectory for ScriptedDirectory {
        fn list(&self) -> Result<Vec<RunningApplication>> {
            if self.fail_listing {
                return Err(EnforcementError::TransientMonitor("listing failed".into()));
            }
            Ok(self.running.clone())
        }

        fn terminate(&self, identifier: &str) -> bool {
            self.requests
                .lock()
                .unwrap()
                .push((identifier.to_string(), TerminationKind::Graceful));
            self.deliver
        }

        fn force_terminate(&self, identifier: &str) -> bool {
            self.requests
                .lock()
                .unwrap()
                .push((identifier.to_string(), TerminationKind::Forced));
            self.deliver
        }
    }

    fn blocklist(identifiers: &[&str]) -> BTreeSet<String> {
        identifiers.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_matching_application_gets_one_request() {
        let directory = ScriptedDirectory::with_running(&[GAMES, NOTES]);
        let mut escalation = QuitEscalation::new(Duration::from_secs(5));

        let report = run_cycle(&directory, &blocklist(&[GAMES]), &mut escalation, &EventLogger::default());

        assert_eq!(report, CycleReport { matched: 1, requests: 1, failures: 0 });
        assert_eq!(directory.requests(), vec![(GAMES.to_string(), TerminationKind::Graceful)]);
    }

    #[test]
    fn test_duplicate_listing_still_one_request() {
        let directory = ScriptedDirectory::with_running(&[GAMES, GAMES]);
        let mut escalation = QuitEscalation::new(Duration::from_secs(5));

        let report = run_cycle(&directory, &blocklist(&[GAMES]), &mut escalation, &EventLogger::default());
        assert_eq!(report.requests, 1);
    }

    #[test]
    fn test_not_running_entries_are_ignored() {
        let mut directory = ScriptedDirectory::with_running(&[]);
        directory.running = vec![app(GAMES, false)];
        let mut escalation = QuitEscalation::new(Duration::from_secs(5));

        let report = run_cycle(&directory, &blocklist(&[GAMES]), &mut escalation, &EventLogger::default());
        assert_eq!(report.requests, 0);
        assert!(directory.requests().is_empty());
    }

    #[test]
    fn test_listing_failure_is_swallowed() {
        let mut directory = ScriptedDirectory::with_running(&[GAMES]);
        directory.fail_listing = true;
        let mut escalation = QuitEscalation::new(Duration::from_secs(5));

        let report = run_cycle(&directory, &blocklist(&[GAMES]), &mut escalation, &EventLogger::default());
        assert_eq!(report, CycleReport::default());
    }

    #[test]
    fn test_undelivered_request_counts_as_failure() {
        let mut directory = ScriptedDirectory::with_running(&[GAMES]);
        directory.deliver = false;
        let mut escalation = QuitEscalation::new(Duration::from_secs(5));

        let report = run_cycle(&directory, &blocklist(&[GAMES]), &mut escalation, &EventLogger::default());
        assert_eq!(report.failures, 1);
    }

    #[test]
    fn test_zero_grace_period_forces_termination() {
        let directory = ScriptedDirectory::with_running(&[GAMES]);
        let mut escalation = QuitEscalation::new(Duration::ZERO);

        run_cycle(&directory, &blocklist(&[GAMES]), &mut escalation, &EventLogger::default());
        assert_eq!(directory.requests(), vec![(GAMES.to_string(), TerminationKind::Forced)]);
    }

    #[test]
    fn test_empty_blocklist_skips_enumeration() {
        let mut directory = ScriptedDirectory::with_running(&[GAMES]);
        directory.fail_listing = true;
        let mut escalation = QuitEscalation::new(Duration::from_secs(5));

        let report = run_cycle(&directory, &BTreeSet::new(), &mut escalation, &EventLogger::default());
        assert_eq!(report, CycleReport::default());
    }
}
