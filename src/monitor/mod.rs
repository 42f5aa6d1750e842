//! Process monitor
//!
//! A cancellable polling loop that keeps blocked applications from running.
//! Each session owns one OS thread; the loop checks its session flag once
//! per iteration boundary.

pub mod blocklist;
pub mod escalation;
pub mod polling;

pub use blocklist::Blocklist;
pub use polling::{run_cycle, CycleReport};

use crate::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_QUIT_GRACE_PERIOD};
use crate::error::Result;
use crate::logging::EventLogger;
use crate::models::MonitorState;
use crate::platform::ProcessDirectory;
use polling::PollLoop;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use uuid::Uuid;

/// Timing knobs for the polling loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    /// How long graceful quits are repeated before forcing termination
    pub quit_grace_period: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            quit_grace_period: DEFAULT_QUIT_GRACE_PERIOD,
        }
    }
}

struct MonitorSession {
    id: Uuid,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Owns the polling thread and its lifecycle
pub struct ProcessMonitor {
    directory: Arc<dyn ProcessDirectory>,
    blocklist: Blocklist,
    settings: MonitorSettings,
    logger: EventLogger,
    session: Mutex<Option<MonitorSession>>,
    /// Stopped sessions whose threads may still be finishing a cycle
    departing: Mutex<Vec<JoinHandle<()>>>,
    active_loops: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ProcessMonitor {
    pub fn new(
        directory: Arc<dyn ProcessDirectory>,
        blocklist: Blocklist,
        settings: MonitorSettings,
        logger: EventLogger,
    ) -> Self {
        Self {
            directory,
            blocklist,
            settings,
            logger,
            session: Mutex::new(None),
            departing: Mutex::new(Vec::new()),
            active_loops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Idle -> Running. No-op when already running.
    pub fn start(&self) -> Result<()> {
        let mut session = lock(&self.session);

        if let Some(current) = session.as_ref() {
            if !current.handle.is_finished() {
                return Ok(());
            }
        }
        // A session whose thread died is reaped before starting over
        if let Some(finished) = session.take() {
            self.reap(finished.handle);
        }

        // Never let a new loop overlap one that is still winding down
        self.join_departing();

        let id = Uuid::new_v4();
        let running = Arc::new(AtomicBool::new(true));
        let worker = PollLoop {
            directory: Arc::clone(&self.directory),
            blocklist: self.blocklist.clone(),
            settings: self.settings,
            logger: self.logger.clone(),
            running: Arc::clone(&running),
            active_loops: Arc::clone(&self.active_loops),
            session_id: id.to_string(),
        };

        let handle = thread::Builder::new()
            .name("focusguard-monitor".to_string())
            .spawn(move || worker.run())?;

        *session = Some(MonitorSession { id, running, handle });
        Ok(())
    }

    /// Running -> Idle. Safe to call when idle; the loop exits at its next
    /// iteration boundary without this call waiting for it.
    pub fn stop(&self) {
        let stopped = lock(&self.session).take();
        if let Some(session) = stopped {
            session.running.store(false, Ordering::SeqCst);
            session.handle.thread().unpark();
            lock(&self.departing).push(session.handle);
        }
    }

    /// Stop and block until every loop thread has exited
    pub fn wait_idle(&self) {
        self.stop();
        self.join_departing();
    }

    pub fn state(&self) -> MonitorState {
        match lock(&self.session).as_ref() {
            Some(session) if !session.handle.is_finished() => MonitorState::Running,
            _ => MonitorState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    /// Number of polling loops currently alive
    pub fn active_loops(&self) -> usize {
        self.active_loops.load(Ordering::SeqCst)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        lock(&self.session).as_ref().map(|session| session.id)
    }

    pub fn settings(&self) -> MonitorSettings {
        self.settings
    }

    fn join_departing(&self) {
        let handles: Vec<JoinHandle<()>> = lock(&self.departing).drain(..).collect();
        for handle in handles {
            self.reap(handle);
        }
    }

    fn reap(&self, handle: JoinHandle<()>) {
        if handle.join().is_err() {
            self.logger
                .log_error("Monitor thread terminated abnormally", Some("monitor"));
        }
    }
}

impl Drop for ProcessMonitor {
    fn drop(&mut self) {
        self.wait_idle();
    }
}
