//! Enforcement controller
//!
//! The synchronous control surface. Every operation validates its input,
//! updates in-memory state, persists, and reports a typed result; prompting
//! and retry UX belong to the presentation layer.

use crate::error::{EnforcementError, Result};
use crate::logging::EventLogger;
use crate::models::{BlockedApplication, LastKnownState, MonitorState, PersistedState, StatusReport};
use crate::monitor::{Blocklist, MonitorSettings, ProcessMonitor};
use crate::platform::bundle::inspect_bundle;
use crate::platform::{PermissionGate, ProcessDirectory};
use crate::store::PersistentStore;
use crate::vault::CredentialVault;
use std::path::Path;
use std::sync::Arc;

/// Owns the store, vault, blocklist and monitor of one session
pub struct EnforcementController {
    store: PersistentStore,
    /// In-memory copy of the durable record; authoritative if a save fails
    state: PersistedState,
    vault: CredentialVault,
    blocklist: Blocklist,
    monitor: ProcessMonitor,
    permission: Arc<dyn PermissionGate>,
    logger: EventLogger,
    blocking_enabled: bool,
    downtime_enabled: bool,
}

impl EnforcementController {
    /// Load persisted state and prepare an idle monitor.
    ///
    /// Toggles always start off; [`last_known_state`](Self::last_known_state)
    /// tells the caller what the previous session left enabled.
    pub fn new(
        store: PersistentStore,
        directory: Arc<dyn ProcessDirectory>,
        permission: Arc<dyn PermissionGate>,
        settings: MonitorSettings,
        logger: EventLogger,
    ) -> Self {
        let state = store.load();
        let blocklist = Blocklist::new();
        blocklist.publish(state.blocked_apps.keys().cloned());
        let monitor = ProcessMonitor::new(directory, blocklist.clone(), settings, logger.clone());

        Self {
            store,
            state,
            vault: CredentialVault::new(),
            blocklist,
            monitor,
            permission,
            logger,
            blocking_enabled: false,
            downtime_enabled: false,
        }
    }

    // ---- blocklist ----

    /// Validate `path` as an application bundle and add it to the blocklist
    pub fn add_blocked_application(&mut self, path: &Path) -> Result<BlockedApplication> {
        let bundle = inspect_bundle(path)
            .ok_or_else(|| EnforcementError::NotAValidApplication(path.to_path_buf()))?;

        let application = BlockedApplication {
            identifier: bundle.path.to_string_lossy().into_owned(),
            display_name: bundle.display_name,
        };
        self.state
            .blocked_apps
            .insert(application.identifier.clone(), application.display_name.clone());
        self.publish_blocklist();
        self.logger.log_blocklist_change(
            "added",
            &application.identifier,
            self.state.blocked_apps.len(),
        );

        self.persist()?;
        Ok(application)
    }

    /// Remove `identifier`; removing an unknown identifier is not an error
    pub fn remove_blocked_application(&mut self, identifier: &str) -> Result<()> {
        if self.state.blocked_apps.remove(identifier).is_some() {
            self.publish_blocklist();
            self.logger
                .log_blocklist_change("removed", identifier, self.state.blocked_apps.len());
        }
        self.persist()
    }

    pub fn blocked_applications(&self) -> Vec<BlockedApplication> {
        self.state.blocked_applications()
    }

    // ---- enforcement toggles ----

    pub fn set_blocking_enabled(&mut self, enabled: bool, password: &str) -> Result<()> {
        self.authenticate(password)?;

        if enabled {
            self.begin_enforcement()?;
        }
        self.blocking_enabled = enabled;
        self.reconcile_monitor();
        self.record_toggles()
    }

    /// Downtime implies enforcement regardless of the primary toggle
    pub fn set_downtime_mode(&mut self, enabled: bool, password: &str) -> Result<()> {
        self.authenticate(password)?;

        if enabled {
            self.begin_enforcement()?;
        }
        self.downtime_enabled = enabled;
        self.reconcile_monitor();
        self.record_toggles()
    }

    pub fn is_blocking_enabled(&self) -> bool {
        self.blocking_enabled
    }

    pub fn is_downtime_enabled(&self) -> bool {
        self.downtime_enabled
    }

    /// True while either toggle keeps the monitor running
    pub fn is_enforcing(&self) -> bool {
        (self.blocking_enabled || self.downtime_enabled) && self.monitor.is_running()
    }

    pub fn monitor_state(&self) -> MonitorState {
        self.monitor.state()
    }

    pub fn monitor(&self) -> &ProcessMonitor {
        &self.monitor
    }

    pub fn permission_granted(&self) -> bool {
        self.permission.is_granted()
    }

    /// Toggle positions recorded by the previous session
    pub fn last_known_state(&self) -> LastKnownState {
        self.state.last_state
    }

    // ---- password ----

    pub fn has_password(&self) -> bool {
        self.state.has_password()
    }

    /// First-time password setup
    pub fn set_password(&mut self, password: &str, confirmation: &str) -> Result<()> {
        if self.state.has_password() {
            return Err(EnforcementError::InvalidInput(
                "A password is already set; reset it instead".to_string(),
            ));
        }
        validate_new_password(password, confirmation)?;

        let mut vault = CredentialVault::new();
        let salt = vault.set_password(password)?;
        self.install_vault(vault, salt)
    }

    pub fn reset_password(&mut self, current: &str, password: &str, confirmation: &str) -> Result<()> {
        self.authenticate(current)?;
        validate_new_password(password, confirmation)?;

        let mut vault = CredentialVault::new();
        let salt = vault.set_password(password)?;
        self.install_vault(vault, salt)
    }

    /// Whether `password` matches the configured password. Never fails.
    pub fn verify_password(&self, password: &str) -> bool {
        self.verified_vault(password).is_some()
    }

    /// Rehydrate the key after a restart
    pub fn unlock(&mut self, password: &str) -> Result<()> {
        if !self.state.has_password() {
            return Err(EnforcementError::InvalidInput(
                "No password has been set".to_string(),
            ));
        }
        self.authenticate(password)
    }

    pub fn is_unlocked(&self) -> bool {
        self.vault.is_loaded()
    }

    // ---- lifecycle ----

    /// Stop enforcement and erase every persisted setting
    pub fn factory_reset(&mut self, password: &str) -> Result<()> {
        self.authenticate(password)?;

        self.blocking_enabled = false;
        self.downtime_enabled = false;
        self.monitor.wait_idle();

        self.vault.clear();
        self.blocklist.publish(Vec::new());
        self.state = PersistedState::default();
        self.logger.log_state_change(false, false, false);

        self.store.clear()?;
        Ok(())
    }

    /// Record the current toggles for the next session and stop the monitor
    pub fn shutdown(&mut self) -> Result<()> {
        let recorded = self.record_toggles();
        self.monitor.wait_idle();
        recorded
    }

    pub fn tutorial_shown(&self) -> bool {
        self.state.tutorial_shown
    }

    pub fn set_tutorial_shown(&mut self, shown: bool) -> Result<()> {
        self.state.tutorial_shown = shown;
        self.persist()
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            has_password: self.has_password(),
            blocking_enabled: self.blocking_enabled,
            downtime_enabled: self.downtime_enabled,
            enforcing: self.is_enforcing(),
            monitor_state: self.monitor_state(),
            permission_granted: self.permission_granted(),
            tutorial_shown: self.state.tutorial_shown,
            blocked_applications: self.blocked_applications(),
        }
    }

    pub fn state_path(&self) -> &Path {
        self.store.path()
    }

    // ---- internals ----

    /// Verify `password`, loading the key on first use after a restart
    fn authenticate(&mut self, password: &str) -> Result<()> {
        let vault = self
            .verified_vault(password)
            .ok_or(EnforcementError::IncorrectPassword)?;
        if !self.vault.is_loaded() {
            self.vault = vault;
        }
        Ok(())
    }

    /// A vault holding the key for `password`, if it reproduces the persisted
    /// key check. Records without a usable key check never verify.
    fn verified_vault(&self, password: &str) -> Option<CredentialVault> {
        let salt = self.state.salt.as_deref()?;
        let key_check = self.state.key_check.as_deref()?;
        let mut vault = CredentialVault::new();
        vault.unlock(password, salt, key_check).then_some(vault)
    }

    /// Permission is re-checked on every enable; the grant can be revoked
    fn begin_enforcement(&mut self) -> Result<()> {
        if !self.permission.is_granted() {
            self.permission.request_grant();
            return Err(EnforcementError::PermissionRequired);
        }
        self.monitor.start()
    }

    fn reconcile_monitor(&self) {
        if !(self.blocking_enabled || self.downtime_enabled) {
            self.monitor.stop();
        }
        self.logger
            .log_state_change(self.blocking_enabled, self.downtime_enabled, self.is_enforcing());
    }

    fn record_toggles(&mut self) -> Result<()> {
        self.state.downtime_enabled = self.downtime_enabled;
        self.state.last_state = LastKnownState {
            blocking_enabled: self.blocking_enabled,
            downtime_enabled: self.downtime_enabled,
        };
        self.persist()
    }

    fn install_vault(&mut self, vault: CredentialVault, salt: Vec<u8>) -> Result<()> {
        self.state.key_check = vault.key_check();
        self.state.salt = Some(salt);
        self.vault = vault;
        self.persist()
    }

    fn publish_blocklist(&self) {
        self.blocklist.publish(self.state.blocked_apps.keys().cloned());
    }

    fn persist(&self) -> Result<()> {
        self.store.save(&self.state).map_err(|e| {
            self.logger
                .log_error(&format!("Failed to save settings: {}", e), Some("persist"));
            e
        })
    }
}

fn validate_new_password(password: &str, confirmation: &str) -> Result<()> {
    if password.is_empty() {
        return Err(EnforcementError::InvalidInput("Password cannot be empty".to_string()));
    }
    if password != confirmation {
        return Err(EnforcementError::InvalidInput("Passwords do not match".to_string()));
    }
    Ok(())
}
