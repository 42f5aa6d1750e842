//! Durable state store
//!
//! A single JSON document under the application-support directory. Loading
//! never fails: a missing, unreadable, or malformed file yields defaults.
//! Saving merges into whatever is on disk and replaces the file atomically.

use crate::constants::{APP_SUPPORT_DIR, STATE_FILE_NAME};
use crate::error::{EnforcementError, Result};
use crate::models::PersistedState;
use log::warn;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// JSON-backed store for [`PersistedState`]
#[derive(Debug)]
pub struct PersistentStore {
    path: PathBuf,
    /// Serializes writers within this process
    writer: Mutex<()>,
}

impl PersistentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    /// Store at the platform application-support location
    pub fn at_default_location() -> Result<Self> {
        Ok(Self::new(default_state_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state, falling back to defaults on any problem
    pub fn load(&self) -> PersistedState {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return PersistedState::default(),
            Err(e) => {
                warn!("Could not read {}: {}; using defaults", self.path.display(), e);
                return PersistedState::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(state) => state,
            Err(e) => {
                warn!("Malformed state file {}: {}; using defaults", self.path.display(), e);
                PersistedState::default()
            }
        }
    }

    /// Persist `state`, preserving unrelated fields already on disk
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        let _guard = self.lock_writer();
        self.write_merged(state)
    }

    /// Read-modify-write under the writer lock
    pub fn update<F>(&self, mutate: F) -> Result<PersistedState>
    where
        F: FnOnce(&mut PersistedState),
    {
        let _guard = self.lock_writer();
        let mut state = self.load();
        mutate(&mut state);
        self.write_merged(&state)?;
        Ok(state)
    }

    /// Remove all persisted data and return the defaults
    pub fn clear(&self) -> Result<PersistedState> {
        let _guard = self.lock_writer();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(PersistedState::default())
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock carries no broken state
        self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_merged(&self, state: &PersistedState) -> Result<()> {
        let mut document = self.read_document();
        match serde_json::to_value(state).map_err(io::Error::from)? {
            Value::Object(fields) => document.extend(fields),
            _ => {
                return Err(EnforcementError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "state did not serialize to an object",
                )))
            }
        }

        let contents = serde_json::to_vec_pretty(&Value::Object(document)).map_err(io::Error::from)?;
        write_atomically(&self.path, &contents)?;
        Ok(())
    }

    /// Raw on-disk document, or an empty one if it is missing or unusable
    fn read_document(&self) -> Map<String, Value> {
        fs::read(&self.path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// `<data_dir>/FocusGuard/settings.json`
pub fn default_state_path() -> Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| {
        EnforcementError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            "no application-support directory for this user",
        ))
    })?;
    Ok(base.join(APP_SUPPORT_DIR).join(STATE_FILE_NAME))
}

/// Write to a sibling temp file, fsync, then rename over `destination`
fn write_atomically(destination: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = destination.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    rename_with_fallback(&temp_path, destination)
}

/// Atomically rename a file, with fallback for platforms where rename fails
/// if the target exists. The temp file is removed if the rename ultimately
/// fails.
fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    if let Err(initial_err) = fs::rename(temp_path, destination) {
        let _ = fs::remove_file(destination);
        fs::rename(temp_path, destination).map_err(|retry_err| {
            let _ = fs::remove_file(temp_path);
            io::Error::new(
                retry_err.kind(),
                format!(
                    "Atomic rename failed (initial: {}, retry: {})",
                    initial_err, retry_err
                ),
            )
        })?;
    }
    Ok(())
}
