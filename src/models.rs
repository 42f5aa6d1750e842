//! Data models module
//!
//! Defines core data structures:
//! - BlockedApplication: an application subject to enforcement
//! - PersistedState: the durable state record and its on-disk encoding
//! - RunningApplication: one entry of the process directory listing
//! - StatusReport: snapshot rendered by the presentation layer

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// An application on the blocklist
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockedApplication {
    /// Canonical install path of the `.app` bundle
    pub identifier: String,
    /// Human-readable name shown by the presentation layer
    pub display_name: String,
}

/// Toggle positions recorded so a later session can resume them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastKnownState {
    #[serde(default, deserialize_with = "lenient")]
    pub blocking_enabled: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub downtime_enabled: bool,
}

/// Durable state record.
///
/// Every field deserializes leniently: a missing or malformed field takes its
/// default instead of failing the whole document. Fields this version does
/// not know about are kept in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// identifier -> display name
    #[serde(default, deserialize_with = "lenient")]
    pub blocked_apps: BTreeMap<String, String>,
    /// Key-derivation salt, stored as standard base64
    #[serde(default, with = "base64_salt")]
    pub salt: Option<Vec<u8>>,
    /// Base64 tag proving knowledge of the derived key (not the key itself)
    #[serde(default, deserialize_with = "lenient")]
    pub key_check: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub downtime_enabled: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub tutorial_shown: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub last_state: LastKnownState,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PersistedState {
    /// True once a password has been set up
    pub fn has_password(&self) -> bool {
        self.salt.is_some()
    }

    /// Blocklist as a sorted list of applications
    pub fn blocked_applications(&self) -> Vec<BlockedApplication> {
        self.blocked_apps
            .iter()
            .map(|(identifier, display_name)| BlockedApplication {
                identifier: identifier.clone(),
                display_name: display_name.clone(),
            })
            .collect()
    }
}

/// Metadata reported alongside a running application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationMetadata {
    /// Process name of the main executable
    pub name: String,
    /// Every PID currently attributed to the bundle
    pub pids: Vec<u32>,
    /// `CFBundleIdentifier`, when the bundle declares one
    pub bundle_id: Option<String>,
}

/// One entry of the process directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningApplication {
    /// Stable identifier, comparable against the blocklist
    pub identifier: String,
    pub is_running: bool,
    pub metadata: ApplicationMetadata,
}

/// Monitor lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Running,
}

/// Controller snapshot for rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub has_password: bool,
    pub blocking_enabled: bool,
    pub downtime_enabled: bool,
    pub enforcing: bool,
    pub monitor_state: MonitorState,
    pub permission_granted: bool,
    pub tutorial_shown: bool,
    pub blocked_applications: Vec<BlockedApplication>,
}

/// Deserialize a field, falling back to its default when the stored value
/// has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

mod base64_salt {
    use super::*;

    pub fn serialize<S>(salt: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match salt {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(text) => STANDARD
                .decode(text.trim())
                .ok()
                .filter(|bytes| !bytes.is_empty()),
            _ => None,
        })
    }
}
