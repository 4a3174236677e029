//! Configuration file types
//!
//! The on-disk format is a single JSON document holding the connection
//! profiles and the synchronization settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current config file version
pub const CONFIG_VERSION: u32 = 1;

/// Root of `connections.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Format version, checked on load
    pub version: u32,

    /// Saved connection profiles; the first one is the active profile
    #[serde(default)]
    pub connections: Vec<SavedConnection>,

    /// Synchronization settings
    #[serde(default)]
    pub sync: SyncSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            connections: Vec::new(),
            sync: SyncSettings::default(),
        }
    }
}

impl ConfigFile {
    /// The profile every run connects with
    pub fn active_connection(&self) -> Option<&SavedConnection> {
        self.connections.first()
    }

    /// Remove a connection by id, returning it if it existed
    pub fn remove_connection(&mut self, id: &str) -> Option<SavedConnection> {
        let idx = self.connections.iter().position(|c| c.id == id)?;
        Some(self.connections.remove(idx))
    }
}

/// A saved remote host profile. Secrets live in the keychain and are only
/// referenced here by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedConnection {
    pub id: String,

    /// Display name
    pub name: String,

    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    pub auth: SavedAuth,

    pub created_at: DateTime<Utc>,
}

impl SavedConnection {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        auth: SavedAuth,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            host: host.into(),
            port,
            username: username.into(),
            auth,
            created_at: Utc::now(),
        }
    }
}

/// Saved authentication reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SavedAuth {
    /// Password stored in the system keychain
    Password { keychain_id: String },

    /// Private key on disk, passphrase optionally in the keychain
    Key {
        key_path: String,
        #[serde(default)]
        has_passphrase: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passphrase_keychain_id: Option<String>,
    },
}

/// Settings that shape a synchronization run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Reconnect right after a run so the next one starts warm
    pub prewarm_connection: bool,

    /// Directory under the remote home that holds the projects
    pub remote_subdir: String,

    /// Reject hosts missing from known_hosts instead of learning them
    pub strict_host_key_checking: bool,

    pub connect_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            prewarm_connection: true,
            remote_subdir: "projects".to_string(),
            strict_host_key_checking: false,
            connect_timeout_secs: 30,
        }
    }
}

fn default_port() -> u16 {
    22
}
