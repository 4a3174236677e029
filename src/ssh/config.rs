//! SSH Configuration

use crate::config::{Keychain, KeychainError, SavedAuth, SavedConnection, SyncSettings};

/// SSH connection configuration with secrets resolved
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote host address
    pub host: String,

    /// SSH port (default: 22)
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Authentication method
    pub auth: AuthMethod,

    /// Connection timeout in seconds
    pub timeout_secs: u64,

    /// Strict host key checking
    /// - true: reject connections to unknown hosts
    /// - false: learn unknown hosts, still reject changed keys
    pub strict_host_key_checking: bool,
}

/// Authentication methods supported
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Password authentication
    Password { password: String },

    /// SSH key authentication
    Key {
        /// Path to private key file
        key_path: String,
        /// Optional passphrase for encrypted keys
        passphrase: Option<String>,
    },
}

impl AuthMethod {
    pub fn password(password: impl Into<String>) -> Self {
        Self::Password {
            password: password.into(),
        }
    }

    pub fn key(key_path: impl Into<String>, passphrase: Option<String>) -> Self {
        Self::Key {
            key_path: key_path.into(),
            passphrase,
        }
    }
}

impl SshConfig {
    /// Build a connectable config from a saved profile, pulling secrets out
    /// of the keychain.
    pub fn from_saved(
        conn: &SavedConnection,
        settings: &SyncSettings,
        keychain: &Keychain,
    ) -> Result<Self, KeychainError> {
        let auth = match &conn.auth {
            SavedAuth::Password { keychain_id } => AuthMethod::password(keychain.get(keychain_id)?),
            SavedAuth::Key {
                key_path,
                passphrase_keychain_id,
                ..
            } => {
                let passphrase = match passphrase_keychain_id {
                    Some(id) => Some(keychain.get(id)?),
                    None => None,
                };
                AuthMethod::key(expand_home(key_path), passphrase)
            }
        };

        Ok(Self {
            host: conn.host.clone(),
            port: conn.port,
            username: conn.username.clone(),
            auth,
            timeout_secs: settings.connect_timeout_secs,
            strict_host_key_checking: settings.strict_host_key_checking,
        })
    }
}

/// Expand a leading `~/` in a local key path
fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
        _ => path.to_string(),
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            username: String::new(),
            auth: AuthMethod::Password {
                password: String::new(),
            },
            timeout_secs: 30,
            strict_host_key_checking: false,
        }
    }
}
