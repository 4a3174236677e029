//! Keychain Integration
//!
//! Passwords and key passphrases referenced by saved connections are kept in
//! the system keychain through the `keyring` crate, never in the config file.

use keyring::Entry;
use uuid::Uuid;

/// Service name for keychain entries
const SERVICE_NAME: &str = "com.scpsync.ssh";

/// Keychain errors
#[derive(Debug, thiserror::Error)]
pub enum KeychainError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Secret not found for ID: {0}")]
    NotFound(String),
}

/// Keychain access for connection secrets
#[derive(Debug, Clone)]
pub struct Keychain {
    service: String,
}

impl Keychain {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Create with custom service name (for testing)
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Generate a new unique keychain ID
    pub fn generate_id() -> String {
        format!("scpsync-{}", Uuid::new_v4())
    }

    // Username-prefixed account keeps the keychain identity stable on macOS
    fn entry(&self, id: &str) -> Result<Entry, KeychainError> {
        let username = whoami::username();
        Ok(Entry::new(&self.service, &format!("{}@{}", username, id))?)
    }

    /// Store a secret under `id`, overwriting any previous value
    pub fn store(&self, id: &str, secret: &str) -> Result<(), KeychainError> {
        tracing::debug!("Keychain store: service={}, id={}", self.service, id);
        self.entry(id)?.set_password(secret).map_err(|e| {
            tracing::error!("Keychain store failed: id={}, error={:?}", id, e);
            KeychainError::Keyring(e)
        })
    }

    /// Store a new secret and return its generated ID
    pub fn store_new(&self, secret: &str) -> Result<String, KeychainError> {
        let id = Self::generate_id();
        self.store(&id, secret)?;
        Ok(id)
    }

    /// Retrieve a secret
    pub fn get(&self, id: &str) -> Result<String, KeychainError> {
        match self.entry(id)?.get_password() {
            Ok(secret) => Ok(secret),
            Err(keyring::Error::NoEntry) => {
                tracing::warn!("Keychain get: no entry for id={}", id);
                Err(KeychainError::NotFound(id.to_string()))
            }
            Err(e) => Err(KeychainError::Keyring(e)),
        }
    }

    /// Delete a secret; deleting a missing secret is not an error
    pub fn delete(&self, id: &str) -> Result<(), KeychainError> {
        match self.entry(id)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::Keyring(e)),
        }
    }
}

impl Default for Keychain {
    fn default() -> Self {
        Self::new()
    }
}
