//! Connection profile management
//!
//! Adds, lists and removes saved profiles. Secrets go to the system keychain;
//! the profile only keeps the keychain id.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{ConfigStorage, Keychain, SavedAuth, SavedConnection};

/// Authentication chosen when adding a profile
#[derive(Debug, Clone)]
pub enum AuthRequest {
    Password(String),
    Key {
        key_path: String,
        passphrase: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct AddConnectionRequest {
    pub name: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthRequest,
    /// Put the new profile first so it becomes the active one
    pub make_active: bool,
}

/// Profile as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth_type: String,
    pub active: bool,
}

impl ConnectionInfo {
    fn from_saved(conn: &SavedConnection, active: bool) -> Self {
        let auth_type = match &conn.auth {
            SavedAuth::Password { .. } => "password",
            SavedAuth::Key { .. } => "key",
        };
        Self {
            id: conn.id.clone(),
            name: conn.name.clone(),
            host: conn.host.clone(),
            port: conn.port,
            username: conn.username.clone(),
            auth_type: auth_type.to_string(),
            active,
        }
    }
}

pub async fn add_connection(
    storage: &ConfigStorage,
    keychain: &Keychain,
    request: AddConnectionRequest,
) -> Result<ConnectionInfo, String> {
    let mut config = storage.load().await.map_err(|e| e.to_string())?;

    let auth = match request.auth {
        AuthRequest::Password(password) => {
            let keychain_id = keychain.store_new(&password).map_err(|e| e.to_string())?;
            SavedAuth::Password { keychain_id }
        }
        AuthRequest::Key {
            key_path,
            passphrase,
        } => {
            let passphrase_keychain_id = passphrase
                .as_deref()
                .map(|p| keychain.store_new(p))
                .transpose()
                .map_err(|e| e.to_string())?;
            SavedAuth::Key {
                key_path,
                has_passphrase: passphrase_keychain_id.is_some(),
                passphrase_keychain_id,
            }
        }
    };

    let name = request
        .name
        .unwrap_or_else(|| format!("{}@{}", request.username, request.host));
    let conn = SavedConnection::new(name, request.host, request.port, request.username, auth);

    if request.make_active {
        config.connections.insert(0, conn.clone());
    } else {
        config.connections.push(conn.clone());
    }
    storage.save(&config).await.map_err(|e| e.to_string())?;

    let active = config
        .active_connection()
        .is_some_and(|c| c.id == conn.id);
    info!("Saved connection {} ({})", conn.name, conn.id);
    Ok(ConnectionInfo::from_saved(&conn, active))
}

pub async fn list_connections(storage: &ConfigStorage) -> Result<Vec<ConnectionInfo>, String> {
    let config = storage.load().await.map_err(|e| e.to_string())?;
    Ok(config
        .connections
        .iter()
        .enumerate()
        .map(|(i, c)| ConnectionInfo::from_saved(c, i == 0))
        .collect())
}

/// Remove a profile and the keychain entries it references
pub async fn remove_connection(
    storage: &ConfigStorage,
    keychain: &Keychain,
    id: &str,
) -> Result<ConnectionInfo, String> {
    let mut config = storage.load().await.map_err(|e| e.to_string())?;
    let was_active = config.active_connection().is_some_and(|c| c.id == id);
    let conn = config
        .remove_connection(id)
        .ok_or_else(|| format!("Connection not found: {}", id))?;

    let secret = match &conn.auth {
        SavedAuth::Password { keychain_id } => Some(keychain_id),
        SavedAuth::Key {
            passphrase_keychain_id,
            ..
        } => passphrase_keychain_id.as_ref(),
    };
    if let Some(keychain_id) = secret {
        if let Err(e) = keychain.delete(keychain_id) {
            warn!("Failed to delete keychain entry {}: {}", keychain_id, e);
        }
    }

    storage.save(&config).await.map_err(|e| e.to_string())?;
    info!("Removed connection {} ({})", conn.name, conn.id);
    Ok(ConnectionInfo::from_saved(&conn, was_active))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key_request(host: &str, make_active: bool) -> AddConnectionRequest {
        AddConnectionRequest {
            name: None,
            host: host.to_string(),
            port: 22,
            username: "me".to_string(),
            auth: AuthRequest::Key {
                key_path: "~/.ssh/id_ed25519".to_string(),
                passphrase: None,
            },
            make_active,
        }
    }

    #[tokio::test]
    async fn test_add_list_remove() {
        let temp = tempdir().unwrap();
        let storage = ConfigStorage::with_path(temp.path().join("connections.json"));
        let keychain = Keychain::new();

        let first = add_connection(&storage, &keychain, key_request("a.lan", false))
            .await
            .unwrap();
        assert!(first.active);
        assert_eq!(first.name, "me@a.lan");
        assert_eq!(first.auth_type, "key");

        let second = add_connection(&storage, &keychain, key_request("b.lan", false))
            .await
            .unwrap();
        assert!(!second.active);

        let listed = list_connections(&storage).await.unwrap();
        let hosts: Vec<_> = listed.iter().map(|c| c.host.as_str()).collect();
        assert_eq!(hosts, vec!["a.lan", "b.lan"]);

        let removed = remove_connection(&storage, &keychain, &first.id)
            .await
            .unwrap();
        assert!(removed.active);

        let listed = list_connections(&storage).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].active);
        assert_eq!(listed[0].host, "b.lan");
    }

    #[tokio::test]
    async fn test_make_active_inserts_first() {
        let temp = tempdir().unwrap();
        let storage = ConfigStorage::with_path(temp.path().join("connections.json"));
        let keychain = Keychain::new();

        add_connection(&storage, &keychain, key_request("a.lan", false))
            .await
            .unwrap();
        let info = add_connection(&storage, &keychain, key_request("b.lan", true))
            .await
            .unwrap();

        assert!(info.active);
        let config = storage.load().await.unwrap();
        assert_eq!(config.active_connection().map(|c| c.host.as_str()), Some("b.lan"));
    }

    #[tokio::test]
    async fn test_remove_unknown_id() {
        let temp = tempdir().unwrap();
        let storage = ConfigStorage::with_path(temp.path().join("connections.json"));

        let err = remove_connection(&storage, &Keychain::new(), "nope")
            .await
            .unwrap_err();
        assert!(err.contains("not found"));
    }
}
