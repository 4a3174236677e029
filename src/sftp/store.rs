//! Remote store capability and its SFTP implementation
//!
//! The sync engine only needs four remote operations (home directory,
//! directory existence, recursive mkdir, file upload) plus a connect /
//! disconnect lifecycle. [`RemoteStore`] and [`RemoteConnector`] describe that
//! capability; [`SftpStore`] and [`SftpConnector`] provide it over russh.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::Handle;
use russh::Disconnect;
use russh_sftp::client::SftpSession as RusshSftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::error::SftpError;
use super::path_utils::remote_ancestors;
use crate::config::{Keychain, SavedConnection, SyncSettings};
use crate::ssh::{ClientHandler, SshClient, SshConfig, SshError};

/// One live connection to a remote filesystem.
///
/// Every call may block on network I/O and may fail independently. Calls
/// are issued concurrently from several upload tasks.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Host address this store is connected to
    fn host(&self) -> &str;

    /// Absolute path of the login user's home directory
    async fn home_dir(&self) -> Result<String, SftpError>;

    async fn exists(&self, remote_path: &str) -> Result<bool, SftpError>;

    /// Create `remote_path` and any missing parents
    async fn create_dirs(&self, remote_path: &str) -> Result<(), SftpError>;

    /// Copy a local file to `remote_path`, replacing it. Returns bytes written.
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<u64, SftpError>;

    async fn disconnect(&self) -> Result<(), SftpError>;
}

/// Opens [`RemoteStore`] sessions for a connection profile
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, profile: &SavedConnection) -> Result<Arc<dyn RemoteStore>, SftpError>;
}

/// SFTP session over a dedicated SSH connection
pub struct SftpStore {
    host: String,
    handle: Handle<ClientHandler>,
    sftp: RusshSftpSession,
}

impl SftpStore {
    /// Open the SFTP subsystem on an authenticated connection
    pub async fn open(host: String, handle: Handle<ClientHandler>) -> Result<Self, SftpError> {
        info!("Opening SFTP subsystem on {}", host);

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| SftpError::ChannelError(e.to_string()))?;

        channel.request_subsystem(true, "sftp").await.map_err(|e| {
            SftpError::SubsystemNotAvailable(format!("Failed to request SFTP subsystem: {}", e))
        })?;

        let sftp = RusshSftpSession::new(channel.into_stream())
            .await
            .map_err(|e| SftpError::SubsystemNotAvailable(e.to_string()))?;

        Ok(Self { host, handle, sftp })
    }
}

#[async_trait]
impl RemoteStore for SftpStore {
    fn host(&self) -> &str {
        &self.host
    }

    async fn home_dir(&self) -> Result<String, SftpError> {
        // SFTP servers start in the login directory
        self.sftp
            .canonicalize(".")
            .await
            .map_err(|e| SftpError::from_sftp(e, "."))
    }

    async fn exists(&self, remote_path: &str) -> Result<bool, SftpError> {
        self.sftp
            .try_exists(remote_path)
            .await
            .map_err(|e| SftpError::from_sftp(e, remote_path))
    }

    async fn create_dirs(&self, remote_path: &str) -> Result<(), SftpError> {
        for dir in remote_ancestors(remote_path) {
            if self.exists(&dir).await? {
                continue;
            }
            debug!("Creating directory: {}", dir);
            if let Err(e) = self.sftp.create_dir(dir.as_str()).await {
                // A sibling upload may have created it first
                if !self.exists(&dir).await? {
                    return Err(SftpError::from_sftp(e, &dir));
                }
            }
        }
        Ok(())
    }

    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<u64, SftpError> {
        let mut local = tokio::fs::File::open(local_path).await?;

        let mut remote = self
            .sftp
            .open_with_flags(
                remote_path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| SftpError::from_sftp(e, remote_path))?;

        let written = tokio::io::copy(&mut local, &mut remote)
            .await
            .map_err(|e| SftpError::WriteError(format!("{}: {}", remote_path, e)))?;

        remote
            .shutdown()
            .await
            .map_err(|e| SftpError::WriteError(format!("Failed to close {}: {}", remote_path, e)))?;

        debug!("Uploaded {} bytes to {}", written, remote_path);
        Ok(written)
    }

    async fn disconnect(&self) -> Result<(), SftpError> {
        if let Err(e) = self.sftp.close().await {
            warn!("Failed to close SFTP session cleanly: {}", e);
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(SshError::from)?;
        info!("Disconnected from {}", self.host);
        Ok(())
    }
}

/// Connects profiles over SSH and opens an [`SftpStore`]
pub struct SftpConnector {
    settings: SyncSettings,
    keychain: Keychain,
}

impl SftpConnector {
    pub fn new(settings: SyncSettings, keychain: Keychain) -> Self {
        Self { settings, keychain }
    }
}

#[async_trait]
impl RemoteConnector for SftpConnector {
    async fn connect(&self, profile: &SavedConnection) -> Result<Arc<dyn RemoteStore>, SftpError> {
        let config = SshConfig::from_saved(profile, &self.settings, &self.keychain)?;
        let handle = SshClient::new(config).connect().await?;
        let store = SftpStore::open(profile.host.clone(), handle).await?;
        Ok(Arc::new(store))
    }
}
