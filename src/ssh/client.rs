//! SSH Client implementation using russh

use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Handle};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::PublicKey;
use tracing::{debug, info, warn};

use super::config::{AuthMethod, SshConfig};
use super::error::SshError;
use super::known_hosts::{get_known_hosts, HostKeyVerification};

/// Establishes authenticated SSH connections
pub struct SshClient {
    config: SshConfig,
}

impl SshClient {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Connect and authenticate, returning the live connection handle
    pub async fn connect(self) -> Result<Handle<ClientHandler>, SshError> {
        let addr = (self.config.host.clone(), self.config.port);

        info!("Connecting to SSH server at {}:{}", addr.0, addr.1);

        let ssh_config = client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };

        let handler = ClientHandler::new(
            self.config.host.clone(),
            self.config.port,
            self.config.strict_host_key_checking,
        );

        let mut handle = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            client::connect(Arc::new(ssh_config), addr, handler),
        )
        .await
        .map_err(|_| SshError::Timeout("Connection timed out".to_string()))??;

        debug!("SSH handshake completed");

        let authenticated = match &self.config.auth {
            AuthMethod::Password { password } => handle
                .authenticate_password(&self.config.username, password)
                .await
                .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?,
            AuthMethod::Key {
                key_path,
                passphrase,
            } => {
                let key = russh::keys::load_secret_key(key_path, passphrase.as_deref())
                    .map_err(|e| SshError::KeyError(e.to_string()))?;

                let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), None);

                handle
                    .authenticate_publickey(&self.config.username, key_with_hash)
                    .await
                    .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?
            }
        };

        if !authenticated.success() {
            return Err(SshError::AuthenticationFailed(
                "Authentication rejected by server".to_string(),
            ));
        }

        info!("SSH authentication successful for {}", self.config.host);

        Ok(handle)
    }
}

/// Client handler for russh callbacks; verifies host keys against
/// `~/.ssh/known_hosts`.
pub struct ClientHandler {
    host: String,
    port: u16,
    /// - true: reject unknown/changed keys
    /// - false: learn unknown keys (still reject changed)
    strict: bool,
}

impl ClientHandler {
    pub fn new(host: String, port: u16, strict: bool) -> Self {
        Self { host, port, strict }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let known_hosts = get_known_hosts();

        match known_hosts.verify(&self.host, self.port, server_public_key) {
            HostKeyVerification::Verified => {
                debug!("Host key verified for {}:{}", self.host, self.port);
                Ok(true)
            }
            HostKeyVerification::Unknown { fingerprint } if self.strict => {
                warn!(
                    "Unknown host key for {}:{} (fingerprint: {}). Strict mode enabled, rejecting.",
                    self.host, self.port, fingerprint
                );
                Err(SshError::HostKeyRejected(format!(
                    "unknown host {}:{} with fingerprint {}. Add it to known_hosts or disable strict checking.",
                    self.host, self.port, fingerprint
                )))
            }
            HostKeyVerification::Unknown { fingerprint } => {
                info!(
                    "New host {}:{}, adding to known_hosts (fingerprint: {})",
                    self.host, self.port, fingerprint
                );
                if let Err(e) = known_hosts.add_host(&self.host, self.port, server_public_key) {
                    warn!("Failed to save host key: {}", e);
                }
                Ok(true)
            }
            HostKeyVerification::Changed {
                expected_fingerprint,
                actual_fingerprint,
            } => Err(SshError::HostKeyRejected(format!(
                "key for {}:{} has changed. Expected {}, got {}. \
                 If the change is legitimate, remove the old key from ~/.ssh/known_hosts",
                self.host, self.port, expected_fingerprint, actual_fingerprint
            ))),
        }
    }
}
