//! Known hosts management for SSH host key verification

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use parking_lot::RwLock;
use russh::keys::{PublicKey, PublicKeyBase64};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::error::SshError;

/// Result of host key verification
#[derive(Debug, Clone, PartialEq)]
pub enum HostKeyVerification {
    /// Key matches known_hosts entry
    Verified,
    /// Host not in known_hosts (first connection)
    Unknown { fingerprint: String },
    /// Key changed from known_hosts entry
    Changed {
        expected_fingerprint: String,
        actual_fingerprint: String,
    },
}

/// Entry in known_hosts: (key_type, base64_key)
#[derive(Clone, Debug, PartialEq)]
struct HostKeyEntry {
    key_type: String,
    key_data: String,
}

/// In-memory view of `~/.ssh/known_hosts`, appended to as hosts are learned
pub struct KnownHostsStore {
    hosts: RwLock<HashMap<String, Vec<HostKeyEntry>>>,
    path: PathBuf,
}

impl Default for KnownHostsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KnownHostsStore {
    /// Load from the default location
    pub fn new() -> Self {
        let path = dirs::home_dir()
            .map(|h| h.join(".ssh").join("known_hosts"))
            .unwrap_or_else(|| PathBuf::from("~/.ssh/known_hosts"));
        Self::with_path(path)
    }

    /// Load from a custom path
    pub fn with_path(path: PathBuf) -> Self {
        let store = Self {
            hosts: RwLock::new(HashMap::new()),
            path,
        };

        match fs::read_to_string(&store.path) {
            Ok(content) => store.load_str(&content),
            Err(e) => debug!("Known hosts file not readable: {}", e),
        }

        store
    }

    fn load_str(&self, content: &str) {
        let mut hosts = self.hosts.write();
        let mut entry_count = 0;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // hostname[,alias] keytype base64key [comment]
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                continue;
            }

            let entry = HostKeyEntry {
                key_type: parts[1].to_string(),
                key_data: parts[2].to_string(),
            };

            for hostname in parts[0].split(',') {
                // Hashed hostnames (|1|...) cannot be matched by name
                if hostname.starts_with('|') {
                    continue;
                }
                hosts
                    .entry(Self::normalize_hostname(hostname))
                    .or_default()
                    .push(entry.clone());
                entry_count += 1;
            }
        }

        debug!(
            "Loaded {} known host entries ({} unique hosts)",
            entry_count,
            hosts.len()
        );
    }

    /// `[host]:port` -> `[host]:port`, `host` -> `host`, lowercased.
    /// Port 22 entries written as `[host]:22` collapse to `host`.
    fn normalize_hostname(host: &str) -> String {
        let lower = host.to_lowercase();
        match lower.strip_prefix('[').and_then(|h| h.split_once("]:")) {
            Some((name, "22")) => name.to_string(),
            Some(_) => lower,
            None => lower.trim_end_matches(']').to_string(),
        }
    }

    /// Lookup key for host:port, in known_hosts notation
    fn make_key(host: &str, port: u16) -> String {
        let host = host.to_lowercase();
        if port == 22 {
            host
        } else {
            format!("[{}]:{}", host, port)
        }
    }

    fn fingerprint_bytes(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!(
            "SHA256:{}",
            BASE64.encode(hasher.finalize()).trim_end_matches('=')
        )
    }

    /// SHA256 fingerprint of a public key, OpenSSH style
    pub fn fingerprint(key: &PublicKey) -> String {
        Self::fingerprint_bytes(&key.public_key_bytes())
    }

    /// Verify a host's public key
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> HostKeyVerification {
        let key_type = key.algorithm().as_str().to_string();
        let key_b64 = BASE64.encode(key.public_key_bytes());
        self.verify_encoded(host, port, &key_type, &key_b64)
    }

    fn verify_encoded(
        &self,
        host: &str,
        port: u16,
        key_type: &str,
        key_b64: &str,
    ) -> HostKeyVerification {
        let lookup_key = Self::make_key(host, port);
        let fingerprint = BASE64
            .decode(key_b64)
            .map(|b| Self::fingerprint_bytes(&b))
            .unwrap_or_else(|_| "unknown".to_string());

        let hosts = self.hosts.read();
        let Some(entries) = hosts.get(&lookup_key) else {
            debug!("Unknown host: {}", lookup_key);
            return HostKeyVerification::Unknown { fingerprint };
        };

        match entries.iter().find(|e| e.key_type == key_type) {
            Some(entry) if entry.key_data == key_b64 => HostKeyVerification::Verified,
            Some(entry) => {
                let expected_fingerprint = BASE64
                    .decode(&entry.key_data)
                    .map(|b| Self::fingerprint_bytes(&b))
                    .unwrap_or_else(|_| "unknown".to_string());
                warn!(
                    "HOST KEY CHANGED for {} (type: {})! Expected {}, got {}",
                    lookup_key, key_type, expected_fingerprint, fingerprint
                );
                HostKeyVerification::Changed {
                    expected_fingerprint,
                    actual_fingerprint: fingerprint,
                }
            }
            // Known host, new key type
            None => HostKeyVerification::Unknown { fingerprint },
        }
    }

    /// Remember a host key and append it to the known_hosts file
    pub fn add_host(&self, host: &str, port: u16, key: &PublicKey) -> Result<(), SshError> {
        let key_type = key.algorithm().as_str().to_string();
        let key_b64 = BASE64.encode(key.public_key_bytes());
        let lookup_key = Self::make_key(host, port);

        self.hosts
            .write()
            .entry(lookup_key.clone())
            .or_default()
            .push(HostKeyEntry {
                key_type: key_type.clone(),
                key_data: key_b64.clone(),
            });

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{} {} {}", lookup_key, key_type, key_b64)?;

        info!("Added host key for {} (type: {})", lookup_key, key_type);
        Ok(())
    }
}

static KNOWN_HOSTS: std::sync::OnceLock<KnownHostsStore> = std::sync::OnceLock::new();

/// Process-wide known hosts store, loaded on first use
pub fn get_known_hosts() -> &'static KnownHostsStore {
    KNOWN_HOSTS.get_or_init(KnownHostsStore::new)
}
