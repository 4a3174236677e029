//! In-memory remote store, connector and profile source for unit tests

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::session::ProfileSource;
use super::SyncError;
use crate::config::{SavedAuth, SavedConnection};
use crate::sftp::{RemoteConnector, RemoteStore, SftpError};
use crate::ssh::SshError;

pub const HOME: &str = "/home/user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    HomeDir,
    Exists(String),
    CreateDirs(String),
    Upload(String),
    Disconnect,
}

#[derive(Default)]
pub struct MemoryStore {
    host: String,
    dirs: Mutex<HashSet<String>>,
    calls: Mutex<Vec<StoreCall>>,
    fail_all: bool,
    fail_paths: HashSet<String>,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Shared log so tests can see calls from several stores in order
    journal: Option<Arc<Mutex<Vec<String>>>>,
}

impl MemoryStore {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Default::default()
        }
    }

    pub fn fail_all_uploads(mut self) -> Self {
        self.fail_all = true;
        self
    }

    pub fn fail_upload_of(mut self, remote_path: &str) -> Self {
        self.fail_paths.insert(remote_path.to_string());
        self
    }

    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Uploads block until a permit is added to `gate`
    pub fn with_upload_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_existing_dir(self, dir: &str) -> Self {
        self.dirs.lock().insert(dir.to_string());
        self
    }

    pub fn with_journal(mut self, journal: Arc<Mutex<Vec<String>>>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                StoreCall::Upload(p) if !self.fail_all && !self.fail_paths.contains(p) => {
                    Some(p.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn note(&self, entry: String) {
        if let Some(journal) = &self.journal {
            journal.lock().push(entry);
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn host(&self) -> &str {
        &self.host
    }

    async fn home_dir(&self) -> Result<String, SftpError> {
        self.calls.lock().push(StoreCall::HomeDir);
        Ok(HOME.to_string())
    }

    async fn exists(&self, remote_path: &str) -> Result<bool, SftpError> {
        self.calls.lock().push(StoreCall::Exists(remote_path.to_string()));
        Ok(self.dirs.lock().contains(remote_path))
    }

    async fn create_dirs(&self, remote_path: &str) -> Result<(), SftpError> {
        self.calls
            .lock()
            .push(StoreCall::CreateDirs(remote_path.to_string()));
        self.dirs.lock().insert(remote_path.to_string());
        Ok(())
    }

    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<u64, SftpError> {
        self.calls.lock().push(StoreCall::Upload(remote_path.to_string()));
        self.note(format!("start {}", remote_path));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.note(format!("end {}", remote_path));

        if self.fail_all || self.fail_paths.contains(remote_path) {
            return Err(SftpError::PermissionDenied(remote_path.to_string()));
        }
        let bytes = tokio::fs::read(local_path).await?;
        Ok(bytes.len() as u64)
    }

    async fn disconnect(&self) -> Result<(), SftpError> {
        self.calls.lock().push(StoreCall::Disconnect);
        Ok(())
    }
}

/// Hands out a fresh [`MemoryStore`] per connect
pub struct MemoryConnector {
    make: Box<dyn Fn() -> MemoryStore + Send + Sync>,
    stores: Mutex<Vec<Arc<MemoryStore>>>,
    connects: AtomicUsize,
    failures_left: AtomicUsize,
    delay: Option<Duration>,
}

impl MemoryConnector {
    pub fn new(make: impl Fn() -> MemoryStore + Send + Sync + 'static) -> Self {
        Self {
            make: Box::new(make),
            stores: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Every connect takes `delay` before it resolves
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The first `n` connects fail
    pub fn failing_first(self, n: usize) -> Self {
        self.fail_next(n);
        self
    }

    /// The next `n` connects fail
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn stores(&self) -> Vec<Arc<MemoryStore>> {
        self.stores.lock().clone()
    }
}

#[async_trait]
impl RemoteConnector for MemoryConnector {
    async fn connect(&self, _profile: &SavedConnection) -> Result<Arc<dyn RemoteStore>, SftpError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SshError::ConnectionFailed("connection refused".to_string()).into());
        }
        let store = Arc::new((self.make)());
        self.stores.lock().push(store.clone());
        Ok(store)
    }
}

/// Fixed profile list
pub struct StaticProfiles(pub Vec<SavedConnection>);

impl StaticProfiles {
    pub fn one(host: &str) -> Self {
        Self(vec![SavedConnection::new(
            "test",
            host,
            22,
            "user",
            SavedAuth::Key {
                key_path: "/keys/id".to_string(),
                has_passphrase: false,
                passphrase_keychain_id: None,
            },
        )])
    }
}

#[async_trait]
impl ProfileSource for StaticProfiles {
    async fn load_profiles(&self) -> Result<Vec<SavedConnection>, SyncError> {
        Ok(self.0.clone())
    }
}
