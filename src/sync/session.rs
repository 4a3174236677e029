//! Synchronization session
//!
//! Owns the one remote connection shared by all runs and serializes runs
//! against it. A run connects lazily when no live connection is cached,
//! uploads through the worker pool, disconnects, and then (when pre-warming
//! is enabled) reconnects right away so the next run starts warm. Any
//! run-level failure drops the cached connection so the next run starts
//! from scratch. A cancelled run never pre-warms.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::batch::FileBatch;
use super::control::RunControl;
use super::error::SyncError;
use super::outcome::{
    RunSummary, CANCELLED_MESSAGE, CONNECTING_MESSAGE, NO_CONNECTION_MESSAGE, NO_FILES_MESSAGE,
};
use super::output::OutputPane;
use super::path_map::PathMapper;
use super::pool::{cancel_batch, UploadWorkerPool};
use crate::config::{ConfigStorage, SavedConnection, SyncSettings};
use crate::sftp::{RemoteConnector, RemoteStore};

/// Supplies the configured connection profiles; the first one is used
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn load_profiles(&self) -> Result<Vec<SavedConnection>, SyncError>;
}

#[async_trait]
impl ProfileSource for ConfigStorage {
    async fn load_profiles(&self) -> Result<Vec<SavedConnection>, SyncError> {
        Ok(self.load().await?.connections)
    }
}

/// A connected store and the home directory it resolved
struct LiveSession {
    store: Arc<dyn RemoteStore>,
    remote_root: String,
}

pub struct SyncSession {
    connector: Arc<dyn RemoteConnector>,
    profiles: Arc<dyn ProfileSource>,
    settings: SyncSettings,
    pool: UploadWorkerPool,
    /// Held for the whole run; `None` means disconnected
    live: Mutex<Option<LiveSession>>,
}

impl SyncSession {
    pub fn new(
        connector: Arc<dyn RemoteConnector>,
        profiles: Arc<dyn ProfileSource>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            connector,
            profiles,
            settings,
            pool: UploadWorkerPool::default(),
            live: Mutex::new(None),
        }
    }

    /// Whether a connection is cached for the next run. Waits for a running
    /// run to finish.
    pub async fn is_connected(&self) -> bool {
        self.live.lock().await.is_some()
    }

    /// Synchronize one batch. Concurrent callers queue up behind the run in
    /// progress.
    pub async fn run(
        &self,
        batch: &FileBatch,
        pane: Arc<dyn OutputPane>,
        control: &RunControl,
    ) -> Result<RunSummary, SyncError> {
        let mut live = self.live.lock().await;
        debug!("Sync run started with {} files", batch.len());

        if batch.is_empty() {
            pane.write_line(NO_FILES_MESSAGE);
            return Ok(RunSummary::new(0));
        }

        let result = self.run_locked(&mut live, batch, pane, control).await;
        if let Err(e) = &result {
            error!("Sync run failed: {}", e);
            *live = None;
        }
        result
    }

    async fn run_locked(
        &self,
        live: &mut Option<LiveSession>,
        batch: &FileBatch,
        pane: Arc<dyn OutputPane>,
        control: &RunControl,
    ) -> Result<RunSummary, SyncError> {
        let profiles = self.profiles.load_profiles().await?;
        let Some(profile) = profiles.into_iter().next() else {
            pane.write_line(NO_CONNECTION_MESSAGE);
            return Ok(RunSummary::new(batch.len()));
        };

        pane.write_line(CONNECTING_MESSAGE);
        let session = match live.take() {
            Some(session) => session,
            None => tokio::select! {
                biased;
                _ = control.cancelled() => {
                    info!("Run cancelled while connecting to {}", profile.host);
                    let summary = cancel_batch(batch, pane.as_ref());
                    pane.write_line(CANCELLED_MESSAGE);
                    return Ok(summary);
                }
                established = self.establish(&profile) => established?,
            },
        };

        let mapper = PathMapper::new(session.remote_root.clone(), self.settings.remote_subdir.clone());
        let mut summary = self
            .pool
            .run(batch, session.store.clone(), &mapper, pane.clone(), control)
            .await;

        let host = session.store.host().to_string();
        session.store.disconnect().await?;
        drop(session);

        summary.host = Some(host.clone());
        if control.is_cancelled() {
            pane.write_line(CANCELLED_MESSAGE);
            info!("Copy to {} cancelled", host);
            return Ok(summary);
        }

        pane.write_line(&format!("Copy to {} done.", host));
        info!("Copy to {} done", host);

        if self.settings.prewarm_connection {
            match self.establish(&profile).await {
                Ok(next) => *live = Some(next),
                Err(e) => {
                    warn!("Pre-warming connection failed: {}", e);
                    pane.write_line(&format!("Reconnect for the next run failed: {}", e));
                }
            }
        }

        Ok(summary)
    }

    async fn establish(&self, profile: &SavedConnection) -> Result<LiveSession, SyncError> {
        info!(
            "Connecting to {}@{}:{}",
            profile.username, profile.host, profile.port
        );
        let connect_err = |source| SyncError::Connect {
            host: profile.host.clone(),
            source,
        };

        let store = self.connector.connect(profile).await.map_err(connect_err)?;
        match store.home_dir().await {
            Ok(remote_root) => {
                debug!("Remote root for {} is {}", profile.host, remote_root);
                Ok(LiveSession { store, remote_root })
            }
            Err(e) => {
                if let Err(close_err) = store.disconnect().await {
                    debug!("Disconnect after failed setup: {}", close_err);
                }
                Err(connect_err(e))
            }
        }
    }

    /// Close a cached connection, if any
    pub async fn shutdown(&self) {
        if let Some(session) = self.live.lock().await.take() {
            if let Err(e) = session.store.disconnect().await {
                warn!("Failed to close idle connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::batch::BatchRoot;
    use crate::sync::output::MemoryOutput;
    use crate::sync::testing::{MemoryConnector, MemoryStore, StaticProfiles, StoreCall};
    use parking_lot::Mutex as SyncMutex;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::tempdir;

    fn batch_in(dir: &Path, names: &[&str]) -> FileBatch {
        let files: Vec<PathBuf> = names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, b"data").unwrap();
                path
            })
            .collect();
        FileBatch::new(files, Some(BatchRoot::new(dir, "proj")))
    }

    fn session_with(
        connector: Arc<MemoryConnector>,
        profiles: StaticProfiles,
        prewarm: bool,
    ) -> SyncSession {
        let settings = SyncSettings {
            prewarm_connection: prewarm,
            ..Default::default()
        };
        SyncSession::new(connector, Arc::new(profiles), settings)
    }

    #[tokio::test]
    async fn test_no_profiles_emits_guidance_only() {
        let temp = tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::new(|| MemoryStore::new("h")));
        let session = session_with(connector.clone(), StaticProfiles(Vec::new()), true);
        let pane = Arc::new(MemoryOutput::new());

        session
            .run(&batch_in(temp.path(), &["a"]), pane.clone(), &RunControl::new())
            .await
            .unwrap();

        assert_eq!(pane.lines(), vec![NO_CONNECTION_MESSAGE.to_string()]);
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch_short_circuits() {
        let connector = Arc::new(MemoryConnector::new(|| MemoryStore::new("h")));
        let session = session_with(connector.clone(), StaticProfiles::one("h"), true);
        let pane = Arc::new(MemoryOutput::new());

        let summary = session
            .run(&FileBatch::default(), pane.clone(), &RunControl::new())
            .await
            .unwrap();

        assert_eq!(summary.completed(), 0);
        assert_eq!(pane.lines(), vec![NO_FILES_MESSAGE.to_string()]);
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_run_disconnects_then_prewarms() {
        let temp = tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::new(|| MemoryStore::new("build.lan")));
        let session = session_with(connector.clone(), StaticProfiles::one("build.lan"), true);
        let pane = Arc::new(MemoryOutput::new());

        let summary = session
            .run(&batch_in(temp.path(), &["a", "b"]), pane.clone(), &RunControl::new())
            .await
            .unwrap();

        assert_eq!(summary.uploaded(), 2);
        assert_eq!(summary.host.as_deref(), Some("build.lan"));
        assert_eq!(pane.lines().first().map(String::as_str), Some(CONNECTING_MESSAGE));
        assert_eq!(pane.lines().last().map(String::as_str), Some("Copy to build.lan done."));

        let stores = connector.stores();
        assert_eq!(stores.len(), 2);
        assert_eq!(stores[0].calls().last(), Some(&StoreCall::Disconnect));
        assert_eq!(stores[1].calls(), vec![StoreCall::HomeDir]);
        assert!(session.is_connected().await);

        // The pre-warmed connection serves the next run
        session
            .run(&batch_in(temp.path(), &["c"]), pane, &RunControl::new())
            .await
            .unwrap();
        assert_eq!(connector.connects(), 3);
        assert_eq!(
            connector.stores()[1].uploaded(),
            vec!["/home/user/projects/proj/c".to_string()]
        );
    }

    #[tokio::test]
    async fn test_without_prewarm_session_stays_disconnected() {
        let temp = tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::new(|| MemoryStore::new("h")));
        let session = session_with(connector.clone(), StaticProfiles::one("h"), false);

        session
            .run(
                &batch_in(temp.path(), &["a"]),
                Arc::new(MemoryOutput::new()),
                &RunControl::new(),
            )
            .await
            .unwrap();

        assert_eq!(connector.connects(), 1);
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported_and_next_run_reconnects() {
        let temp = tempdir().unwrap();
        let connector =
            Arc::new(MemoryConnector::new(|| MemoryStore::new("h")).failing_first(1));
        let session = session_with(connector.clone(), StaticProfiles::one("h"), false);
        let batch = batch_in(temp.path(), &["a"]);

        let err = session
            .run(&batch, Arc::new(MemoryOutput::new()), &RunControl::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Connect { ref host, .. } if host == "h"));
        assert!(!session.is_connected().await);

        let summary = session
            .run(&batch, Arc::new(MemoryOutput::new()), &RunControl::new())
            .await
            .unwrap();
        assert_eq!(summary.uploaded(), 1);
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_prewarm_failure_leaves_session_disconnected() {
        let temp = tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::new(|| MemoryStore::new("h")));
        let session = session_with(connector.clone(), StaticProfiles::one("h"), true);
        let pane = Arc::new(MemoryOutput::new());

        session
            .run(&batch_in(temp.path(), &["a"]), pane.clone(), &RunControl::new())
            .await
            .unwrap();
        assert!(session.is_connected().await);

        // The warm connection serves this run, the reconnect afterwards fails
        connector.fail_next(1);
        let summary = session
            .run(&batch_in(temp.path(), &["b"]), pane.clone(), &RunControl::new())
            .await
            .unwrap();

        assert_eq!(summary.uploaded(), 1);
        assert!(!session.is_connected().await);
        assert!(pane
            .lines()
            .last()
            .is_some_and(|l| l.starts_with("Reconnect for the next run failed")));
        assert_eq!(connector.connects(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_runs_do_not_interleave() {
        let temp = tempdir().unwrap();
        let journal = Arc::new(SyncMutex::new(Vec::new()));
        let connector = Arc::new(MemoryConnector::new({
            let journal = journal.clone();
            move || {
                MemoryStore::new("h")
                    .with_journal(journal.clone())
                    .with_upload_delay(Duration::from_millis(5))
            }
        }));
        let session = session_with(connector, StaticProfiles::one("h"), true);

        let first = batch_in(temp.path(), &["a1", "a2", "a3"]);
        let second = batch_in(temp.path(), &["b1", "b2", "b3"]);
        let (c1, c2) = (RunControl::new(), RunControl::new());
        let (r1, r2) = tokio::join!(
            session.run(&first, Arc::new(MemoryOutput::new()), &c1),
            session.run(&second, Arc::new(MemoryOutput::new()), &c2),
        );
        assert_eq!(r1.unwrap().uploaded(), 3);
        assert_eq!(r2.unwrap().uploaded(), 3);

        let journal = journal.lock().clone();
        assert_eq!(journal.len(), 12);
        let first_run = if journal[0].contains("/a") { "/a" } else { "/b" };
        // All six entries of the first run come before any of the second
        assert!(journal[..6].iter().all(|e| e.contains(first_run)));
        assert!(journal[6..].iter().all(|e| !e.contains(first_run)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_upload_skips_done_line_and_prewarm() {
        let temp = tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::new(|| {
            MemoryStore::new("h").with_upload_delay(Duration::from_secs(10))
        }));
        let session = session_with(connector.clone(), StaticProfiles::one("h"), true);
        let pane = Arc::new(MemoryOutput::new());
        let control = RunControl::new();

        let canceller = {
            let control = control.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                control.cancel();
            }
        };
        let batch = batch_in(temp.path(), &["a"]);
        let (result, _) = tokio::join!(session.run(&batch, pane.clone(), &control), canceller);
        let summary = result.unwrap();

        // The upload in flight finishes, nothing reconnects afterwards
        assert_eq!(summary.uploaded(), 1);
        assert_eq!(connector.connects(), 1);
        assert!(!session.is_connected().await);
        assert_eq!(pane.lines().last().map(String::as_str), Some(CANCELLED_MESSAGE));
        assert!(!pane.lines().iter().any(|l| l.ends_with("done.")));
    }

    #[tokio::test]
    async fn test_cancelled_before_connect_makes_no_network_calls() {
        let temp = tempdir().unwrap();
        let connector = Arc::new(MemoryConnector::new(|| MemoryStore::new("h")));
        let session = session_with(connector.clone(), StaticProfiles::one("h"), true);
        let pane = Arc::new(MemoryOutput::new());
        let control = RunControl::new();
        control.cancel();

        let summary = session
            .run(&batch_in(temp.path(), &["a"]), pane.clone(), &control)
            .await
            .unwrap();

        assert_eq!(summary.failed(), 1);
        assert_eq!(connector.connects(), 0);
        assert_eq!(
            pane.lines(),
            vec![
                CONNECTING_MESSAGE.to_string(),
                format!("Upload failed: {} (cancelled)", temp.path().join("a").display()),
                CANCELLED_MESSAGE.to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_connecting_abandons_the_connect() {
        let temp = tempdir().unwrap();
        let connector = Arc::new(
            MemoryConnector::new(|| MemoryStore::new("h"))
                .with_connect_delay(Duration::from_secs(30)),
        );
        let session = session_with(connector.clone(), StaticProfiles::one("h"), true);
        let pane = Arc::new(MemoryOutput::new());
        let control = RunControl::new();

        let canceller = {
            let control = control.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                control.cancel();
            }
        };
        let batch = batch_in(temp.path(), &["a", "b"]);
        let (result, _) = tokio::join!(session.run(&batch, pane.clone(), &control), canceller);
        let summary = result.unwrap();

        assert_eq!(summary.failed(), 2);
        assert!(summary.host.is_none());
        assert!(connector.stores().is_empty());
        assert!(!session.is_connected().await);
        assert_eq!(pane.lines().last().map(String::as_str), Some(CANCELLED_MESSAGE));
    }
}
