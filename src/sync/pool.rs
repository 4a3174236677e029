//! Bounded-concurrency upload pool
//!
//! Every file in a batch becomes its own task. An admission semaphore keeps
//! at most [`MAX_CONCURRENT_UPLOADS`] tasks in flight; the dispatcher waits for a free
//! slot before spawning the next one and joins all of them before returning.
//! Each task ends in exactly one [`UploadOutcome`], reported as soon as it is
//! known. Failures stay local to their file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::batch::FileBatch;
use super::control::RunControl;
use super::outcome::{FileReport, RunSummary, UploadOutcome, NO_FILES_MESSAGE};
use super::output::OutputPane;
use super::path_map::{MapError, PathMapper, RemoteTarget};
use crate::sftp::{RemoteStore, SftpError};

/// Upload tasks in flight at once
pub const MAX_CONCURRENT_UPLOADS: usize = 8;

/// Failure reason of files never dispatched because the run was cancelled
pub const CANCELLED_REASON: &str = "cancelled";

/// Shared by all tasks of one run
struct RunContext {
    store: Arc<dyn RemoteStore>,
    pane: Arc<dyn OutputPane>,
    completed: AtomicUsize,
    total: usize,
}

impl RunContext {
    /// Count a terminal outcome and report it
    fn finish(&self, local_path: PathBuf, outcome: UploadOutcome) -> FileReport {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let report = FileReport {
            local_path,
            outcome,
            completed,
            total: self.total,
        };
        self.pane.write_line(&report.line());
        report
    }
}

pub struct UploadWorkerPool {
    max_concurrency: usize,
}

impl Default for UploadWorkerPool {
    fn default() -> Self {
        Self::new(MAX_CONCURRENT_UPLOADS)
    }
}

impl UploadWorkerPool {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Upload every file of `batch` through `store`.
    ///
    /// Returns once every file has reached a terminal outcome; the summary
    /// then holds exactly `batch.len()` reports.
    pub async fn run(
        &self,
        batch: &FileBatch,
        store: Arc<dyn RemoteStore>,
        mapper: &PathMapper,
        pane: Arc<dyn OutputPane>,
        control: &RunControl,
    ) -> RunSummary {
        let total = batch.len();
        let mut summary = RunSummary::new(total);
        if batch.is_empty() {
            pane.write_line(NO_FILES_MESSAGE);
            return summary;
        }

        info!(
            "Uploading {} files to {} ({} at a time)",
            total,
            store.host(),
            self.max_concurrency
        );

        let ctx = Arc::new(RunContext {
            store,
            pane,
            completed: AtomicUsize::new(0),
            total,
        });
        let gate = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = Vec::with_capacity(total);

        for local in batch.files() {
            let permit = match gate.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let outcome = UploadOutcome::failed("admission gate closed");
                    summary.record(ctx.finish(local.clone(), outcome));
                    continue;
                }
            };

            if control.is_cancelled() {
                summary.record(ctx.finish(local.clone(), UploadOutcome::failed(CANCELLED_REASON)));
                continue;
            }

            let target = match batch.root() {
                Some(root) => mapper.map(local, &root.dir, &root.name),
                None => Err(MapError::NoBase),
            };

            let task_ctx = ctx.clone();
            let task_local = local.clone();
            let handle = tokio::spawn(async move {
                let outcome = process_file(&task_local, target, task_ctx.store.as_ref()).await;
                drop(permit);
                task_ctx.finish(task_local, outcome)
            });
            tasks.push((local.clone(), handle));
        }

        let (locals, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        for (local, joined) in locals.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(report) => summary.record(report),
                Err(e) => {
                    warn!("Upload task for {} aborted: {}", local.display(), e);
                    summary.record(ctx.finish(local, UploadOutcome::failed(e.to_string())));
                }
            }
        }

        info!(
            "Run finished: {} uploaded, {} skipped, {} failed",
            summary.uploaded(),
            summary.skipped(),
            summary.failed()
        );
        summary
    }
}

/// Report every file of `batch` as cancelled without touching the network
pub fn cancel_batch(batch: &FileBatch, pane: &dyn OutputPane) -> RunSummary {
    let total = batch.len();
    let mut summary = RunSummary::new(total);
    for (idx, local) in batch.files().iter().enumerate() {
        let report = FileReport {
            local_path: local.clone(),
            outcome: UploadOutcome::failed(CANCELLED_REASON),
            completed: idx + 1,
            total,
        };
        pane.write_line(&report.line());
        summary.record(report);
    }
    summary
}

async fn process_file(
    local: &Path,
    target: Result<RemoteTarget, MapError>,
    store: &dyn RemoteStore,
) -> UploadOutcome {
    match tokio::fs::metadata(local).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            debug!("Skipping {}: not a regular file", local.display());
            return UploadOutcome::SkippedNotFound;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Skipping {}: not found", local.display());
            return UploadOutcome::SkippedNotFound;
        }
        Err(e) => {
            warn!("Cannot read {}: {}", local.display(), e);
            return UploadOutcome::failed(e.to_string());
        }
    }

    let target = match target {
        Ok(target) => target,
        Err(e) => {
            warn!("No remote mapping for {}: {}", local.display(), e);
            return UploadOutcome::SkippedMappingUnavailable {
                reason: e.to_string(),
            };
        }
    };

    match upload(local, &target, store).await {
        Ok(bytes) => {
            debug!("{} -> {} ({} bytes)", local.display(), target.file_path, bytes);
            UploadOutcome::Uploaded {
                remote_path: target.file_path,
            }
        }
        Err(e) => {
            warn!("Upload of {} failed: {}", local.display(), e);
            UploadOutcome::failed(e.to_string())
        }
    }
}

async fn upload(
    local: &Path,
    target: &RemoteTarget,
    store: &dyn RemoteStore,
) -> Result<u64, SftpError> {
    if !store.exists(&target.parent_dir).await? {
        store.create_dirs(&target.parent_dir).await?;
    }
    store.upload_file(local, &target.file_path).await
}
