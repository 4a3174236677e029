//! Sync all locally changed files
//!
//! Waits for the change source to settle, collects the changed files, roots
//! them at their repository and hands the batch to the session.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::notify::{report_failure, Notifier};
use crate::source::{find_repo_root, ChangeSource};
use crate::sync::outcome::CANCELLED_MESSAGE;
use crate::sync::{
    poll_until, BatchRoot, FileBatch, OutputPane, PollBudget, ReadinessPoller, RunControl,
    RunSummary, SyncError, SyncSession,
};

/// Run the change trigger end to end.
///
/// Failures are reported through `notifier` and the source is reset so the
/// next trigger discovers it again. Returns the summary of a run that got as
/// far as the session; a trigger cancelled while waiting for the change list
/// returns `None` without notifying.
pub async fn sync_changes(
    session: &SyncSession,
    source: &dyn ChangeSource,
    pane: Arc<dyn OutputPane>,
    notifier: &dyn Notifier,
    control: &RunControl,
) -> Option<RunSummary> {
    pane.clear();
    pane.activate();

    match collect_and_run(session, source, pane, control).await {
        Ok(summary) => summary,
        Err(e) => {
            source.reset();
            report_failure(notifier, &e);
            None
        }
    }
}

async fn collect_and_run(
    session: &SyncSession,
    source: &dyn ChangeSource,
    pane: Arc<dyn OutputPane>,
    control: &RunControl,
) -> Result<Option<RunSummary>, SyncError> {
    let files = tokio::select! {
        biased;
        _ = control.cancelled() => {
            info!("Cancelled while waiting for the change list");
            pane.write_line(CANCELLED_MESSAGE);
            return Ok(None);
        }
        files = wait_for_changes(source) => files?,
    };

    let root = files
        .first()
        .and_then(|file| find_repo_root(file))
        .map(BatchRoot::from_dir);
    info!(
        "{} changed files under {}",
        files.len(),
        root.as_ref()
            .map(|r| r.dir.display().to_string())
            .unwrap_or_else(|| "no repository".to_string())
    );

    let summary = session.run(&FileBatch::new(files, root), pane, control).await?;
    Ok(Some(summary))
}

async fn wait_for_changes(source: &dyn ChangeSource) -> Result<Vec<PathBuf>, SyncError> {
    if !poll_until(PollBudget::SURFACE, || source.is_available()).await {
        return Err(SyncError::Readiness("the change view".to_string()));
    }

    let settled =
        poll_until(PollBudget::NOT_BUSY, || async move { !source.is_busy().await }).await;
    if !settled {
        debug!("Change view still busy, reading it anyway");
    }

    if !poll_until(PollBudget::CHANGE_LIST, || source.has_change_list()).await {
        return Err(SyncError::Readiness("the change list".to_string()));
    }

    let files = ReadinessPoller::new(PollBudget::CHANGES)
        .poll_value(|| async move {
            match source.changed_files().await {
                Ok(files) if files.is_empty() => None,
                other => Some(other),
            }
        })
        .await
        .unwrap_or_else(|| Ok(Vec::new()))?;
    Ok(files)
}
