//! Sync explicitly selected files

use std::sync::Arc;

use super::notify::{report_failure, Notifier};
use crate::source::{build_selected_batch, ProjectSelection};
use crate::sync::{OutputPane, RunControl, RunSummary, SyncSession};

/// Run the selection trigger end to end.
///
/// Returns `None` when there is no active project or the run failed; run
/// failures are reported through `notifier`.
pub async fn sync_selected(
    session: &SyncSession,
    selection: &dyn ProjectSelection,
    pane: Arc<dyn OutputPane>,
    notifier: &dyn Notifier,
    control: &RunControl,
) -> Option<RunSummary> {
    pane.clear();
    pane.activate();

    let batch = build_selected_batch(selection, pane.as_ref())?;
    match session.run(&batch, pane, control).await {
        Ok(summary) => Some(summary),
        Err(e) => {
            report_failure(notifier, &e);
            None
        }
    }
}
