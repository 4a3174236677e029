//! Per-file outcomes and run summaries

use std::path::PathBuf;

pub const NO_FILES_MESSAGE: &str = "No file can be copied";
pub const NO_CONNECTION_MESSAGE: &str =
    "No connection found. Add connection with 'scpsync connection add'";
pub const CONNECTING_MESSAGE: &str = "Connecting...";
pub const CANCELLED_MESSAGE: &str = "Copy cancelled.";

/// Terminal result of one file in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { remote_path: String },
    /// The local file was gone at dispatch time; no network call was made
    SkippedNotFound,
    /// No remote path could be computed for the file
    SkippedMappingUnavailable { reason: String },
    Failed { reason: String },
}

impl UploadOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, Self::Uploaded { .. })
    }
}

/// Outcome of one file together with the completion counter it was reported with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub local_path: PathBuf,
    pub outcome: UploadOutcome,
    /// Position in completion order, 1-based
    pub completed: usize,
    pub total: usize,
}

impl FileReport {
    /// Line written to the output pane for this report
    pub fn line(&self) -> String {
        let local = self.local_path.display();
        match &self.outcome {
            UploadOutcome::Uploaded { remote_path } => {
                format!("[{}/{}] {}", self.completed, self.total, remote_path)
            }
            UploadOutcome::SkippedNotFound => format!("Skip {} (file not exists)", local),
            UploadOutcome::SkippedMappingUnavailable { .. } => {
                format!("Skip {} (no remote mapping)", local)
            }
            UploadOutcome::Failed { reason } => format!("Upload failed: {} ({})", local, reason),
        }
    }
}

/// Aggregate of one synchronization run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    /// Reports in completion order
    pub reports: Vec<FileReport>,
    /// Host the batch was copied to, when a connection was made
    pub host: Option<String>,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record(&mut self, report: FileReport) {
        self.reports.push(report);
    }

    pub fn completed(&self) -> usize {
        self.reports.len()
    }

    pub fn uploaded(&self) -> usize {
        self.count(|o| o.is_uploaded())
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                UploadOutcome::SkippedNotFound | UploadOutcome::SkippedMappingUnavailable { .. }
            )
        })
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UploadOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&UploadOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: UploadOutcome) -> FileReport {
        FileReport {
            local_path: PathBuf::from("/repo/src/a.txt"),
            outcome,
            completed: 3,
            total: 7,
        }
    }

    #[test]
    fn test_report_lines() {
        assert_eq!(
            report(UploadOutcome::Uploaded {
                remote_path: "/h/projects/repo/src/a.txt".to_string()
            })
            .line(),
            "[3/7] /h/projects/repo/src/a.txt"
        );
        assert_eq!(
            report(UploadOutcome::SkippedNotFound).line(),
            "Skip /repo/src/a.txt (file not exists)"
        );
        assert_eq!(
            report(UploadOutcome::SkippedMappingUnavailable {
                reason: "no base".to_string()
            })
            .line(),
            "Skip /repo/src/a.txt (no remote mapping)"
        );
        assert_eq!(
            report(UploadOutcome::failed("Permission denied")).line(),
            "Upload failed: /repo/src/a.txt (Permission denied)"
        );
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::new(3);
        summary.record(report(UploadOutcome::Uploaded {
            remote_path: "/x".to_string(),
        }));
        summary.record(report(UploadOutcome::SkippedNotFound));
        summary.record(report(UploadOutcome::failed("boom")));

        assert_eq!(summary.completed(), 3);
        assert_eq!(summary.uploaded(), 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.failed(), 1);
    }
}
