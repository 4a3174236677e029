//! Run-level error type
//!
//! Only failures that abort a whole run end up here. Per-file problems are
//! reported as [`UploadOutcome`](super::UploadOutcome) values instead.

use thiserror::Error;

use crate::config::StorageError;
use crate::sftp::SftpError;
use crate::source::SourceError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to load connection profiles: {0}")]
    Config(#[from] StorageError),

    #[error("Failed to connect to {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: SftpError,
    },

    #[error("Remote session error: {0}")]
    Remote(#[from] SftpError),

    #[error("Selection source error: {0}")]
    Source(#[from] SourceError),

    #[error("Timed out waiting for {0}")]
    Readiness(String),
}
