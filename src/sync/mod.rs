//! Synchronization engine
//!
//! Uploads a batch of local files to the remote host over one shared
//! session, mirroring each file's path below the batch root into
//! `<remote home>/projects/<project>/`.

pub mod batch;
pub mod control;
pub mod error;
pub mod outcome;
pub mod output;
pub mod path_map;
pub mod pool;
pub mod readiness;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchRoot, FileBatch};
pub use control::RunControl;
pub use error::SyncError;
pub use outcome::{FileReport, RunSummary, UploadOutcome};
pub use output::{ConsoleOutput, MemoryOutput, OutputPane};
pub use path_map::{map_remote_path, MapError, PathMapper, RemoteTarget};
pub use pool::{UploadWorkerPool, MAX_CONCURRENT_UPLOADS};
pub use readiness::{poll_until, PollBudget, ReadinessPoller};
pub use session::{ProfileSource, SyncSession};
