use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Change source unavailable: {0}")]
    Unavailable(String),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
