//! SFTP Error types

use thiserror::Error;

use crate::config::KeychainError;
use crate::ssh::SshError;

#[derive(Error, Debug)]
pub enum SftpError {
    #[error("SSH error: {0}")]
    Ssh(#[from] SshError),

    #[error("Credential error: {0}")]
    Credentials(#[from] KeychainError),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("SFTP subsystem not available: {0}")]
    SubsystemNotAvailable(String),

    #[error("SFTP protocol error: {0}")]
    ProtocolError(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Write error: {0}")]
    WriteError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SftpError {
    /// Classify a russh-sftp error for the given remote path
    pub fn from_sftp(err: russh_sftp::client::error::Error, path: &str) -> Self {
        let err_str = err.to_string();
        if err_str.contains("No such file") || err_str.contains("not found") {
            SftpError::FileNotFound(path.to_string())
        } else if err_str.contains("Permission denied") {
            SftpError::PermissionDenied(path.to_string())
        } else {
            SftpError::ProtocolError(err_str)
        }
    }
}
