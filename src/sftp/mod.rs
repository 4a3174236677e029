//! SFTP transport
//!
//! Implements the remote store capability the sync engine uploads through.

pub mod error;
pub mod path_utils;
pub mod store;

pub use error::SftpError;
pub use store::{RemoteConnector, RemoteStore, SftpConnector, SftpStore};
