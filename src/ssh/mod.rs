//! SSH module - authenticated connections for the SFTP transport
//!
//! - Password and private-key authentication (secrets from the keychain)
//! - Host key verification via ~/.ssh/known_hosts

mod client;
mod config;
mod error;
pub mod known_hosts;

pub use client::{ClientHandler, SshClient};
pub use config::{AuthMethod, SshConfig};
pub use error::SshError;
pub use known_hosts::{get_known_hosts, HostKeyVerification, KnownHostsStore};
