//! Configuration Management Module
//!
//! Handles persistent storage of connection profiles and sync settings, and
//! secure credential storage via the system keychain.

pub mod keychain;
pub mod storage;
pub mod types;

pub use keychain::{Keychain, KeychainError};
pub use storage::{config_dir, connections_file, ConfigStorage, StorageError};
pub use types::{ConfigFile, SavedAuth, SavedConnection, SyncSettings, CONFIG_VERSION};
