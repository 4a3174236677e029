//! Commands module
//!
//! The user-facing actions: the two sync triggers and profile management.

pub mod connection;
pub mod notify;
pub mod sync_changes;
pub mod sync_selected;

pub use connection::{
    add_connection, list_connections, remove_connection, AddConnectionRequest, AuthRequest,
    ConnectionInfo,
};
pub use notify::{error_chain, report_failure, ConsoleNotifier, Notifier, FAILURE_TITLE};
pub use sync_changes::sync_changes;
pub use sync_selected::sync_selected;
