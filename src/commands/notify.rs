//! Top-level failure reporting
//!
//! A run that fails as a whole is shown to the user once, with the full error
//! chain and a backtrace, and then swallowed so the process stays usable.

use std::backtrace::Backtrace;
use std::error::Error;
use std::io::Write;

use tracing::error;

pub const FAILURE_TITLE: &str = "Scp failed";

/// Shows a modal-style message to the user
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Prints notifications to stderr
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, title: &str, body: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "== {} ==\n{}", title, body);
    }
}

/// Error message followed by every `source()` in the chain
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str("\nCaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Log `err` and show it under [`FAILURE_TITLE`]
pub fn report_failure(notifier: &dyn Notifier, err: &(dyn Error + 'static)) {
    let chain = error_chain(err);
    error!("{}", chain.replace('\n', " | "));
    let body = format!("{}\n{}", chain, Backtrace::capture());
    notifier.notify(FAILURE_TITLE, &body);
}
