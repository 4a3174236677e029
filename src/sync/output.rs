//! Output pane sinks
//!
//! The output pane is an append-only, line-oriented log the user watches
//! while a run progresses. Upload tasks write to it concurrently.

use std::io::Write;

use parking_lot::Mutex;

pub trait OutputPane: Send + Sync {
    /// Drop everything shown so far
    fn clear(&self);

    /// Bring the pane to the user's attention
    fn activate(&self);

    fn write_line(&self, line: &str);
}

/// Writes lines to stdout
#[derive(Debug, Default)]
pub struct ConsoleOutput;

impl OutputPane for ConsoleOutput {
    fn clear(&self) {}

    fn activate(&self) {}

    fn write_line(&self, line: &str) {
        tracing::debug!(target: "pane", "{}", line);
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", line) {
            tracing::warn!("Failed to write output line: {}", e);
        }
    }
}

/// Keeps lines in memory
#[derive(Debug, Default)]
pub struct MemoryOutput {
    lines: Mutex<Vec<String>>,
    activations: Mutex<usize>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn activations(&self) -> usize {
        *self.activations.lock()
    }
}

impl OutputPane for MemoryOutput {
    fn clear(&self) {
        self.lines.lock().clear();
    }

    fn activate(&self) {
        *self.activations.lock() += 1;
    }

    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}
