//! Operator-visible log sink
//!
//! The host system exposes a single printf-style console. Modules write
//! human-readable lines to it; the default sink forwards them to `tracing`.

use std::sync::Mutex;

use tracing::info;

/// Printf-style sink for operator-visible messages
pub trait OperatorLog: Send + Sync {
    fn print(&self, message: &str);
}

/// Forwards operator messages to `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl OperatorLog for TracingLog {
    fn print(&self, message: &str) {
        info!(target: "demo_upload::console", "{}", message);
    }
}

/// Keeps every printed line in memory
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all lines printed so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of printed lines starting with `prefix`
    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

impl OperatorLog for MemoryLog {
    fn print(&self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }
}
