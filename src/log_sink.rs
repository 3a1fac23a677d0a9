//! Logging sink handed to connections by the owning process.
//!
//! Connections never talk to a logger directly. They report `(severity,
//! message)` pairs to a [`LogSink`], which the owner routes wherever it
//! likes. [`TracingSink`] forwards to `tracing` and is the default; any
//! `Fn(Severity, &str)` closure is also a sink.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Receiver of log events.
///
/// Called synchronously from inside `connect()` and friends, so
/// implementations must return promptly.
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(Severity, &str) + Send + Sync,
{
    fn log(&self, severity: Severity, message: &str) {
        self(severity, message)
    }
}

/// Sink that forwards events to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!(target: "gnss_link", "{message}"),
            Severity::Info => tracing::info!(target: "gnss_link", "{message}"),
            Severity::Error => tracing::error!(target: "gnss_link", "{message}"),
        }
    }
}

/// Sink that keeps every event in memory.
///
/// Clones share the same event list, so one clone can be handed to a
/// connection while another is inspected.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<(Severity, String)> {
        self.events.lock().clone()
    }

    /// Number of events at exactly `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(s, _)| *s == severity)
            .count()
    }

    /// Whether any event at `severity` contains `needle`.
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.events
            .lock()
            .iter()
            .any(|(s, m)| *s == severity && m.contains(needle))
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl LogSink for RecordingSink {
    fn log(&self, severity: Severity, message: &str) {
        self.events.lock().push((severity, message.to_string()));
    }
}
