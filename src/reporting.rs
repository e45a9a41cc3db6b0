//! Error reporting sink.
//!
//! Failures that must not interrupt a batch (a node failing to start, a
//! notification-triggered save failing) are handed to an [`ErrorReporting`]
//! implementation and the batch moves on.

use parking_lot::Mutex;
use tracing::warn;

/// Fire-and-forget sink for non-fatal errors.
pub trait ErrorReporting: Send + Sync {
    fn report_warning(&self, source: &str, error: &(dyn std::error::Error + 'static));
}

/// Reports warnings as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporting for TracingReporter {
    fn report_warning(&self, source: &str, error: &(dyn std::error::Error + 'static)) {
        warn!(source, error = %error, "Reported warning");
    }
}

/// Keeps every reported warning in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    warnings: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(source, message)` pairs in reporting order.
    pub fn warnings(&self) -> Vec<(String, String)> {
        self.warnings.lock().clone()
    }

    pub fn clear(&self) {
        self.warnings.lock().clear();
    }
}

impl ErrorReporting for RecordingReporter {
    fn report_warning(&self, source: &str, error: &(dyn std::error::Error + 'static)) {
        warn!(source, error = %error, "Reported warning");
        self.warnings
            .lock()
            .push((source.to_string(), error.to_string()));
    }
}
