//! Output sink interface consumed by progress-reporting collaborators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::diagnostics::Diagnostic;

/// Receives diagnostics and status lines from a running invocation.
///
/// Implementations must tolerate being called from multiple tasks; calls must
/// not block for unbounded time since they run inline with output forwarding.
pub trait OutputSink: Send + Sync {
    /// A diagnostic classified from a build event.
    fn diagnostic(&self, diagnostic: Diagnostic);

    /// One line of merged process stdout/stderr, trailing whitespace trimmed.
    fn status(&self, line: &str);

    /// The invocation produced at least one error.
    fn set_has_error(&self) {}

    /// The invocation produced at least one warning.
    fn set_has_warning(&self) {}
}

/// Sink that discards everything.
pub struct NullSink;

impl OutputSink for NullSink {
    fn diagnostic(&self, _diagnostic: Diagnostic) {}

    fn status(&self, _line: &str) {}
}

/// Sink that records everything it receives; used in tests and for callers
/// that want to inspect output after completion.
#[derive(Default)]
pub struct MemorySink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    status_lines: Mutex<Vec<String>>,
    has_error: AtomicBool,
    has_warning: AtomicBool,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Diagnostics received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock was poisoned.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().expect("sink lock poisoned").clone()
    }

    /// Status lines received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock was poisoned.
    #[must_use]
    pub fn status_lines(&self) -> Vec<String> {
        self.status_lines
            .lock()
            .expect("sink lock poisoned")
            .clone()
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn has_warning(&self) -> bool {
        self.has_warning.load(Ordering::Relaxed)
    }
}

impl OutputSink for MemorySink {
    fn diagnostic(&self, diagnostic: Diagnostic) {
        if let Ok(mut diagnostics) = self.diagnostics.lock() {
            diagnostics.push(diagnostic);
        }
    }

    fn status(&self, line: &str) {
        if let Ok(mut lines) = self.status_lines.lock() {
            lines.push(line.to_string());
        }
    }

    fn set_has_error(&self) {
        self.has_error.store(true, Ordering::Relaxed);
    }

    fn set_has_warning(&self) {
        self.has_warning.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    #[test]
    fn test_memory_sink_records() {
        let sink = MemorySink::new();
        sink.status("Analyzing: 2 targets");
        sink.diagnostic(Diagnostic {
            title: "Action failed: //x:y".to_string(),
            description: "boom".to_string(),
            severity: Severity::Error,
            label: Some("//x:y".to_string()),
            location: None,
        });
        sink.set_has_error();

        assert_eq!(sink.status_lines(), vec!["Analyzing: 2 targets"]);
        assert_eq!(sink.diagnostics().len(), 1);
        assert!(sink.has_error());
        assert!(!sink.has_warning());
    }
}
