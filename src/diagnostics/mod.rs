//! Human-facing diagnostics derived from build events.

mod action;
mod aborted;
mod parser;

pub use aborted::*;
pub use action::*;
pub use parser::*;

use std::path::PathBuf;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A navigable source location attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// One human-facing diagnostic produced from a build event.
///
/// Immutable once created; forwarded to the output sink as-is.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    /// Target label the diagnostic originates from, when known.
    pub label: Option<String>,
    pub location: Option<Location>,
}
