//! Exit-code classification.

use std::fmt;

/// Classification of a build tool exit code.
///
/// Derived purely from the process exit code via a fixed table matching the
/// tool's public exit-code contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClassification {
    /// The build completed successfully.
    Success,
    /// The build itself failed (some targets did not build).
    Failed,
    /// The build succeeded but some tests failed.
    PartialSuccess,
    /// The build succeeded but there was nothing to do.
    NoActionsRan,
    /// The user interrupted the build.
    Interrupted,
    /// The process crashed or exited with an unmapped code; no usable
    /// output was produced.
    FatalError,
}

impl ExitClassification {
    /// Classify a raw exit code.
    #[must_use]
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::Failed,
            3 => Self::PartialSuccess,
            4 => Self::NoActionsRan,
            8 => Self::Interrupted,
            _ => Self::FatalError,
        }
    }

    /// Whether the build ran far enough for its event output to be usable.
    /// Aggregation is skipped when this is false.
    #[must_use]
    pub fn build_completed(self) -> bool {
        !matches!(self, Self::FatalError)
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ExitClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::PartialSuccess => "partial success",
            Self::NoActionsRan => "no actions ran",
            Self::Interrupted => "interrupted",
            Self::FatalError => "fatal error",
        };
        f.write_str(name)
    }
}
