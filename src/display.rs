//! Colored CLI display for build progress and results.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::aggregate::AggregatedResult;
use crate::diagnostics::{Diagnostic, Severity};
use crate::invocation::{InvocationError, InvocationOutcome};
use crate::output::OutputSink;

/// Sink that prints build progress to the terminal.
///
/// Status lines go to stdout as-is; diagnostics get a colored severity tag.
pub struct ConsoleSink {
    color: bool,
}

impl ConsoleSink {
    #[must_use]
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn severity_tag(&self, severity: Severity) -> String {
        let tag = match severity {
            Severity::Info => "[INFO]",
            Severity::Warning => "[WARN]",
            Severity::Error => "[ERROR]",
        };
        if !self.color {
            return tag.to_string();
        }
        match severity {
            Severity::Info => tag.blue().bold().to_string(),
            Severity::Warning => tag.yellow().bold().to_string(),
            Severity::Error => tag.red().bold().to_string(),
        }
    }
}

impl OutputSink for ConsoleSink {
    fn diagnostic(&self, diagnostic: Diagnostic) {
        println!(
            "{} {}",
            self.severity_tag(diagnostic.severity),
            diagnostic.title
        );
        for line in diagnostic.description.lines() {
            println!("    {line}");
        }
        let _ = io::stdout().flush();
    }

    fn status(&self, line: &str) {
        println!("{line}");
        let _ = io::stdout().flush();
    }
}

/// Print a one-screen summary of a finished invocation.
pub fn print_summary(outcome: &InvocationOutcome, color: bool) {
    match outcome {
        Ok(result) => print_result_summary(result, color),
        Err(InvocationError::Cancelled) => {
            println!("{}", paint("Build cancelled", color, Paint::Yellow));
        }
        Err(error) => {
            println!("{} {error}", paint("Build failed:", color, Paint::Red));
        }
    }
    let _ = io::stdout().flush();
}

fn print_result_summary(result: &AggregatedResult, color: bool) {
    let headline = format!(
        "Build finished: {} (exit code {})",
        result.classification, result.exit_code
    );
    let paint_as = if result.classification.is_success() {
        Paint::Green
    } else {
        Paint::Red
    };
    println!("{}", paint(&headline, color, paint_as));

    if !result.failed_targets.is_empty() {
        println!("Failed targets:");
        for label in &result.failed_targets {
            println!("  {}", paint(label, color, Paint::Red));
        }
    }

    let artifacts = result.all_artifacts(|_| true);
    if !artifacts.is_empty() {
        println!("Outputs ({}):", artifacts.len());
        for artifact in artifacts {
            println!("  {}", artifact.path);
        }
    }
}

enum Paint {
    Green,
    Yellow,
    Red,
}

fn paint(text: &str, color: bool, paint: Paint) -> String {
    if !color {
        return text.to_string();
    }
    match paint {
        Paint::Green => text.green().bold().to_string(),
        Paint::Yellow => text.yellow().bold().to_string(),
        Paint::Red => text.red().bold().to_string(),
    }
}
