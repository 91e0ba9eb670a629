//! Classifier for aborted targets and labels.

use crate::bep::{BuildEvent, EventId};
use crate::diagnostics::{ClassifierError, Diagnostic, DiagnosticClassifier, Severity};

/// Produces an error diagnostic for events carrying an aborted payload.
///
/// The event's own description is preferred; when the build tool omits it,
/// one is synthesized from the shape of the event id. Ids this classifier
/// does not recognize produce no diagnostic rather than a guess.
pub struct AbortedClassifier;

impl DiagnosticClassifier for AbortedClassifier {
    fn name(&self) -> &'static str {
        "aborted"
    }

    fn classify(&self, event: &BuildEvent) -> Result<Option<Diagnostic>, ClassifierError> {
        let Some(aborted) = &event.aborted else {
            return Ok(None);
        };

        let (label, fallback) = match &event.id {
            EventId::UnconfiguredLabel { label } => {
                (label.clone(), format!("could not find label {label}"))
            }
            EventId::TargetConfigured { label } => {
                (label.clone(), format!("could not configure target {label}"))
            }
            EventId::TargetCompleted { label, .. } => {
                (label.clone(), format!("could not build target {label}"))
            }
            _ => return Ok(None),
        };

        let description = if aborted.description.is_empty() {
            fallback
        } else {
            aborted.description.clone()
        };

        Ok(Some(Diagnostic {
            title: format!("Build aborted: {label}"),
            description,
            severity: Severity::Error,
            label: Some(label),
            location: None,
        }))
    }
}
