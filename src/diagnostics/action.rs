//! Classifier for completed actions.

use url::Url;

use crate::bep::{ActionExecuted, BuildEvent, EventId};
use crate::diagnostics::{ClassifierError, Diagnostic, DiagnosticClassifier, Severity};

/// Produces diagnostics for action-completed events.
///
/// Actions from external repositories (labels starting with `@`) only surface
/// when they failed; workspace actions surface at info severity even on
/// success. The failure text comes from the embedded failure message when the
/// tool provides one, otherwise from the action's stderr file.
pub struct ActionFailedClassifier;

impl DiagnosticClassifier for ActionFailedClassifier {
    fn name(&self) -> &'static str {
        "action-failed"
    }

    fn classify(&self, event: &BuildEvent) -> Result<Option<Diagnostic>, ClassifierError> {
        let EventId::ActionCompleted { label, .. } = &event.id else {
            return Ok(None);
        };
        let Some(action) = &event.action else {
            return Ok(None);
        };

        let severity = if action.success {
            Severity::Info
        } else {
            Severity::Error
        };
        if label.starts_with('@') && severity != Severity::Error {
            return Ok(None);
        }

        Ok(Some(Diagnostic {
            title: if action.success {
                format!("Action completed: {label}")
            } else {
                format!("Action failed: {label}")
            },
            description: action_output(label, action),
            severity,
            label: Some(label.clone()),
            location: None,
        }))
    }
}

/// Best-effort failure/output text for an action.
fn action_output(label: &str, action: &ActionExecuted) -> String {
    if let Some(detail) = &action.failure_detail {
        if !detail.message.is_empty() {
            return detail.message.clone();
        }
    }
    let Some(stderr) = &action.stderr else {
        return format!("action for {label} reported no output");
    };
    let Some(uri) = &stderr.uri else {
        return format!("action for {label} reported no readable output");
    };
    match read_file_uri(uri) {
        Ok(text) => text,
        Err(e) => format!("could not read action output at {uri}: {e}"),
    }
}

/// Dereference a `file://` URI to its contents.
fn read_file_uri(uri: &str) -> Result<String, String> {
    let url = Url::parse(uri).map_err(|e| e.to_string())?;
    if url.scheme() != "file" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    let path = url
        .to_file_path()
        .map_err(|()| "not a local file path".to_string())?;
    std::fs::read_to_string(&path).map_err(|e| e.to_string())
}
