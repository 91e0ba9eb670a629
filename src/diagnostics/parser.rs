//! Classifier chain dispatcher.
//!
//! Classifiers are consulted in registration order; the first one producing a
//! diagnostic wins. Most events are structural and match no classifier, which
//! is not an error.

use crate::bep::BuildEvent;
use crate::diagnostics::{AbortedClassifier, ActionFailedClassifier, Diagnostic};

/// Error type for classifier failures.
///
/// A failing classifier is isolated: the dispatcher logs the error and moves
/// on to the next classifier in the chain.
#[derive(thiserror::Error, Debug)]
pub enum ClassifierError {
    /// A referenced output file could not be read.
    #[error("Failed to read action output {path}: {source}")]
    OutputRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other classifier-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Turns one decoded build event into zero or one diagnostic.
pub trait DiagnosticClassifier: Send + Sync {
    /// Name used when logging classifier failures.
    fn name(&self) -> &'static str;

    /// Classify a single event.
    ///
    /// # Errors
    ///
    /// Returns a `ClassifierError` if classification itself failed; the
    /// dispatcher treats this as "no diagnostic from this classifier".
    fn classify(&self, event: &BuildEvent) -> Result<Option<Diagnostic>, ClassifierError>;
}

/// Ordered chain of diagnostic classifiers.
pub struct BuildEventParser {
    classifiers: Vec<Box<dyn DiagnosticClassifier>>,
}

impl Default for BuildEventParser {
    fn default() -> Self {
        Self {
            classifiers: vec![
                Box::new(AbortedClassifier),
                Box::new(ActionFailedClassifier),
            ],
        }
    }
}

impl BuildEventParser {
    /// A parser with no registered classifiers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            classifiers: Vec::new(),
        }
    }

    /// Append a classifier to the end of the chain.
    pub fn register(&mut self, classifier: Box<dyn DiagnosticClassifier>) {
        self.classifiers.push(classifier);
    }

    /// Run the chain over one event; first match wins.
    #[must_use]
    pub fn parse(&self, event: &BuildEvent) -> Option<Diagnostic> {
        for classifier in &self.classifiers {
            match classifier.classify(event) {
                Ok(Some(diagnostic)) => return Some(diagnostic),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        classifier = classifier.name(),
                        %error,
                        "Diagnostic classifier failed"
                    );
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bep::{Aborted, EventId};
    use crate::diagnostics::Severity;

    struct FailingClassifier;

    impl DiagnosticClassifier for FailingClassifier {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn classify(&self, _event: &BuildEvent) -> Result<Option<Diagnostic>, ClassifierError> {
            Err(ClassifierError::Other("boom".to_string()))
        }
    }

    struct StaticClassifier(&'static str);

    impl DiagnosticClassifier for StaticClassifier {
        fn name(&self) -> &'static str {
            "static"
        }

        fn classify(&self, _event: &BuildEvent) -> Result<Option<Diagnostic>, ClassifierError> {
            Ok(Some(Diagnostic {
                title: self.0.to_string(),
                description: String::new(),
                severity: Severity::Info,
                label: None,
                location: None,
            }))
        }
    }

    fn aborted_event() -> BuildEvent {
        BuildEvent {
            id: EventId::UnconfiguredLabel {
                label: "//x:y".to_string(),
            },
            aborted: Some(Aborted::default()),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_match_wins() {
        let mut parser = BuildEventParser::empty();
        parser.register(Box::new(StaticClassifier("first")));
        parser.register(Box::new(StaticClassifier("second")));

        let diagnostic = parser.parse(&aborted_event()).unwrap();
        assert_eq!(diagnostic.title, "first");
    }

    #[test]
    fn test_failing_classifier_is_isolated() {
        let mut parser = BuildEventParser::empty();
        parser.register(Box::new(FailingClassifier));
        parser.register(Box::new(StaticClassifier("fallback")));

        let diagnostic = parser.parse(&aborted_event()).unwrap();
        assert_eq!(diagnostic.title, "fallback");
    }

    #[test]
    fn test_no_match_is_none() {
        let parser = BuildEventParser::empty();
        assert!(parser.parse(&aborted_event()).is_none());
    }

    #[test]
    fn test_default_chain_matches_aborted() {
        let parser = BuildEventParser::default();
        let diagnostic = parser.parse(&aborted_event()).unwrap();
        assert_eq!(diagnostic.severity, Severity::Error);
    }
}
