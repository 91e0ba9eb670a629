//! Decoded build event model.
//!
//! Mirrors the subset of the public build-event-protocol schema this crate
//! consumes. Payloads are JSON messages with camelCase field names; fields the
//! crate does not use are ignored during deserialization.

use serde::{Deserialize, Serialize};

/// One decoded build event: an identifying union plus optional payload
/// sections. Most events carry exactly one payload section matching their id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildEvent {
    pub id: EventId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<Aborted>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<TargetComplete>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionExecuted>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_set_of_files: Option<NamedSetOfFiles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_status: Option<WorkspaceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Configuration>,
}

/// Event id union. Ids the crate does not recognize are preserved as raw JSON
/// so forward-compatible streams do not fail to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventId {
    TargetConfigured {
        label: String,
    },
    #[serde(rename_all = "camelCase")]
    TargetCompleted {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        configuration: Option<ConfigurationId>,
    },
    #[serde(rename_all = "camelCase")]
    ActionCompleted {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        primary_output: Option<String>,
    },
    UnconfiguredLabel {
        label: String,
    },
    NamedSet {
        id: String,
    },
    WorkspaceStatus {},
    Configuration {
        id: String,
    },
    Started {},
    #[serde(untagged)]
    Unrecognized(serde_json::Value),
}

impl Default for EventId {
    fn default() -> Self {
        Self::Unrecognized(serde_json::Value::Null)
    }
}

/// Reference to a configuration by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationId {
    pub id: String,
}

/// Reference to a named file set by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedSetId {
    pub id: String,
}

/// One output file reported by the build tool. `name` is the path relative to
/// the output root; `uri` locates the file on disk when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// A named group of output files, possibly referencing further sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamedSetOfFiles {
    pub files: Vec<OutputFile>,
    pub file_sets: Vec<NamedSetId>,
}

/// An output group of a completed target, referencing named file sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputGroup {
    pub name: String,
    pub file_sets: Vec<NamedSetId>,
}

/// Payload of a target-completed event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetComplete {
    pub success: bool,
    pub output_group: Vec<OutputGroup>,
}

/// Payload of an action-completed event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionExecuted {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<OutputFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_detail: Option<FailureDetail>,
}

/// Structured failure message embedded in a failed action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureDetail {
    pub message: String,
}

/// Payload of an aborted event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Aborted {
    pub reason: String,
    pub description: String,
}

/// Workspace status key/value pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceStatus {
    pub item: Vec<StatusItem>,
}

/// One workspace status entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusItem {
    pub key: String,
    pub value: String,
}

/// Configuration metadata reported once per configuration id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    pub mnemonic: String,
    pub platform_name: String,
    pub cpu: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_completed_id_parses() {
        let json = r#"{
            "id": {"targetCompleted": {"label": "//x:y", "configuration": {"id": "cfg"}}},
            "completed": {"success": true, "outputGroup": [{"name": "default", "fileSets": [{"id": "1"}]}]}
        }"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        match &event.id {
            EventId::TargetCompleted {
                label,
                configuration,
            } => {
                assert_eq!(label, "//x:y");
                assert_eq!(configuration.as_ref().unwrap().id, "cfg");
            }
            other => panic!("unexpected id: {other:?}"),
        }
        let completed = event.completed.unwrap();
        assert!(completed.success);
        assert_eq!(completed.output_group[0].name, "default");
        assert_eq!(completed.output_group[0].file_sets[0].id, "1");
    }

    #[test]
    fn test_named_set_parses() {
        let json = r#"{
            "id": {"namedSet": {"id": "2"}},
            "namedSetOfFiles": {
                "files": [{"name": "a/b.o", "uri": "file:///tmp/a/b.o"}],
                "fileSets": [{"id": "1"}]
            }
        }"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(&event.id, EventId::NamedSet { id } if id == "2"));
        let set = event.named_set_of_files.unwrap();
        assert_eq!(set.files[0].name, "a/b.o");
        assert_eq!(set.file_sets[0].id, "1");
    }

    #[test]
    fn test_unknown_id_is_unrecognized() {
        let json = r#"{"id": {"buildToolLogs": {}}, "progress": {"stdout": "hi"}}"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event.id, EventId::Unrecognized(_)));
    }

    #[test]
    fn test_aborted_event_parses() {
        let json = r#"{
            "id": {"unconfiguredLabel": {"label": "//missing:rule"}},
            "aborted": {"reason": "LOADING_FAILURE", "description": "no such target"}
        }"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event.id, EventId::UnconfiguredLabel { .. }));
        assert_eq!(event.aborted.unwrap().description, "no such target");
    }

    #[test]
    fn test_workspace_status_parses() {
        let json = r#"{
            "id": {"workspaceStatus": {}},
            "workspaceStatus": {"item": [{"key": "BUILD_USER", "value": "dev"}]}
        }"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        let status = event.workspace_status.unwrap();
        assert_eq!(status.item[0].key, "BUILD_USER");
        assert_eq!(status.item[0].value, "dev");
    }

    #[test]
    fn test_round_trip() {
        let event = BuildEvent {
            id: EventId::Configuration {
                id: "cfg".to_string(),
            },
            configuration: Some(Configuration {
                mnemonic: "k8-fastbuild".to_string(),
                platform_name: "k8".to_string(),
                cpu: "k8".to_string(),
            }),
            ..Default::default()
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: BuildEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.id, EventId::Configuration { id } if id == "cfg"));
        assert_eq!(back.configuration.unwrap().mnemonic, "k8-fastbuild");
    }
}
