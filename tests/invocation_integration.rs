//! End-to-end invocation tests against a stub build tool.
//!
//! The stub is a shell script that parses the event-file flag off its command
//! line, appends pre-encoded frame chunks to that file with small pauses in
//! between, and exits with a chosen code. This exercises the whole pipeline:
//! spawn, live streaming, exit classification, and aggregation.

#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use bep_driver::bep::{
    encode_event, ActionExecuted, BuildEvent, ConfigurationId, EventId, FailureDetail,
    NamedSetId, NamedSetOfFiles, OutputFile, OutputGroup, TargetComplete,
};
use bep_driver::config::DriverConfig;
use bep_driver::exec::{BazelCommandBuilder, BuildCommand};
use bep_driver::invocation::{ExitClassification, Invocation, InvocationError};
use bep_driver::output::MemorySink;

const STUB_SCRIPT: &str = r#"#!/bin/sh
out=""
for arg in "$@"; do
    case "$arg" in
        --build_event_binary_file=*) out="${arg#--build_event_binary_file=}" ;;
    esac
done
[ -n "$out" ] || exit 1
for chunk in "$CHUNK_DIR"/chunk-*.bin; do
    cat "$chunk" >> "$out"
    sleep "${STUB_PAUSE:-0.02}"
done
exit "${STUB_EXIT:-0}"
"#;

struct StubBuildTool {
    dir: TempDir,
    script: PathBuf,
}

impl StubBuildTool {
    fn new(chunks: &[Vec<BuildEvent>]) -> Self {
        let dir = TempDir::new().unwrap();
        for (i, events) in chunks.iter().enumerate() {
            let mut bytes = Vec::new();
            for event in events {
                bytes.extend(encode_event(event).unwrap());
            }
            std::fs::write(dir.path().join(format!("chunk-{i:02}.bin")), bytes).unwrap();
        }

        let script = dir.path().join("build-tool.sh");
        let mut file = std::fs::File::create(&script).unwrap();
        file.write_all(STUB_SCRIPT.as_bytes()).unwrap();
        file.set_permissions(std::fs::Permissions::from_mode(0o755))
            .unwrap();
        Self { dir, script }
    }

    fn command(&self, exit_code: i32) -> BazelCommandBuilder {
        BazelCommandBuilder::new(&self.script, BuildCommand::Build)
            .env("CHUNK_DIR", self.dir.path().display().to_string())
            .env("STUB_EXIT", exit_code.to_string())
            .target("//app:app")
    }
}

fn test_config() -> DriverConfig {
    DriverConfig {
        drain_grace_ms: 500,
        terminate_timeout_ms: 500,
        ..DriverConfig::default()
    }
}

fn named_set(id: &str, paths: &[&str]) -> BuildEvent {
    BuildEvent {
        id: EventId::NamedSet { id: id.to_string() },
        named_set_of_files: Some(NamedSetOfFiles {
            files: paths
                .iter()
                .map(|p| OutputFile {
                    name: (*p).to_string(),
                    uri: None,
                })
                .collect(),
            file_sets: Vec::new(),
        }),
        ..Default::default()
    }
}

fn target_completed(label: &str, success: bool, set_ids: &[&str]) -> BuildEvent {
    BuildEvent {
        id: EventId::TargetCompleted {
            label: label.to_string(),
            configuration: Some(ConfigurationId {
                id: "cfg".to_string(),
            }),
        },
        completed: Some(TargetComplete {
            success,
            output_group: vec![OutputGroup {
                name: "default".to_string(),
                file_sets: set_ids
                    .iter()
                    .map(|id| NamedSetId {
                        id: (*id).to_string(),
                    })
                    .collect(),
            }],
        }),
        ..Default::default()
    }
}

fn failed_action(label: &str) -> BuildEvent {
    BuildEvent {
        id: EventId::ActionCompleted {
            label: label.to_string(),
            primary_output: None,
        },
        action: Some(ActionExecuted {
            success: false,
            stderr: None,
            failure_detail: Some(FailureDetail {
                message: "link failed".to_string(),
            }),
        }),
        ..Default::default()
    }
}

async fn settle(invocation: &Invocation) -> bep_driver::invocation::InvocationOutcome {
    tokio::time::timeout(Duration::from_secs(10), invocation.await_result())
        .await
        .expect("invocation did not settle in time")
}

#[tokio::test]
async fn test_successful_build_streams_and_aggregates() {
    // five frames paced out over roughly half a second
    let stub = StubBuildTool::new(&[
        vec![BuildEvent {
            id: EventId::Started {},
            ..Default::default()
        }],
        vec![named_set("1", &["bin/app", "bin/app.map"])],
        vec![named_set("2", &["bin/app.sym"])],
        vec![target_completed("//app:app", true, &["1", "2"])],
        vec![BuildEvent::default()],
    ]);
    let sink = Arc::new(MemorySink::new());
    let invocation = Invocation::start(
        stub.command(0).env("STUB_PAUSE", "0.1"),
        sink.clone(),
        &test_config(),
    );

    let started = std::time::Instant::now();
    let result = settle(&invocation).await.unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "result should arrive promptly after the stub exits"
    );
    assert_eq!(result.classification, ExitClassification::Success);
    assert_eq!(result.exit_code, 0);
    assert!(result.failed_targets.is_empty());

    let artifacts = result.output_artifacts_for_target("//app:app", |_| true);
    let paths: Vec<&str> = artifacts.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(paths, ["bin/app", "bin/app.map", "bin/app.sym"]);

    let data = result.full_artifact_data();
    assert!(data["bin/app.sym"].targets.contains("//app:app"));
    assert!(data["bin/app"].output_groups.contains("default"));
}

#[tokio::test]
async fn test_failed_build_reports_diagnostics_live() {
    let stub = StubBuildTool::new(&[
        vec![failed_action("//app:app")],
        vec![target_completed("//app:app", false, &[])],
    ]);
    let sink = Arc::new(MemorySink::new());
    let invocation = Invocation::start(stub.command(1), sink.clone(), &test_config());

    let result = settle(&invocation).await.unwrap();
    assert_eq!(result.classification, ExitClassification::Failed);
    assert!(result.failed_targets.contains("//app:app"));

    let diagnostics = sink.diagnostics();
    assert!(
        diagnostics
            .iter()
            .any(|d| d.title == "Action failed: //app:app" && d.description == "link failed"),
        "expected streamed action diagnostic, got {diagnostics:?}"
    );
    assert!(sink.has_error());
}

#[tokio::test]
async fn test_fatal_exit_code_skips_event_output() {
    let stub = StubBuildTool::new(&[vec![named_set("1", &["bin/app"])]]);
    let sink = Arc::new(MemorySink::new());
    let invocation = Invocation::start(stub.command(37), sink, &test_config());

    let result = settle(&invocation).await.unwrap();
    assert_eq!(result.classification, ExitClassification::FatalError);
    assert_eq!(result.exit_code, 37);
    assert!(result.file_sets().is_empty());
    assert_eq!(result.bytes_consumed, 0);
}

#[tokio::test]
async fn test_interrupted_build_still_aggregates() {
    let stub = StubBuildTool::new(&[
        vec![named_set("1", &["bin/partial.o"])],
        vec![target_completed("//app:app", true, &["1"])],
    ]);
    let sink = Arc::new(MemorySink::new());
    let invocation = Invocation::start(stub.command(8), sink, &test_config());

    let result = settle(&invocation).await.unwrap();
    assert_eq!(result.classification, ExitClassification::Interrupted);
    assert_eq!(result.all_artifacts(|_| true).len(), 1);
}

#[tokio::test]
async fn test_cancel_mid_build_terminates_process() {
    // a long stub: many chunks, long pauses
    let chunks: Vec<Vec<BuildEvent>> = (0..200)
        .map(|i| vec![named_set(&i.to_string(), &["bin/app"])])
        .collect();
    let stub = StubBuildTool::new(&chunks);
    let sink = Arc::new(MemorySink::new());
    let invocation = Invocation::start(stub.command(0), sink, &test_config());

    tokio::time::sleep(Duration::from_millis(100)).await;
    invocation.cancel();

    let outcome = settle(&invocation).await;
    assert!(matches!(outcome, Err(InvocationError::Cancelled)));
    // the terminal value is stable across repeated reads
    assert!(matches!(
        invocation.try_result(),
        Some(Err(InvocationError::Cancelled))
    ));
}
