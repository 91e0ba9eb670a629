//! The authoritative second pass over the event file.
//!
//! Runs once, after the process has exited and the live stream reader has
//! stopped. Re-reads the event file from offset zero and decodes every frame,
//! independent of whatever subset the live reader managed to stream.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::Path;

use crate::aggregate::{AggregatedResult, FileSet, FileSetBuilder};
use crate::bep::{BuildEvent, Configuration, Decoded, EventId, FrameDecoder, FrameError};
use crate::invocation::ExitClassification;

/// Error type for the aggregation pass.
///
/// Corrupt individual frames are skipped, not surfaced; this error means the
/// file could not be read or framing was lost entirely.
#[derive(thiserror::Error, Debug)]
pub enum ArtifactExtractionError {
    #[error("Failed to read build event file after {bytes_consumed} bytes: {source}")]
    Io {
        bytes_consumed: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("Unrecoverable frame decode failure after {bytes_consumed} bytes: {source}")]
    Frame {
        bytes_consumed: u64,
        #[source]
        source: FrameError,
    },
}

impl ArtifactExtractionError {
    /// Bytes successfully consumed before the failure, for diagnostics.
    #[must_use]
    pub fn bytes_consumed(&self) -> u64 {
        match self {
            Self::Io { bytes_consumed, .. } | Self::Frame { bytes_consumed, .. } => *bytes_consumed,
        }
    }
}

/// Decode the complete event file and build the final result.
///
/// A missing file means the process never wrote any events; that aggregates
/// to an empty result, not an error.
///
/// # Errors
///
/// Returns [`ArtifactExtractionError`] if the file cannot be read or framing
/// is irrecoverably lost.
pub async fn aggregate(
    path: &Path,
    classification: ExitClassification,
    exit_code: i32,
) -> Result<AggregatedResult, ArtifactExtractionError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No build event file; aggregating zero events");
            Vec::new()
        }
        Err(e) => {
            return Err(ArtifactExtractionError::Io {
                bytes_consumed: 0,
                source: e,
            })
        }
    };

    let mut state = AggregationState::default();
    let mut decoder = FrameDecoder::new();
    decoder.extend(&bytes);
    loop {
        match decoder.try_next() {
            Ok(Decoded::Event(event)) => state.apply(*event),
            Ok(Decoded::Corrupt) => {}
            Ok(Decoded::NeedMoreData) => break,
            Err(source) => {
                return Err(ArtifactExtractionError::Frame {
                    bytes_consumed: decoder.bytes_consumed(),
                    source,
                })
            }
        }
    }
    if decoder.pending_bytes() > 0 {
        tracing::warn!(
            pending = decoder.pending_bytes(),
            "Build event file ends with a partial frame"
        );
    }

    Ok(state.finish(classification, exit_code, decoder.bytes_consumed()))
}

/// Mutable aggregation state over one pass of the event stream.
#[derive(Default)]
struct AggregationState {
    builders: HashMap<String, FileSetBuilder>,
    /// File set ids in first-seen order, so the result preserves stream order.
    order: Vec<String>,
    /// Sets referenced directly from a completed target's output groups.
    top_level: BTreeSet<String>,
    target_file_sets: HashMap<String, BTreeSet<String>>,
    workspace_status: BTreeMap<String, String>,
    configurations: BTreeMap<String, Configuration>,
    failed_targets: BTreeSet<String>,
}

impl AggregationState {
    fn builder(&mut self, id: &str) -> &mut FileSetBuilder {
        if !self.builders.contains_key(id) {
            self.order.push(id.to_string());
        }
        self.builders.entry(id.to_string()).or_default()
    }

    fn apply(&mut self, event: BuildEvent) {
        if let Some(aborted) = &event.aborted {
            if let EventId::TargetConfigured { label }
            | EventId::TargetCompleted { label, .. }
            | EventId::UnconfiguredLabel { label } = &event.id
            {
                tracing::debug!(label, reason = %aborted.reason, "Target aborted");
                self.failed_targets.insert(label.clone());
            }
        }

        match event.id {
            EventId::Configuration { id } => {
                if let Some(configuration) = event.configuration {
                    self.configurations.insert(id, configuration);
                }
            }
            EventId::NamedSet { id } => {
                if let Some(named_set) = event.named_set_of_files {
                    self.builder(&id).set_named_set(named_set);
                }
            }
            EventId::WorkspaceStatus {} => {
                if let Some(status) = event.workspace_status {
                    for item in status.item {
                        self.workspace_status.insert(item.key, item.value);
                    }
                }
            }
            EventId::TargetCompleted {
                label,
                configuration,
            } => {
                let Some(completed) = event.completed else {
                    return;
                };
                if !completed.success {
                    self.failed_targets.insert(label.clone());
                }
                let config_id = configuration.map(|c| c.id);
                for group in completed.output_group {
                    for set_id in &group.file_sets {
                        self.target_file_sets
                            .entry(label.clone())
                            .or_default()
                            .insert(set_id.id.clone());
                        self.top_level.insert(set_id.id.clone());

                        let builder = self.builder(&set_id.id);
                        if let Some(config_id) = &config_id {
                            builder.set_config_id(config_id.clone());
                        }
                        builder.add_output_group(group.name.clone());
                        builder.add_target(label.clone());
                    }
                }
            }
            _ => {}
        }
    }

    /// Propagate group/target attribution from top-level sets to the nested
    /// sets they reference, then build the immutable result.
    ///
    /// Only top-level sets carry attribution explicitly in the event stream;
    /// the transitive closure inherits it here.
    fn finish(
        mut self,
        classification: ExitClassification,
        exit_code: i32,
        bytes_consumed: u64,
    ) -> AggregatedResult {
        let mut to_visit: VecDeque<String> = self.top_level.iter().cloned().collect();
        let mut visited: BTreeSet<String> = self.top_level.clone();
        while let Some(set_id) = to_visit.pop_front() {
            let Some(parent) = self.builders.get(&set_id) else {
                continue;
            };
            let attribution = parent.attribution();
            let children = parent.child_ids();
            for child_id in children {
                if !visited.insert(child_id.clone()) {
                    continue;
                }
                self.builder(&child_id).update_from_parent(&attribution);
                to_visit.push_back(child_id);
            }
        }

        let file_sets: Vec<FileSet> = self
            .order
            .iter()
            .filter_map(|id| self.builders.get(id).and_then(|b| b.build(id)))
            .collect();

        AggregatedResult::new(
            classification,
            exit_code,
            self.workspace_status,
            self.configurations,
            self.failed_targets,
            bytes_consumed,
            file_sets,
            self.target_file_sets,
        )
    }
}
