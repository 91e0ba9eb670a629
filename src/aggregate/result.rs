//! The aggregated, queryable build result.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::aggregate::{ArtifactData, FileSet, OutputArtifact};
use crate::bep::Configuration;
use crate::invocation::ExitClassification;

/// Immutable result of one build invocation, assembled from the complete
/// event stream after the process exited.
#[derive(Debug, Clone)]
pub struct AggregatedResult {
    pub classification: ExitClassification,
    pub exit_code: i32,
    /// Workspace status key/value pairs reported by the build.
    pub workspace_status: BTreeMap<String, String>,
    /// Configuration metadata keyed by configuration id.
    pub configurations: BTreeMap<String, Configuration>,
    /// Labels of targets that reported a failure.
    pub failed_targets: BTreeSet<String>,
    /// Total event-file bytes consumed by the aggregation pass.
    pub bytes_consumed: u64,
    file_sets: Vec<FileSet>,
    target_file_sets: HashMap<String, BTreeSet<String>>,
}

impl AggregatedResult {
    pub(crate) fn new(
        classification: ExitClassification,
        exit_code: i32,
        workspace_status: BTreeMap<String, String>,
        configurations: BTreeMap<String, Configuration>,
        failed_targets: BTreeSet<String>,
        bytes_consumed: u64,
        file_sets: Vec<FileSet>,
        target_file_sets: HashMap<String, BTreeSet<String>>,
    ) -> Self {
        Self {
            classification,
            exit_code,
            workspace_status,
            configurations,
            failed_targets,
            bytes_consumed,
            file_sets,
            target_file_sets,
        }
    }

    /// An empty result for runs whose event output is unusable.
    #[must_use]
    pub fn no_outputs(classification: ExitClassification, exit_code: i32) -> Self {
        Self {
            classification,
            exit_code,
            workspace_status: BTreeMap::new(),
            configurations: BTreeMap::new(),
            failed_targets: BTreeSet::new(),
            bytes_consumed: 0,
            file_sets: Vec::new(),
            target_file_sets: HashMap::new(),
        }
    }

    /// File sets in event-stream order.
    #[must_use]
    pub fn file_sets(&self) -> &[FileSet] {
        &self.file_sets
    }

    /// All output artifacts matching the path filter, in event-stream order,
    /// deduplicated by path.
    #[must_use]
    pub fn all_artifacts(&self, path_filter: impl Fn(&str) -> bool) -> Vec<OutputArtifact> {
        let mut seen = BTreeSet::new();
        let mut artifacts = Vec::new();
        for set in &self.file_sets {
            for artifact in &set.artifacts {
                if path_filter(&artifact.path) && seen.insert(artifact.path.clone()) {
                    artifacts.push(artifact.clone());
                }
            }
        }
        artifacts
    }

    /// Artifacts directly produced by the given target, matching the filter.
    #[must_use]
    pub fn output_artifacts_for_target(
        &self,
        label: &str,
        path_filter: impl Fn(&str) -> bool,
    ) -> Vec<OutputArtifact> {
        let Some(set_ids) = self.target_file_sets.get(label) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        let mut artifacts = Vec::new();
        for set in &self.file_sets {
            if !set_ids.contains(&set.id) {
                continue;
            }
            for artifact in &set.artifacts {
                if path_filter(&artifact.path) && seen.insert(artifact.path.clone()) {
                    artifacts.push(artifact.clone());
                }
            }
        }
        artifacts
    }

    /// Combined per-artifact metadata for every artifact reported during the
    /// build, keyed by artifact path.
    ///
    /// An artifact appearing in multiple file sets reports the union of all
    /// its output-group and target associations.
    #[must_use]
    pub fn full_artifact_data(&self) -> BTreeMap<String, ArtifactData> {
        let mut data: BTreeMap<String, ArtifactData> = BTreeMap::new();
        for set in &self.file_sets {
            for artifact in &set.artifacts {
                let record = ArtifactData {
                    artifact: artifact.clone(),
                    output_groups: set.output_groups.clone(),
                    targets: set.targets.clone(),
                };
                match data.entry(artifact.path.clone()) {
                    std::collections::btree_map::Entry::Occupied(mut e) => {
                        e.get_mut().update(&record);
                    }
                    std::collections::btree_map::Entry::Vacant(e) => {
                        e.insert(record);
                    }
                }
            }
        }
        data
    }
}
