//! File sets and per-artifact data.

use std::collections::BTreeSet;

use crate::bep::NamedSetOfFiles;

/// One output artifact reported by the build.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OutputArtifact {
    /// Path relative to the output root.
    pub path: String,
    /// On-disk location, when the build tool reported one.
    pub uri: Option<String>,
}

/// A named group of output artifacts together with the output groups and
/// targets it was produced for. Artifact order follows the event stream.
#[derive(Debug, Clone)]
pub struct FileSet {
    pub id: String,
    pub artifacts: Vec<OutputArtifact>,
    pub output_groups: BTreeSet<String>,
    pub targets: BTreeSet<String>,
}

/// Combined metadata for one artifact path across all file sets that
/// reported it.
#[derive(Debug, Clone)]
pub struct ArtifactData {
    pub artifact: OutputArtifact,
    pub output_groups: BTreeSet<String>,
    pub targets: BTreeSet<String>,
}

impl ArtifactData {
    /// Union another record for the same artifact path into this one.
    pub fn update(&mut self, other: &ArtifactData) {
        self.output_groups
            .extend(other.output_groups.iter().cloned());
        self.targets.extend(other.targets.iter().cloned());
    }
}

/// Mutable file set under construction during aggregation.
///
/// Only top-level file sets referenced from a completed target's output
/// groups carry group/target/configuration attribution in the event stream;
/// nested sets inherit it from their parents afterwards.
#[derive(Debug, Default)]
pub(crate) struct FileSetBuilder {
    pub(crate) named_set: Option<NamedSetOfFiles>,
    pub(crate) config_id: Option<String>,
    pub(crate) output_groups: BTreeSet<String>,
    pub(crate) targets: BTreeSet<String>,
}

impl FileSetBuilder {
    pub(crate) fn set_named_set(&mut self, named_set: NamedSetOfFiles) {
        self.named_set = Some(named_set);
    }

    pub(crate) fn set_config_id(&mut self, config_id: impl Into<String>) {
        self.config_id = Some(config_id.into());
    }

    pub(crate) fn add_output_group(&mut self, group: impl Into<String>) {
        self.output_groups.insert(group.into());
    }

    pub(crate) fn add_target(&mut self, target: impl Into<String>) {
        self.targets.insert(target.into());
    }

    /// Inherit attribution from a parent set that references this one.
    pub(crate) fn update_from_parent(&mut self, parent: &ParentAttribution) {
        if self.config_id.is_none() {
            self.config_id.clone_from(&parent.config_id);
        }
        self.output_groups
            .extend(parent.output_groups.iter().cloned());
        self.targets.extend(parent.targets.iter().cloned());
    }

    /// Ids of the nested sets this one references.
    pub(crate) fn child_ids(&self) -> Vec<String> {
        self.named_set
            .as_ref()
            .map(|set| set.file_sets.iter().map(|id| id.id.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn attribution(&self) -> ParentAttribution {
        ParentAttribution {
            config_id: self.config_id.clone(),
            output_groups: self.output_groups.clone(),
            targets: self.targets.clone(),
        }
    }

    /// Build the immutable set. Returns `None` if no named-set event ever
    /// delivered files for this id (a dangling reference).
    pub(crate) fn build(&self, id: &str) -> Option<FileSet> {
        let named_set = self.named_set.as_ref()?;
        let artifacts = named_set
            .files
            .iter()
            .map(|f| OutputArtifact {
                path: f.name.clone(),
                uri: f.uri.clone(),
            })
            .collect();
        Some(FileSet {
            id: id.to_string(),
            artifacts,
            output_groups: self.output_groups.clone(),
            targets: self.targets.clone(),
        })
    }
}

/// Attribution snapshot used to propagate parent data to nested sets.
#[derive(Debug, Clone)]
pub(crate) struct ParentAttribution {
    pub(crate) config_id: Option<String>,
    pub(crate) output_groups: BTreeSet<String>,
    pub(crate) targets: BTreeSet<String>,
}
