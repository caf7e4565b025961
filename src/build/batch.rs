//! Grouping sources into container runs
//!
//! Sources sharing a workspace and revision are compiled by one container
//! so they share its warm Cargo cache. Cache hits never reach a batch.
//! Every member remembers its position in the caller's input, and results
//! are written back by that index.

use crate::cache::ArtifactCache;
use crate::error::{CwbuildError, CwbuildResult};
use crate::paths;
use crate::source::{CompiledArtifact, SourceSpec, HEAD};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One crate scheduled in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchMember {
    /// Position of the source in the `build_many` input
    pub index: usize,
    pub crate_name: String,
    pub features: Vec<String>,
}

/// Crates built together in a single container invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBatch {
    pub workspace: PathBuf,
    pub revision: String,
    pub members: Vec<BatchMember>,
}

impl BuildBatch {
    /// Whether this batch builds the working tree as-is
    pub fn is_head(&self) -> bool {
        self.revision == HEAD
    }

    /// Distinct crate names in input order
    pub fn crate_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.members.len());
        for member in &self.members {
            if !names.contains(&member.crate_name) {
                names.push(member.crate_name.clone());
            }
        }
        names
    }

    /// Requested features per crate; crates without any are left out
    pub fn features(&self) -> BTreeMap<String, Vec<String>> {
        let mut features: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for member in self.members.iter().filter(|m| !m.features.is_empty()) {
            let entry = features.entry(member.crate_name.clone()).or_default();
            for feature in &member.features {
                if !entry.contains(feature) {
                    entry.push(feature.clone());
                }
            }
        }
        features
    }
}

/// Result slots plus the batches still to run
#[derive(Debug)]
pub struct BuildPlan {
    slots: Vec<Option<CompiledArtifact>>,
    batches: Vec<BuildBatch>,
}

impl BuildPlan {
    /// True when every slot was served from cache
    pub fn is_fully_cached(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn batches(&self) -> &[BuildBatch] {
        &self.batches
    }

    /// Hand the batches to the caller, leaving the slots in place
    pub fn take_batches(&mut self) -> Vec<BuildBatch> {
        std::mem::take(&mut self.batches)
    }

    pub fn cached_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Store the result for input `index`
    pub fn fill(&mut self, index: usize, artifact: CompiledArtifact) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(artifact);
        }
    }

    /// Results in input order; fails if any slot was never filled
    pub fn into_artifacts(self) -> CwbuildResult<Vec<CompiledArtifact>> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    CwbuildError::Internal(format!("no artifact produced for source #{}", index))
                })
            })
            .collect()
    }
}

/// Default each source and group the ones missing from the cache.
///
/// All sources are validated before anything is returned, so configuration
/// errors surface before any container is launched. Batches appear in the
/// order their `(workspace, revision)` key was first seen. Relative
/// workspaces are taken against `cwd`.
pub fn partition(
    sources: Vec<SourceSpec>,
    default_workspace: Option<&Path>,
    cwd: &Path,
    cache: &ArtifactCache,
) -> CwbuildResult<BuildPlan> {
    let mut defaulted = Vec::with_capacity(sources.len());
    for mut source in sources {
        source.fill_defaults(default_workspace, cwd)?;
        defaulted.push(source);
    }

    let mut slots = vec![None; defaulted.len()];
    let mut batches: Vec<BuildBatch> = Vec::new();
    let mut by_key: HashMap<(PathBuf, String), usize> = HashMap::new();

    for (index, source) in defaulted.into_iter().enumerate() {
        let revision = source.revision_or_head().to_string();

        if let Some(artifact) = cache.get(&source.crate_name, &revision)? {
            info!("Using cached {}@{}", source.crate_name, revision);
            slots[index] = Some(artifact);
            continue;
        }

        let workspace = source
            .workspace
            .as_deref()
            .map(paths::normalize)
            .ok_or_else(|| CwbuildError::MissingWorkspace(source.crate_name.clone()))?;

        let member = BatchMember {
            index,
            crate_name: source.crate_name,
            features: source.features,
        };

        let key = (workspace, revision);
        match by_key.get(&key) {
            Some(&at) => batches[at].members.push(member),
            None => {
                by_key.insert(key.clone(), batches.len());
                let (workspace, revision) = key;
                batches.push(BuildBatch {
                    workspace,
                    revision,
                    members: vec![member],
                });
            }
        }
    }

    debug!(
        "Partitioned into {} batch(es), {} cached",
        batches.len(),
        slots.iter().filter(|s| s.is_some()).count()
    );

    Ok(BuildPlan { slots, batches })
}
