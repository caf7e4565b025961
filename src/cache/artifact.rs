//! Artifact lookup in the output directory

use crate::error::{CwbuildError, CwbuildResult};
use crate::source::{artifact_file_name, CompiledArtifact};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Finds previously built artifacts by their deterministic file name.
///
/// Hashes are recomputed from the file on every hit and never stored, so a
/// file replaced out of band is reported with its current digest.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    output_dir: PathBuf,
    enabled: bool,
}

impl ArtifactCache {
    pub fn new(output_dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            enabled,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Where the artifact for `crate_name` at `revision` is (or will be) written
    pub fn path_for(&self, crate_name: &str, revision: &str) -> PathBuf {
        self.output_dir.join(artifact_file_name(crate_name, revision))
    }

    /// A cached artifact, or `None` on a miss or when caching is disabled
    pub fn get(&self, crate_name: &str, revision: &str) -> CwbuildResult<Option<CompiledArtifact>> {
        if !self.enabled {
            return Ok(None);
        }
        self.existing(crate_name, revision)
    }

    /// The artifact if its file exists, regardless of the caching switch.
    ///
    /// Used after a build, when the file is expected to be fresh.
    pub fn existing(
        &self,
        crate_name: &str,
        revision: &str,
    ) -> CwbuildResult<Option<CompiledArtifact>> {
        let path = self.path_for(crate_name, revision);
        if !path.is_file() {
            return Ok(None);
        }
        debug!("Artifact present: {}", path.display());
        CompiledArtifact::from_file(&path).map(Some)
    }

    /// Every `.wasm` file in the output directory, sorted by name
    pub fn list(&self) -> CwbuildResult<Vec<CompiledArtifact>> {
        if !self.output_dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.output_dir).map_err(|e| {
            CwbuildError::io(format!("listing {}", self.output_dir.display()), e)
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "wasm"))
            .collect();
        paths.sort();

        paths.iter().map(|p| CompiledArtifact::from_file(p)).collect()
    }

    /// Create the output directory if needed
    pub fn ensure_output_dir(&self) -> CwbuildResult<()> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            CwbuildError::io(format!("creating {}", self.output_dir.display()), e)
        })
    }
}
