//! Build inputs and outputs
//!
//! A [`SourceSpec`] names one crate in one workspace at one git revision.
//! A [`CompiledArtifact`] is the WASM file that build produced plus its
//! SHA-256 digest. The on-disk name of every artifact is derived from the
//! crate and revision alone, which is what makes the output directory
//! usable as a cache.

use crate::error::{CwbuildError, CwbuildResult};
use crate::paths;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Revision meaning "the working tree as it is, uncommitted changes included"
pub const HEAD: &str = "HEAD";

/// One buildable unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Crate (package) name inside the workspace
    #[serde(rename = "crate")]
    pub crate_name: String,

    /// Workspace root; falls back to the configured default workspace
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    /// Git ref to build; falls back to `HEAD`
    #[serde(default)]
    pub revision: Option<String>,

    /// Cargo features to enable for this crate
    #[serde(default)]
    pub features: Vec<String>,
}

impl SourceSpec {
    /// Create a spec for a crate with every other field defaulted
    pub fn new(crate_name: impl Into<String>) -> Self {
        Self {
            crate_name: crate_name.into(),
            workspace: None,
            revision: None,
            features: Vec::new(),
        }
    }

    pub fn workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    /// Fill unset fields in place and make the workspace absolute against
    /// `cwd`.
    ///
    /// Fails with `NoCrateSelected` on an empty crate name and with
    /// `MissingWorkspace` when neither the spec nor the caller names one.
    pub fn fill_defaults(
        &mut self,
        default_workspace: Option<&Path>,
        cwd: &Path,
    ) -> CwbuildResult<()> {
        if self.crate_name.trim().is_empty() {
            return Err(CwbuildError::NoCrateSelected);
        }
        let workspace = self
            .workspace
            .as_deref()
            .or(default_workspace)
            .ok_or_else(|| {
                CwbuildError::MissingWorkspace(format!(
                    "no workspace given for crate {} and no default configured",
                    self.crate_name
                ))
            })?;
        self.workspace = Some(paths::absolutize(workspace, cwd));
        if self.revision.as_deref().map_or(true, str::is_empty) {
            self.revision = Some(HEAD.to_string());
        }
        Ok(())
    }

    /// Revision to build (`HEAD` when unset)
    pub fn revision_or_head(&self) -> &str {
        self.revision.as_deref().unwrap_or(HEAD)
    }
}

/// Parses `crate` or `crate@revision`
impl FromStr for SourceSpec {
    type Err = CwbuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, revision) = match s.split_once('@') {
            Some((name, revision)) => (name, Some(revision)),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(CwbuildError::NoCrateSelected);
        }
        let mut spec = SourceSpec::new(name);
        if let Some(revision) = revision.filter(|r| !r.is_empty()) {
            spec = spec.revision(revision);
        }
        Ok(spec)
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.crate_name, self.revision_or_head())
    }
}

/// A compiled contract: where the WASM lives and what it hashes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledArtifact {
    pub code_path: PathBuf,
    /// Lowercase hex SHA-256 of the file contents
    pub code_hash: String,
}

impl CompiledArtifact {
    /// Hash the file at `path` and wrap it
    pub fn from_file(path: &Path) -> CwbuildResult<Self> {
        Ok(Self {
            code_path: path.to_path_buf(),
            code_hash: hash_file(path)?,
        })
    }

    /// The artifact location as a `file://` URL
    pub fn code_url(&self) -> String {
        format!("file://{}", self.code_path.display())
    }
}

/// Make a revision safe for use in a file name
pub fn sanitize(revision: &str) -> String {
    revision.replace('/', "_")
}

/// `<crate>@<sanitized revision>.wasm`
pub fn artifact_file_name(crate_name: &str, revision: &str) -> String {
    format!("{}@{}.wasm", crate_name, sanitize(revision))
}

/// SHA-256 of a file's bytes, lowercase hex
pub fn hash_file(path: &Path) -> CwbuildResult<String> {
    let contents = std::fs::read(path)
        .map_err(|e| CwbuildError::io(format!("reading artifact {}", path.display()), e))?;
    Ok(hash_bytes(&contents))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
