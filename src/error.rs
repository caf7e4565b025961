//! Error types for cwbuild
//!
//! All modules use `CwbuildResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cwbuild operations
pub type CwbuildResult<T> = Result<T, CwbuildError>;

/// All errors that can occur in cwbuild
#[derive(Error, Debug)]
pub enum CwbuildError {
    // Build configuration errors
    #[error("Missing workspace: {0}")]
    MissingWorkspace(String),

    #[error("No crate selected for build")]
    NoCrateSelected,

    #[error("Build script not configured")]
    BuildScriptMissing,

    #[error("No .git found at or above {0}, cannot build a historical revision")]
    GitDirNotFound(PathBuf),

    #[error("Invalid manifest {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    // Git errors
    #[error("git fetch {remote} failed: {reason}")]
    FetchFailed { remote: String, reason: String },

    // Container errors
    #[error("Container engine not found: {0}")]
    EngineNotFound(String),

    #[error("Container launch failed: {0}")]
    ContainerLaunch(String),

    #[error("Image pull failed: {image}: {reason}")]
    ImagePull { image: String, reason: String },

    #[error("Build of [{}] failed with exit code {code}", crates.join(", "))]
    BuildFailed {
        crates: Vec<String>,
        code: i32,
        logs: String,
    },

    #[error("Build of {crate_name} succeeded but no artifact at {path}")]
    ArtifactMissing { crate_name: String, path: PathBuf },

    #[error("Build interrupted")]
    Interrupted,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl CwbuildError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Captured build output, if this error carries any
    pub fn logs(&self) -> Option<&str> {
        match self {
            Self::BuildFailed { logs, .. } if !logs.is_empty() => Some(logs),
            _ => None,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ContainerLaunch(_) | Self::FetchFailed { .. } | Self::ImagePull { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::BuildScriptMissing => {
                Some("Set build.script in cwbuild.toml or pass --script <PATH>")
            }
            Self::GitDirNotFound(_) => Some("Build HEAD instead, or run from a git checkout"),
            Self::NoCrateSelected => Some("Pass at least one crate name, e.g. cwbuild build kv"),
            Self::EngineNotFound(_) | Self::ContainerLaunch(_) => {
                Some("Check the container engine with: cwbuild status")
            }
            Self::ArtifactMissing { .. } => {
                Some("The build script must write <crate>@<revision>.wasm into the output directory")
            }
            _ => None,
        }
    }
}
