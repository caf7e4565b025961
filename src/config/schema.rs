//! Configuration schema for cwbuild
//!
//! Global configuration is stored at `~/.config/cwbuild/config.toml`; a
//! project may add a `cwbuild.toml` that overrides it.

use crate::orchestration::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// What to build and where to put it
    pub build: BuildConfig,

    /// Build container settings
    pub container: ContainerConfig,

    /// Rust toolchain settings inside the build
    pub toolchain: ToolchainConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Default workspace for sources that don't name one
    pub workspace: Option<PathBuf>,

    /// Where artifacts are written (default: `<workspace>/wasm`)
    pub output_dir: Option<PathBuf>,

    /// Reuse existing artifacts instead of rebuilding
    pub caching: bool,

    /// Run the build script on the host instead of in a container
    pub raw: bool,

    /// Only show build output when a build fails
    pub quiet: bool,

    /// Ask the build script for verbose output
    pub verbose: bool,

    /// Skip `git fetch` before historical builds
    pub no_fetch: bool,

    /// Remote to fetch history from
    pub git_remote: String,

    /// Build driver script
    pub script: Option<PathBuf>,

    /// Program that runs the build script
    pub interpreter: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            output_dir: None,
            caching: true,
            raw: false,
            quiet: false,
            verbose: false,
            no_fetch: false,
            git_remote: "origin".to_string(),
            script: None,
            interpreter: "sh".to_string(),
        }
    }
}

/// Build container configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Container engine
    pub engine: Engine,

    /// Builder image
    pub image: String,

    /// Prefix of the per-revision Cargo cache volumes
    pub cache_volume_prefix: String,

    /// Cargo home inside the image
    pub cargo_home: String,

    /// known_hosts file for fetching private git dependencies
    pub ssh_known_hosts: Option<PathBuf>,

    /// Forward the host SSH agent into the build
    pub ssh_agent: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            image: "docker.io/library/rust:1.79-slim".to_string(),
            cache_volume_prefix: "cwbuild-cargo".to_string(),
            cargo_home: "/usr/local/cargo".to_string(),
            ssh_known_hosts: None,
            ssh_agent: true,
        }
    }
}

/// Toolchain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Toolchain name passed as RUSTUP_TOOLCHAIN
    pub version: Option<String>,

    /// Owner for produced artifacts (default: current user)
    pub build_uid: Option<u32>,

    /// Group for produced artifacts (default: current group)
    pub build_gid: Option<u32>,

    /// Cargo HTTP timeout in seconds
    pub http_timeout_secs: u32,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            version: None,
            build_uid: None,
            build_gid: None,
            http_timeout_secs: 240,
        }
    }
}
