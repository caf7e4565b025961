//! Runtime factory for the configured container engine

use crate::orchestration::docker::DockerRuntime;
use crate::orchestration::podman::PodmanRuntime;
use crate::orchestration::runtime::ContainerRuntime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Container engine used for builds
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Rootless or rootful Podman
    #[default]
    Podman,
    /// Docker daemon
    Docker,
}

impl Engine {
    /// Name of the engine binary
    pub fn binary(&self) -> &'static str {
        match self {
            Engine::Podman => "podman",
            Engine::Docker => "docker",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// Create the runtime for an engine
pub fn create_runtime(engine: Engine) -> Arc<dyn ContainerRuntime> {
    match engine {
        Engine::Podman => Arc::new(PodmanRuntime::new()),
        Engine::Docker => Arc::new(DockerRuntime::new()),
    }
}
