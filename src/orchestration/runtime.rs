//! Container runtime abstraction
//!
//! Provides a trait for the container operations a build needs, implemented
//! once per engine (Podman, Docker) and chosen at construction time.

use crate::error::CwbuildResult;
use crate::orchestration::run_spec::ContainerRunSpec;
use async_trait::async_trait;
use std::collections::HashMap;

/// Information about a named volume
#[derive(Debug, Clone)]
pub struct VolumeInfo {
    /// Volume name
    pub name: String,
    /// Volume labels
    pub labels: HashMap<String, String>,
}

/// Abstract container engine interface
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check if the engine is installed and reachable
    async fn is_available(&self) -> CwbuildResult<bool>;

    /// Check whether an image is present locally
    async fn image_exists(&self, image: &str) -> CwbuildResult<bool>;

    /// Pull an image
    async fn pull(&self, image: &str) -> CwbuildResult<()>;

    /// Create (but do not start) a container and return its ID
    async fn create(&self, spec: &ContainerRunSpec) -> CwbuildResult<String>;

    /// Start a created container, stream its combined output line by line
    /// through `on_output`, and return its exit code once it stops.
    ///
    /// The code is the container's own, whatever it is. A container that
    /// never ran to `exited` is a `ContainerLaunch` error.
    async fn start_attached(
        &self,
        container_id: &str,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> CwbuildResult<i32>;

    /// Kill a container immediately
    async fn kill(&self, container_id: &str) -> CwbuildResult<()>;

    /// Remove a container; a container that no longer exists is not an error
    async fn remove(&self, container_id: &str) -> CwbuildResult<()>;

    /// Best-effort synchronous forced removal.
    ///
    /// Called from drop and unwind paths where nothing can be awaited.
    fn reap(&self, container_id: &str);

    /// Create a volume with labels; an existing volume is left untouched
    async fn volume_create(&self, name: &str, labels: &HashMap<String, String>)
        -> CwbuildResult<()>;

    /// List volumes whose names start with `prefix`
    async fn volume_list(&self, prefix: &str) -> CwbuildResult<Vec<VolumeInfo>>;

    /// Remove a volume; a missing volume is not an error
    async fn volume_remove(&self, name: &str) -> CwbuildResult<()>;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
