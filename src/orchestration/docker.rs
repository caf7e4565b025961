//! Docker container runtime
//!
//! Implements the ContainerRuntime trait with the `docker` CLI. Differs from
//! Podman in image probing (`image inspect`), volume creation (already
//! idempotent) and listing (JSON lines with `k=v,...` label strings).

use crate::error::{CwbuildError, CwbuildResult};
use crate::orchestration::command::EngineCommand;
use crate::orchestration::run_spec::ContainerRunSpec;
use crate::orchestration::runtime::{ContainerRuntime, VolumeInfo};
use crate::orchestration::{build_error_output, parse_label_string};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info};

/// Container runtime using the `docker` CLI
pub struct DockerRuntime {
    cmd: EngineCommand,
}

impl DockerRuntime {
    pub fn new() -> Self {
        Self {
            cmd: EngineCommand::new("docker"),
        }
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn is_available(&self) -> CwbuildResult<bool> {
        if !self.cmd.installed().await {
            return Ok(false);
        }
        // Fails when the daemon is unreachable
        let output = self
            .cmd
            .exec(&["info", "--format", "{{.ServerVersion}}"])
            .await?;
        Ok(output.status.success())
    }

    async fn image_exists(&self, image: &str) -> CwbuildResult<bool> {
        let output = self
            .cmd
            .exec(&["image", "inspect", "--format", "{{.Id}}", image])
            .await?;
        Ok(output.status.success())
    }

    async fn pull(&self, image: &str) -> CwbuildResult<()> {
        info!("Pulling image: {}", image);

        let output = self.cmd.exec(&["pull", image]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(CwbuildError::ImagePull {
                image: image.to_string(),
                reason: build_error_output("", &stderr),
            })
        }
    }

    async fn create(&self, spec: &ContainerRunSpec) -> CwbuildResult<String> {
        let mut args = vec!["create".to_string()];
        args.extend(spec.create_args());

        let args_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.cmd.exec(&args_refs).await?;

        if output.status.success() {
            let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
            debug!(
                "Container created: {}",
                &container_id[..12.min(container_id.len())]
            );
            Ok(container_id)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(CwbuildError::ContainerLaunch(stderr.trim().to_string()))
        }
    }

    async fn start_attached(
        &self,
        container_id: &str,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> CwbuildResult<i32> {
        debug!("Starting container attached: {}", container_id);

        self.cmd.start_attached(container_id, on_output).await
    }

    async fn kill(&self, container_id: &str) -> CwbuildResult<()> {
        debug!("Killing container: {}", container_id);
        self.cmd.exec_ok(&["kill", container_id]).await.map(|_| ())
    }

    async fn remove(&self, container_id: &str) -> CwbuildResult<()> {
        debug!("Removing container: {}", container_id);

        let output = self.cmd.exec(&["rm", "-f", container_id]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_lowercase().contains("no such container") {
                Ok(())
            } else {
                Err(CwbuildError::command_exec("docker rm", stderr))
            }
        }
    }

    fn reap(&self, container_id: &str) {
        self.cmd.exec_blocking_quiet(&["rm", "-f", container_id]);
    }

    async fn volume_create(
        &self,
        name: &str,
        labels: &HashMap<String, String>,
    ) -> CwbuildResult<()> {
        debug!("Creating volume: {}", name);

        // Creating an existing volume is a no-op in Docker
        let mut args = vec!["volume", "create"];

        let label_strings: Vec<String> =
            labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        for label in &label_strings {
            args.push("--label");
            args.push(label);
        }

        args.push(name);

        self.cmd.exec_ok(&args).await.map(|_| ())
    }

    async fn volume_list(&self, prefix: &str) -> CwbuildResult<Vec<VolumeInfo>> {
        let stdout = self
            .cmd
            .exec_ok(&["volume", "ls", "--format", "{{json .}}"])
            .await?;

        let mut result = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            let vol: serde_json::Value = serde_json::from_str(line)?;
            let Some(name) = vol["Name"].as_str() else {
                continue;
            };
            if !name.starts_with(prefix) {
                continue;
            }
            result.push(VolumeInfo {
                name: name.to_string(),
                labels: parse_label_string(vol["Labels"].as_str().unwrap_or_default()),
            });
        }

        Ok(result)
    }

    async fn volume_remove(&self, name: &str) -> CwbuildResult<()> {
        debug!("Removing volume: {}", name);

        let output = self.cmd.exec(&["volume", "rm", "-f", name]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_lowercase().contains("no such volume") {
                Ok(())
            } else {
                Err(CwbuildError::command_exec("docker volume rm", stderr))
            }
        }
    }

    fn runtime_name(&self) -> &'static str {
        "Docker"
    }
}
