//! Containerized builds
//!
//! [`ContainerBuildExecutor`] turns one [`BuildBatch`] into one container
//! run:
//!
//! 1. Collect the workspace, its path dependencies and, for historical
//!    revisions, the git root, and mount their common ancestor at `/src`.
//! 2. For historical revisions, locate the git store (following submodule
//!    pointers) and try to fetch the configured remote.
//! 3. Create the per-revision Cargo cache volume and make sure the image
//!    is present.
//! 4. Create the container, stream its output through a [`BuildLog`],
//!    and wait for it, racing the build [`Interrupt`].
//! 5. Map the exit code to artifacts or a `BuildFailed` error.
//!
//! The container is owned by a guard from creation to removal, so it is
//! removed even when the build future is dropped half way.

use crate::build::batch::{self, BuildBatch};
use crate::build::interrupt::Interrupt;
use crate::build::log::{stderr_sink, BuildLog, LogSink};
use crate::build::mount::MountLayout;
use crate::build::{driver_env, features_env, Compiler, DRIVER_PHASE};
use crate::cache::volume::volume_safe;
use crate::cache::{ArtifactCache, CacheVolume};
use crate::config::options::BuildOptions;
use crate::error::{CwbuildError, CwbuildResult};
use crate::git::{self, GitLocation};
use crate::manifest;
use crate::orchestration::{ContainerRunSpec, ContainerRuntime};
use crate::source::{CompiledArtifact, SourceSpec};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Mount point of the source tree
pub const SRC_MOUNT: &str = "/src";
/// Mount point of the driver script
pub const DRIVER_MOUNT: &str = "/build/driver";
/// Mount point of the host output directory
pub const OUTPUT_MOUNT: &str = "/output";
const KNOWN_HOSTS_MOUNT: &str = "/root/.ssh/known_hosts";
const AGENT_SOCKET_MOUNT: &str = "/ssh_agent_socket";

/// Git state a historical build needs inside the container
#[derive(Debug, Clone)]
struct GitContext {
    location: GitLocation,
}

impl GitContext {
    /// Locate the repository for `workspace` and fetch, unless disabled.
    ///
    /// Fetch failures are logged and ignored; the build then sees whatever
    /// history is already local.
    async fn prepare(workspace: &Path, options: &BuildOptions) -> CwbuildResult<Self> {
        let location = GitLocation::discover(workspace)?.require_present(workspace)?;
        if location.is_submodule {
            debug!(
                "Workspace is inside submodule {} of {}",
                location.submodule_dir,
                location.root_repo.display()
            );
        }

        if options.no_fetch {
            debug!("Skipping git fetch (no_fetch)");
        } else if let Err(e) = git::fetch(location.work_tree(), &options.git_remote).await {
            warn!("{}; building from local history", e);
        }

        Ok(Self { location })
    }
}

/// Removes the container on drop unless disarmed
struct ContainerGuard {
    runtime: Arc<dyn ContainerRuntime>,
    id: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(runtime: Arc<dyn ContainerRuntime>, id: String) -> Self {
        Self {
            runtime,
            id,
            armed: true,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    /// Remove the container now and stop guarding it
    async fn remove(mut self) {
        if let Err(e) = self.runtime.remove(&self.id).await {
            warn!("Failed to remove container {}: {}", self.id, e);
        }
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if self.armed {
            debug!("Reaping container {}", self.id);
            self.runtime.reap(&self.id);
        }
    }
}

/// Runs one batch in one container
pub struct ContainerBuildExecutor {
    options: BuildOptions,
    runtime: Arc<dyn ContainerRuntime>,
    cache: ArtifactCache,
    interrupt: Interrupt,
}

impl ContainerBuildExecutor {
    pub fn new(options: BuildOptions, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let cache = ArtifactCache::new(&options.output_dir, options.caching);
        Self {
            options,
            runtime,
            cache,
            interrupt: Interrupt::new(),
        }
    }

    /// Stop running containers when `interrupt` fires
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Build every crate in `batch`, returning artifacts keyed by crate
    pub async fn run(
        &self,
        batch: &BuildBatch,
        log: &BuildLog,
    ) -> CwbuildResult<BTreeMap<String, CompiledArtifact>> {
        let crates = batch.crate_names();
        info!(
            "Building [{}] at {} in {}",
            crates.join(", "),
            batch.revision,
            batch.workspace.display()
        );

        let spec = self.prepare(batch).await?;
        self.ensure_image().await?;
        self.cache.ensure_output_dir()?;
        if self.interrupt.is_triggered() {
            return Err(CwbuildError::Interrupted);
        }

        let id = self.runtime.create(&spec).await?;
        let guard = ContainerGuard::new(Arc::clone(&self.runtime), id);
        debug!("Container {} running as {}", spec.name, guard.id());

        let on_output = |line: String| log.line(line);
        let code = tokio::select! {
            code = self.runtime.start_attached(guard.id(), &on_output) => code,
            _ = self.interrupt.triggered() => {
                warn!("Interrupted, stopping container {}", spec.name);
                if let Err(e) = self.runtime.kill(guard.id()).await {
                    debug!("Kill failed: {}", e);
                }
                guard.remove().await;
                return Err(CwbuildError::Interrupted);
            }
        };

        guard.remove().await;
        let code = code?;

        if code != 0 {
            log.replay();
            return Err(CwbuildError::BuildFailed {
                crates,
                code,
                logs: log.contents(),
            });
        }

        let mut artifacts = BTreeMap::new();
        for crate_name in crates {
            let artifact = self
                .cache
                .existing(&crate_name, &batch.revision)?
                .ok_or_else(|| CwbuildError::ArtifactMissing {
                    path: self.cache.path_for(&crate_name, &batch.revision),
                    crate_name: crate_name.clone(),
                })?;
            artifacts.insert(crate_name, artifact);
        }

        info!("Built {} artifact(s) at {}", artifacts.len(), batch.revision);
        Ok(artifacts)
    }

    /// Resolve mounts and git state and render the container spec.
    ///
    /// Creates the cache volume as a side effect.
    pub async fn prepare(&self, batch: &BuildBatch) -> CwbuildResult<ContainerRunSpec> {
        let script = self
            .options
            .script
            .as_deref()
            .ok_or(CwbuildError::BuildScriptMissing)?;

        let dependencies = manifest::path_dependencies(&batch.workspace)?;

        let git = if batch.is_head() {
            None
        } else {
            Some(GitContext::prepare(&batch.workspace, &self.options).await?)
        };

        let layout = MountLayout::compute(
            &batch.workspace,
            &dependencies,
            git.as_ref().map(|g| g.location.root_repo.as_path()),
        )
        .ok_or_else(|| {
            CwbuildError::Internal(format!(
                "no common mount root for {}",
                batch.workspace.display()
            ))
        })?;
        debug!("Mount root: {}", layout.root.display());

        let volume = CacheVolume::new(&self.options.cache_volume_prefix, &batch.revision);
        self.runtime
            .volume_create(&volume.name, &volume.labels())
            .await?;

        self.run_spec(batch, script, &layout, git.as_ref(), &volume)
    }

    fn run_spec(
        &self,
        batch: &BuildBatch,
        script: &Path,
        layout: &MountLayout,
        git: Option<&GitContext>,
        volume: &CacheVolume,
    ) -> CwbuildResult<ContainerRunSpec> {
        let options = &self.options;
        let root = layout.root.to_string_lossy().into_owned();

        let mut readonly_mounts = BTreeMap::new();
        let mut writable_mounts = BTreeMap::new();

        readonly_mounts.insert(
            script.to_string_lossy().into_owned(),
            DRIVER_MOUNT.to_string(),
        );
        // Historical builds check out into scratch space and never touch
        // the mounted tree; HEAD builds write target/ into it
        if batch.is_head() {
            writable_mounts.insert(root, SRC_MOUNT.to_string());
        } else {
            readonly_mounts.insert(root, SRC_MOUNT.to_string());
        }
        if let Some(ref known_hosts) = options.ssh_known_hosts {
            readonly_mounts.insert(
                known_hosts.to_string_lossy().into_owned(),
                KNOWN_HOSTS_MOUNT.to_string(),
            );
        }
        if let Some(ref socket) = options.ssh_agent_socket {
            readonly_mounts.insert(
                socket.to_string_lossy().into_owned(),
                AGENT_SOCKET_MOUNT.to_string(),
            );
        }

        writable_mounts.insert(
            options.output_dir.to_string_lossy().into_owned(),
            OUTPUT_MOUNT.to_string(),
        );
        writable_mounts.insert(volume.name.clone(), options.cargo_home.clone());

        let mut env = driver_env(options);
        env.insert("SRC_SUBDIR".to_string(), layout.src_subdir.clone());
        env.insert(
            "GIT_SUBDIR".to_string(),
            git.map(|g| g.location.submodule_dir.clone())
                .unwrap_or_default(),
        );
        if let Some(ref subdir) = layout.git_root_subdir {
            env.insert("GIT_ROOT_SUBDIR".to_string(), subdir.clone());
        }
        env.insert("BUILD_OUTPUT".to_string(), OUTPUT_MOUNT.to_string());
        env.insert("CARGO_HOME".to_string(), options.cargo_home.clone());
        if options.ssh_agent_socket.is_some() {
            env.insert("SSH_AUTH_SOCK".to_string(), AGENT_SOCKET_MOUNT.to_string());
        }
        if let Some(features) = features_env(batch)? {
            env.insert("BUILD_FEATURES".to_string(), features);
        }

        let mut command = vec![
            options.interpreter.clone(),
            DRIVER_MOUNT.to_string(),
            DRIVER_PHASE.to_string(),
            batch.revision.clone(),
        ];
        command.extend(batch.crate_names());

        Ok(ContainerRunSpec {
            name: container_name(&batch.revision),
            image: options.image.clone(),
            workdir: SRC_MOUNT.to_string(),
            readonly_mounts,
            writable_mounts,
            env,
            command,
        })
    }

    async fn ensure_image(&self) -> CwbuildResult<()> {
        if self.runtime.image_exists(&self.options.image).await? {
            return Ok(());
        }
        self.runtime.pull(&self.options.image).await
    }
}

/// `cwbuild-<revision>-<8 hex>`
fn container_name(revision: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("cwbuild-{}-{}", volume_safe(revision), &suffix[..8])
}

/// Compiler that runs one container per batch
pub struct ContainerCompiler {
    executor: ContainerBuildExecutor,
    cache: ArtifactCache,
    default_workspace: Option<PathBuf>,
    cwd: PathBuf,
    quiet: bool,
    sink: LogSink,
}

impl ContainerCompiler {
    pub fn new(options: BuildOptions, runtime: Arc<dyn ContainerRuntime>) -> Self {
        let cache = ArtifactCache::new(&options.output_dir, options.caching);
        Self {
            cache,
            default_workspace: options.workspace.clone(),
            cwd: options.cwd.clone(),
            quiet: options.quiet,
            sink: stderr_sink(),
            executor: ContainerBuildExecutor::new(options, runtime),
        }
    }

    /// Send build output to `sink` instead of stderr
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.executor = self.executor.with_interrupt(interrupt);
        self
    }
}

#[async_trait]
impl Compiler for ContainerCompiler {
    async fn build_many(&self, sources: Vec<SourceSpec>) -> CwbuildResult<Vec<CompiledArtifact>> {
        let mut plan = batch::partition(
            sources,
            self.default_workspace.as_deref(),
            &self.cwd,
            &self.cache,
        )?;
        if plan.is_fully_cached() {
            info!("All {} artifact(s) cached", plan.cached_count());
            return plan.into_artifacts();
        }

        for batch in plan.take_batches() {
            let log = BuildLog::new(Arc::clone(&self.sink), self.quiet);
            let artifacts = self.executor.run(&batch, &log).await?;
            for member in &batch.members {
                // Duplicate members share one artifact
                let artifact = artifacts.get(&member.crate_name).cloned().ok_or_else(|| {
                    CwbuildError::Internal(format!("{} missing from batch", member.crate_name))
                })?;
                plan.fill(member.index, artifact);
            }
        }

        plan.into_artifacts()
    }

    fn name(&self) -> &'static str {
        "container"
    }
}
