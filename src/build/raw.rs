//! Host builds without a container
//!
//! Runs the driver script directly with the host toolchain, one process
//! per source. Historical revisions are checked out into a temporary git
//! worktree that is removed again after the build.

use crate::build::batch::{self, BatchMember, BuildBatch};
use crate::build::interrupt::Interrupt;
use crate::build::log::{stderr_sink, BuildLog, LogSink};
use crate::build::{driver_env, features_env, Compiler, DRIVER_PHASE};
use crate::cache::ArtifactCache;
use crate::config::options::BuildOptions;
use crate::error::{CwbuildError, CwbuildResult};
use crate::git::{self, GitLocation, Worktree};
use crate::orchestration::stream_child_output;
use crate::paths;
use crate::source::{CompiledArtifact, SourceSpec};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub struct RawCompiler {
    options: BuildOptions,
    cache: ArtifactCache,
    sink: LogSink,
    interrupt: Interrupt,
}

impl RawCompiler {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            cache: ArtifactCache::new(&options.output_dir, options.caching),
            options,
            sink: stderr_sink(),
            interrupt: Interrupt::new(),
        }
    }

    /// Send build output to `sink` instead of stderr
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.sink = sink;
        self
    }

    /// Kill the driver process when `interrupt` fires
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Build one member of `batch` on the host
    async fn build_member(
        &self,
        batch: &BuildBatch,
        member: &BatchMember,
    ) -> CwbuildResult<CompiledArtifact> {
        let script = self
            .options
            .script
            .as_deref()
            .ok_or(CwbuildError::BuildScriptMissing)?;

        if self.interrupt.is_triggered() {
            return Err(CwbuildError::Interrupted);
        }

        // Only the member itself; one process builds one crate
        let single = BuildBatch {
            workspace: batch.workspace.clone(),
            revision: batch.revision.clone(),
            members: vec![member.clone()],
        };

        if single.is_head() {
            return self.run_driver(&single, script, &single.workspace).await;
        }

        let location = GitLocation::discover(&single.workspace)?.require_present(&single.workspace)?;
        let work_tree = location.work_tree().to_path_buf();
        if self.options.no_fetch {
            debug!("Skipping git fetch (no_fetch)");
        } else if let Err(e) = git::fetch(&work_tree, &self.options.git_remote).await {
            warn!("{}; building from local history", e);
        }

        let subdir = paths::relative_slash(&single.workspace, &work_tree).ok_or_else(|| {
            CwbuildError::Internal(format!(
                "{} is outside {}",
                single.workspace.display(),
                work_tree.display()
            ))
        })?;

        let worktree = Worktree::add(&work_tree, &single.revision).await?;
        let workdir = worktree.path().join(subdir);
        let result = self.run_driver(&single, script, &workdir).await;
        worktree.remove().await;
        result
    }

    async fn run_driver(
        &self,
        batch: &BuildBatch,
        script: &Path,
        workdir: &Path,
    ) -> CwbuildResult<CompiledArtifact> {
        let crates = batch.crate_names();
        info!(
            "Building {}@{} on the host in {}",
            crates.join(", "),
            batch.revision,
            workdir.display()
        );
        self.cache.ensure_output_dir()?;

        let mut env = driver_env(&self.options);
        env.insert("BUILD_RAW".to_string(), "1".to_string());
        env.insert(
            "BUILD_OUTPUT".to_string(),
            self.options.output_dir.to_string_lossy().into_owned(),
        );
        if let Some(features) = features_env(batch)? {
            env.insert("BUILD_FEATURES".to_string(), features);
        }

        debug!(
            "Executing: {} {} {} {} {:?}",
            self.options.interpreter,
            script.display(),
            DRIVER_PHASE,
            batch.revision,
            crates
        );
        let mut child = Command::new(&self.options.interpreter)
            .arg(script)
            .arg(DRIVER_PHASE)
            .arg(&batch.revision)
            .args(&crates)
            .current_dir(workdir)
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CwbuildError::command_failed(script.display().to_string(), e))?;

        let log = BuildLog::new(Arc::clone(&self.sink), self.options.quiet);
        let on_output = |line: String| log.line(line);

        let status = tokio::select! {
            _ = stream_child_output(&mut child, &on_output) => {
                child
                    .wait()
                    .await
                    .map_err(|e| CwbuildError::command_failed(script.display().to_string(), e))?
            }
            _ = self.interrupt.triggered() => {
                warn!("Interrupted, stopping build");
                if let Err(e) = child.kill().await {
                    debug!("Kill failed: {}", e);
                }
                return Err(CwbuildError::Interrupted);
            }
        };

        // A signal-terminated driver has no code
        let code = status.code().unwrap_or(-1);
        if code != 0 {
            log.replay();
            return Err(CwbuildError::BuildFailed {
                crates,
                code,
                logs: log.contents(),
            });
        }

        let member = &batch.members[0].crate_name;
        self.cache
            .existing(member, &batch.revision)?
            .ok_or_else(|| CwbuildError::ArtifactMissing {
                crate_name: member.clone(),
                path: self.cache.path_for(member, &batch.revision),
            })
    }
}

#[async_trait]
impl Compiler for RawCompiler {
    async fn build_many(&self, sources: Vec<SourceSpec>) -> CwbuildResult<Vec<CompiledArtifact>> {
        let mut plan = batch::partition(
            sources,
            self.options.workspace.as_deref(),
            &self.options.cwd,
            &self.cache,
        )?;

        for batch in plan.take_batches() {
            for member in &batch.members {
                let artifact = self.build_member(&batch, member).await?;
                plan.fill(member.index, artifact);
            }
        }

        plan.into_artifacts()
    }

    fn name(&self) -> &'static str {
        "raw"
    }
}
