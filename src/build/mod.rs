//! Compiling contracts
//!
//! [`Compiler`] is the entry point. Two strategies implement it:
//!
//! - [`ContainerCompiler`] groups sources into batches and runs one build
//!   container per batch.
//! - [`RawCompiler`] runs the driver script on the host, one source at a
//!   time, checking historical revisions out into temporary worktrees.
//!
//! Both share artifact naming and the cache lookup in [`batch::partition`],
//! so callers get the same results from either.

pub mod batch;
pub mod container;
pub mod interrupt;
pub mod log;
pub mod mount;
pub mod raw;

pub use batch::{BatchMember, BuildBatch, BuildPlan};
pub use container::{ContainerBuildExecutor, ContainerCompiler};
pub use interrupt::Interrupt;
pub use log::{stderr_sink, BuildLog, LogSink};
pub use mount::{common_mount_root, MountLayout};
pub use raw::RawCompiler;

use crate::config::options::BuildOptions;
use crate::error::{CwbuildError, CwbuildResult};
use crate::orchestration::create_runtime;
use crate::source::{CompiledArtifact, SourceSpec};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Driver subcommand that compiles and optimizes the listed crates
pub const DRIVER_PHASE: &str = "phase1";

/// A build strategy
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Build a single source
    async fn build(&self, source: SourceSpec) -> CwbuildResult<CompiledArtifact> {
        self.build_many(vec![source])
            .await?
            .pop()
            .ok_or_else(|| CwbuildError::Internal("build returned no artifact".to_string()))
    }

    /// Build every source; `result[i]` belongs to `sources[i]`
    async fn build_many(&self, sources: Vec<SourceSpec>) -> CwbuildResult<Vec<CompiledArtifact>>;

    /// Strategy name for display
    fn name(&self) -> &'static str;
}

/// Create the compiler selected by `options.raw`
pub fn create_compiler(
    options: BuildOptions,
    sink: LogSink,
    interrupt: Interrupt,
) -> Box<dyn Compiler> {
    if options.raw {
        Box::new(
            RawCompiler::new(options)
                .with_log_sink(sink)
                .with_interrupt(interrupt),
        )
    } else {
        let runtime = create_runtime(options.engine);
        Box::new(
            ContainerCompiler::new(options, runtime)
                .with_log_sink(sink)
                .with_interrupt(interrupt),
        )
    }
}

/// Environment understood by the driver script in both strategies
pub(crate) fn driver_env(options: &BuildOptions) -> BTreeMap<String, String> {
    let flag = |on: bool| if on { "1" } else { "0" }.to_string();

    let mut env = BTreeMap::from([
        ("BUILD_UID".to_string(), options.uid.to_string()),
        ("BUILD_GID".to_string(), options.gid.to_string()),
        ("GIT_REMOTE".to_string(), options.git_remote.clone()),
        ("NO_FETCH".to_string(), flag(options.no_fetch)),
        ("VERBOSE".to_string(), flag(options.verbose)),
        (
            "CARGO_HTTP_TIMEOUT".to_string(),
            options.http_timeout_secs.to_string(),
        ),
        (
            "CARGO_NET_GIT_FETCH_WITH_CLI".to_string(),
            "true".to_string(),
        ),
        ("GIT_PAGER".to_string(), "cat".to_string()),
        ("PAGER".to_string(), "cat".to_string()),
        ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
    ]);

    if let Some(ref toolchain) = options.toolchain {
        env.insert("RUSTUP_TOOLCHAIN".to_string(), toolchain.clone());
    }

    env
}

/// `BUILD_FEATURES` for a batch, when any member asks for features
pub(crate) fn features_env(batch: &BuildBatch) -> CwbuildResult<Option<String>> {
    let features = batch.features();
    if features.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(&features)?))
}
