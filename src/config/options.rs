//! Resolved build options
//!
//! The config file and CLI flags are folded into one immutable
//! [`BuildOptions`] before any build starts. Compilers and executors only
//! ever read this value; nothing downstream consults the environment.

use crate::config::schema::Config;
use crate::orchestration::Engine;
use crate::paths;
use std::path::{Path, PathBuf};

/// Output directory used when none is configured, relative to the workspace
pub const DEFAULT_OUTPUT_DIR: &str = "wasm";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Default workspace for sources without one
    pub workspace: Option<PathBuf>,
    /// Base for relative per-source workspaces
    pub cwd: PathBuf,
    pub output_dir: PathBuf,
    pub caching: bool,
    pub raw: bool,
    pub quiet: bool,
    pub verbose: bool,
    pub no_fetch: bool,
    pub git_remote: String,
    pub script: Option<PathBuf>,
    pub interpreter: String,

    pub engine: Engine,
    pub image: String,
    pub cache_volume_prefix: String,
    pub cargo_home: String,
    pub ssh_known_hosts: Option<PathBuf>,
    pub ssh_agent_socket: Option<PathBuf>,

    pub toolchain: Option<String>,
    pub uid: u32,
    pub gid: u32,
    pub http_timeout_secs: u32,
}

impl BuildOptions {
    /// Resolve `config` with relative paths taken against `base`.
    ///
    /// This is the single place host state is read: the current directory,
    /// the current uid/gid and, when agent forwarding is on, `SSH_AUTH_SOCK`.
    pub fn resolve(config: &Config, base: &Path) -> Self {
        let agent_socket = if config.container.ssh_agent {
            std::env::var_os("SSH_AUTH_SOCK").map(PathBuf::from)
        } else {
            None
        };
        Self::resolve_with(config, base, agent_socket)
    }

    /// Like [`resolve`](Self::resolve) with an explicit agent socket
    pub fn resolve_with(config: &Config, base: &Path, ssh_agent_socket: Option<PathBuf>) -> Self {
        let workspace = config
            .build
            .workspace
            .as_deref()
            .map(|w| paths::absolutize(w, base));

        let output_dir = match &config.build.output_dir {
            Some(dir) => paths::absolutize(dir, base),
            None => workspace
                .as_deref()
                .unwrap_or(base)
                .join(DEFAULT_OUTPUT_DIR),
        };

        let ssh_known_hosts = config
            .container
            .ssh_known_hosts
            .as_deref()
            .map(|p| paths::absolutize(p, base))
            .or_else(|| {
                dirs::home_dir()
                    .map(|home| home.join(".ssh").join("known_hosts"))
                    .filter(|p| p.is_file())
            });

        let cwd = std::env::current_dir()
            .map(|dir| paths::normalize(&dir))
            .unwrap_or_else(|_| base.to_path_buf());

        Self {
            workspace,
            cwd,
            output_dir,
            caching: config.build.caching,
            raw: config.build.raw,
            quiet: config.build.quiet,
            verbose: config.build.verbose,
            no_fetch: config.build.no_fetch,
            git_remote: config.build.git_remote.clone(),
            script: config
                .build
                .script
                .as_deref()
                .map(|s| paths::absolutize(s, base)),
            interpreter: config.build.interpreter.clone(),
            engine: config.container.engine,
            image: config.container.image.clone(),
            cache_volume_prefix: config.container.cache_volume_prefix.clone(),
            cargo_home: config.container.cargo_home.clone(),
            ssh_known_hosts,
            ssh_agent_socket,
            toolchain: config.toolchain.version.clone(),
            uid: config.toolchain.build_uid.unwrap_or_else(current_uid),
            gid: config.toolchain.build_gid.unwrap_or_else(current_gid),
            http_timeout_secs: config.toolchain.http_timeout_secs,
        }
    }
}

#[cfg(unix)]
fn current_uid() -> u32 {
    // SAFETY: getuid has no preconditions and cannot fail
    unsafe { libc::getuid() }
}

#[cfg(unix)]
fn current_gid() -> u32 {
    // SAFETY: getgid has no preconditions and cannot fail
    unsafe { libc::getgid() }
}

#[cfg(not(unix))]
fn current_uid() -> u32 {
    1000
}

#[cfg(not(unix))]
fn current_gid() -> u32 {
    1000
}
