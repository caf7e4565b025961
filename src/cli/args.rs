//! CLI argument definitions using clap derive

use crate::orchestration::Engine;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// cwbuild - reproducible contract builds
///
/// Compiles smart-contract crates to WASM inside throwaway build
/// containers, batching crates that share a workspace and revision and
/// reusing artifacts that already exist.
#[derive(Parser, Debug)]
#[command(name = "cwbuild")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CWBUILD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local cwbuild.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build contract crates
    Build(BuildArgs),

    /// Inspect or clean build caches
    Cache(CacheArgs),

    /// Show configuration
    Config(ConfigArgs),

    /// Check the container engine
    Status,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Crates to build, as `crate` or `crate@revision`
    #[arg(required = true, value_name = "CRATE[@REV]")]
    pub sources: Vec<String>,

    /// Workspace containing the crates (default: config, then current directory)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Revision for crates given without `@revision`
    #[arg(short, long)]
    pub revision: Option<String>,

    /// Cargo features to enable, comma separated
    #[arg(short = 'F', long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Artifact output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Build on the host instead of in a container
    #[arg(long)]
    pub raw: bool,

    /// Rebuild even if artifacts exist
    #[arg(long)]
    pub no_cache: bool,

    /// Only show build output on failure
    #[arg(short, long)]
    pub quiet: bool,

    /// Skip git fetch before historical builds
    #[arg(long)]
    pub no_fetch: bool,

    /// Build driver script
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Container engine
    #[arg(long, value_enum)]
    pub engine: Option<Engine>,

    /// Build image
    #[arg(long)]
    pub image: Option<String>,

    /// Print artifacts as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List built artifacts and their hashes
    List {
        /// Artifact output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List Cargo cache volumes
    Volumes {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove Cargo cache volumes
    Clean {
        /// Only remove volumes older than N days
        #[arg(long)]
        older_than: Option<u32>,

        /// Show what would be removed
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}
