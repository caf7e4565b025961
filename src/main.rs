//! cwbuild CLI entry point

use clap::Parser;
use console::style;
use cwbuild::build::Interrupt;
use cwbuild::cli::{Cli, Commands};
use cwbuild::config::{Config, ConfigManager};
use cwbuild::error::{CwbuildError, CwbuildResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CwbuildResult<()> {
    let cli = Cli::parse();
    let cwd =
        std::env::current_dir().map_err(|e| CwbuildError::io("getting current directory", e))?;

    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let local_config = if cli.no_local {
        None
    } else {
        ConfigManager::find_local_config(&cwd)
    };

    let mut config = manager.load_merged(local_config.as_deref()).await?;
    init_logging(cli.verbose, &config);

    match local_config {
        Some(ref path) => debug!("Using local config: {}", path.display()),
        None if cli.no_local => debug!("Local config discovery disabled (--no-local)"),
        None => debug!("No local config found"),
    }

    // Relative paths in a local config are relative to that file
    let config_base = local_config
        .as_deref()
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or(cwd);

    if cli.verbose > 0 {
        config.build.verbose = true;
    }

    cwbuild::ui::init_theme();

    match cli.command {
        Commands::Build(args) => {
            // The only Ctrl-C handler; other commands keep the default
            let interrupt = Interrupt::on_ctrl_c();
            cwbuild::cli::commands::build(args, &config, &config_base, interrupt).await
        }
        Commands::Cache(args) => cwbuild::cli::commands::cache(args, &config, &config_base).await,
        Commands::Config(args) => cwbuild::cli::commands::config(args, &config, &manager).await,
        Commands::Status => cwbuild::cli::commands::status(&config, &config_base).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("cwbuild=warn"),
        1 => EnvFilter::new("cwbuild=info"),
        _ => EnvFilter::new("cwbuild=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
