//! Build command - compile contract crates

use crate::build::{create_compiler, stderr_sink, Interrupt, LogSink};
use crate::cli::args::BuildArgs;
use crate::config::options::BuildOptions;
use crate::config::Config;
use crate::error::{CwbuildError, CwbuildResult};
use crate::paths;
use crate::source::{CompiledArtifact, SourceSpec};
use crate::ui::{self, BuildProgress, UiContext};
use console::style;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Execute the build command.
///
/// Relative paths in `config` resolve against `config_base`; relative paths
/// given on the command line resolve against the current directory.
/// Running builds stop when `interrupt` fires.
pub async fn execute(
    args: BuildArgs,
    config: &Config,
    config_base: &Path,
    interrupt: Interrupt,
) -> CwbuildResult<()> {
    let cwd =
        std::env::current_dir().map_err(|e| CwbuildError::io("getting current directory", e))?;
    let sources = parse_sources(&args)?;
    let options = resolve_options(&args, config, config_base, &cwd);
    debug!("Resolved build options: {:?}", options);

    let ctx = UiContext::detect();
    let label = sources
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let progress = (ctx.use_fancy_output() && !args.json).then(|| Arc::new(BuildProgress::new(&label)));
    let sink: LogSink = match progress {
        Some(ref progress) => {
            let progress = Arc::clone(progress);
            Arc::new(move |line: &str| progress.on_line(line))
        }
        None => stderr_sink(),
    };

    let compiler = create_compiler(options, sink, interrupt);
    debug!("Using {} compiler", compiler.name());
    let result = compiler.build_many(sources).await;

    if let Some(ref progress) = progress {
        progress.finish();
    }

    let artifacts = match result {
        Ok(artifacts) => artifacts,
        Err(e) => {
            // The progress bar swallowed the raw output
            if progress.is_some() {
                if let Some(logs) = e.logs() {
                    eprintln!("{}", style("Build log:").bold());
                    eprintln!("{}", logs);
                }
            }
            return Err(e);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&artifacts)?);
    } else {
        print_artifacts(&ctx, &artifacts);
    }

    Ok(())
}

/// Sources from the positional arguments, with `--revision` and
/// `--features` applied where the argument doesn't say otherwise
fn parse_sources(args: &BuildArgs) -> CwbuildResult<Vec<SourceSpec>> {
    args.sources
        .iter()
        .map(|arg| {
            let mut source: SourceSpec = arg.parse()?;
            if source.revision.is_none() {
                source.revision = args.revision.clone();
            }
            if !args.features.is_empty() {
                source.features = args.features.clone();
            }
            Ok(source)
        })
        .collect()
}

/// Fold command-line overrides into the configuration and resolve it
fn resolve_options(args: &BuildArgs, config: &Config, config_base: &Path, cwd: &Path) -> BuildOptions {
    let mut config = config.clone();

    if let Some(ref workspace) = args.workspace {
        config.build.workspace = Some(paths::absolutize(workspace, cwd));
    }
    if let Some(ref output_dir) = args.output_dir {
        config.build.output_dir = Some(paths::absolutize(output_dir, cwd));
    }
    if let Some(ref script) = args.script {
        config.build.script = Some(paths::absolutize(script, cwd));
    }
    if let Some(engine) = args.engine {
        config.container.engine = engine;
    }
    if let Some(ref image) = args.image {
        config.container.image = image.clone();
    }
    // Without any configured workspace, build the one we're standing in
    if config.build.workspace.is_none() {
        config.build.workspace = Some(cwd.to_path_buf());
    }

    config.build.raw |= args.raw;
    config.build.quiet |= args.quiet;
    config.build.no_fetch |= args.no_fetch;
    if args.no_cache {
        config.build.caching = false;
    }

    let mut options = BuildOptions::resolve(&config, config_base);
    options.cwd = cwd.to_path_buf();
    options
}

fn print_artifacts(ctx: &UiContext, artifacts: &[CompiledArtifact]) {
    for artifact in artifacts {
        let name = artifact
            .code_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ui::step_ok_detail(ctx, &name, &artifact.code_hash);
    }
    if let Some(dir) = artifacts.first().and_then(|a| a.code_path.parent()) {
        ui::remark(ctx, &format!("Artifacts in {}", dir.display()));
    }
}
