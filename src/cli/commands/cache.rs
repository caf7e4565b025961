//! Cache command - inspect artifacts and Cargo cache volumes

use crate::cache::{ArtifactCache, CacheVolume};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::options::BuildOptions;
use crate::config::Config;
use crate::error::{CwbuildError, CwbuildResult};
use crate::orchestration::{create_runtime, ContainerRuntime};
use crate::paths;
use crate::source::CompiledArtifact;
use crate::ui::{self, TaskSpinner, UiContext};
use chrono::Utc;
use console::style;
use std::path::Path;
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config, config_base: &Path) -> CwbuildResult<()> {
    let options = BuildOptions::resolve(config, config_base);

    match args.action {
        CacheAction::List { output_dir, format } => {
            let output_dir = match output_dir {
                Some(dir) => {
                    let cwd = std::env::current_dir()
                        .map_err(|e| CwbuildError::io("getting current directory", e))?;
                    paths::absolutize(&dir, &cwd)
                }
                None => options.output_dir.clone(),
            };
            list_artifacts(&output_dir, format)
        }
        CacheAction::Volumes { format } => {
            let runtime = create_runtime(options.engine);
            list_volumes(&*runtime, &options.cache_volume_prefix, format).await
        }
        CacheAction::Clean {
            older_than,
            dry_run,
            yes,
        } => {
            let runtime = create_runtime(options.engine);
            let ctx = UiContext::detect().with_auto_yes(yes);
            clean_volumes(&ctx, &*runtime, &options.cache_volume_prefix, older_than, dry_run).await
        }
    }
}

/// List artifacts in the output directory
fn list_artifacts(output_dir: &Path, format: OutputFormat) -> CwbuildResult<()> {
    let artifacts = ArtifactCache::new(output_dir, true).list()?;

    if artifacts.is_empty() && !matches!(format, OutputFormat::Json) {
        println!("No artifacts in {}", output_dir.display());
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_artifact_table(&artifacts),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&artifacts)?),
        OutputFormat::Plain => {
            for artifact in &artifacts {
                println!("{}  {}", artifact.code_hash, artifact.code_path.display());
            }
        }
    }

    Ok(())
}

fn print_artifact_table(artifacts: &[CompiledArtifact]) {
    println!("{:<40} {:<64}", "ARTIFACT", "SHA256");
    println!("{}", "-".repeat(105));

    for artifact in artifacts {
        let name = artifact
            .code_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("{:<40} {:<64}", name, artifact.code_hash);
    }

    println!();
    println!("Total: {} artifact(s)", artifacts.len());
}

/// Cache volumes carrying our labels
async fn cache_volumes(
    runtime: &dyn ContainerRuntime,
    prefix: &str,
) -> CwbuildResult<Vec<CacheVolume>> {
    let volumes = runtime.volume_list(prefix).await?;
    Ok(volumes
        .iter()
        .filter_map(|v| CacheVolume::from_labels(&v.name, &v.labels))
        .collect())
}

/// List Cargo cache volumes
async fn list_volumes(
    runtime: &dyn ContainerRuntime,
    prefix: &str,
    format: OutputFormat,
) -> CwbuildResult<()> {
    let caches = cache_volumes(runtime, prefix).await?;

    match format {
        OutputFormat::Json => print_volume_json(&caches)?,
        _ if caches.is_empty() => println!("No cache volumes found."),
        OutputFormat::Table => print_volume_table(&caches),
        OutputFormat::Plain => {
            for cache in &caches {
                println!("{}", cache.name);
            }
        }
    }

    Ok(())
}

fn print_volume_table(caches: &[CacheVolume]) {
    println!("{:<40} {:<24} {:<20}", "VOLUME", "REVISION", "CREATED");
    println!("{}", "-".repeat(84));

    for cache in caches {
        let created = cache.created_at.format("%Y-%m-%d %H:%M").to_string();
        println!("{:<40} {:<24} {:<20}", cache.name, cache.revision, created);
    }

    println!();
    println!("Total: {} cache(s)", caches.len());
}

fn print_volume_json(caches: &[CacheVolume]) -> CwbuildResult<()> {
    #[derive(serde::Serialize)]
    struct VolumeJson<'a> {
        name: &'a str,
        revision: &'a str,
        created_at: String,
    }

    let json: Vec<VolumeJson<'_>> = caches
        .iter()
        .map(|c| VolumeJson {
            name: &c.name,
            revision: &c.revision,
            created_at: c.created_at.to_rfc3339(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Remove cache volumes, optionally only those older than `older_than` days
async fn clean_volumes(
    ctx: &UiContext,
    runtime: &dyn ContainerRuntime,
    prefix: &str,
    older_than: Option<u32>,
    dry_run: bool,
) -> CwbuildResult<()> {
    let caches = cache_volumes(runtime, prefix).await?;
    let to_remove: Vec<&CacheVolume> = caches
        .iter()
        .filter(|c| older_than.map_or(true, |days| c.is_older_than_days(days)))
        .collect();

    if to_remove.is_empty() {
        match older_than {
            Some(days) => println!("No caches older than {} days.", days),
            None => println!("No cache volumes to clean."),
        }
        return Ok(());
    }

    println!("Found {} cache volume(s):", to_remove.len());
    for cache in &to_remove {
        let age_days = (Utc::now() - cache.created_at).num_days();
        println!(
            "  {} {} ({}, {} days old)",
            style("•").red(),
            cache.name,
            cache.revision,
            age_days
        );
    }

    if dry_run {
        println!();
        println!("Dry run - no caches removed.");
        return Ok(());
    }

    if !ui::confirm(ctx, "Remove these volumes?", false).await? {
        println!("Aborted.");
        return Ok(());
    }

    let mut spinner = TaskSpinner::new(ctx);
    spinner.start("Removing cache volumes...");

    let mut removed = 0;
    for cache in to_remove {
        debug!("Removing cache: {}", cache.name);
        if let Err(e) = runtime.volume_remove(&cache.name).await {
            spinner.stop_error(&format!("Failed to remove {}", cache.name));
            return Err(e);
        }
        removed += 1;
    }

    spinner.stop(&format!("Removed {} cache volume(s)", removed));
    Ok(())
}
