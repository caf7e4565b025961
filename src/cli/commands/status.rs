//! Status command - check the build environment

use crate::config::options::BuildOptions;
use crate::config::Config;
use crate::error::CwbuildResult;
use crate::orchestration::{create_runtime, ContainerRuntime};
use crate::ui::{self, UiContext};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Execute the status command
pub async fn execute(config: &Config, config_base: &Path) -> CwbuildResult<()> {
    let ctx = UiContext::detect();
    let options = BuildOptions::resolve(config, config_base);

    ui::intro(&ctx, "cwbuild status");

    let mut all_ok = true;

    ui::section(&ctx, "Container engine");
    let runtime = create_runtime(options.engine);
    all_ok &= check_engine(&ctx, &*runtime, &options).await;

    ui::section(&ctx, "Build");
    match options.script {
        Some(ref script) if script.is_file() => {
            ui::key_value_status(&ctx, "Driver script", &script.display().to_string(), true)
        }
        Some(ref script) => {
            ui::key_value_status(&ctx, "Driver script", &format!("{} (missing)", script.display()), false);
            all_ok = false;
        }
        None => {
            ui::key_value_status(&ctx, "Driver script", "not configured", false);
            all_ok = false;
        }
    }
    ui::key_value(&ctx, "Output directory", &options.output_dir.display().to_string());
    ui::key_value(&ctx, "Caching", if options.caching { "enabled" } else { "disabled" });
    all_ok &= check_git(&ctx).await;

    ui::section(&ctx, "SSH");
    match options.ssh_agent_socket {
        Some(ref sock) => ui::key_value_status(&ctx, "Agent socket", &sock.display().to_string(), true),
        None => ui::key_value_status(&ctx, "Agent socket", "not forwarded", false),
    }
    match options.ssh_known_hosts {
        Some(ref hosts) => ui::key_value(&ctx, "Known hosts", &hosts.display().to_string()),
        None => ui::key_value_status(&ctx, "Known hosts", "none", false),
    }

    if all_ok {
        ui::outro_success(&ctx, "Ready to build");
    } else {
        ui::outro_warn(&ctx, "Some checks failed - see above for details");
    }

    Ok(())
}

async fn check_engine(ctx: &UiContext, runtime: &dyn ContainerRuntime, options: &BuildOptions) -> bool {
    match runtime.is_available().await {
        Ok(true) => ui::step_ok(ctx, &format!("{} available", runtime.runtime_name())),
        Ok(false) => {
            ui::step_warn_hint(
                ctx,
                &format!("{} not available", runtime.runtime_name()),
                &format!("Install {} or use --engine / --raw", options.engine),
            );
            return false;
        }
        Err(e) => {
            ui::step_error_detail(ctx, "Engine check failed", &e.to_string());
            return false;
        }
    }

    match runtime.image_exists(&options.image).await {
        Ok(true) => ui::step_ok_detail(ctx, "Build image present", &options.image),
        Ok(false) => ui::step_warn_hint(ctx, &options.image, "not pulled yet; first build pulls it"),
        Err(e) => ui::step_error_detail(ctx, "Image check failed", &e.to_string()),
    }

    true
}

async fn check_git(ctx: &UiContext) -> bool {
    let output = Command::new("git")
        .arg("--version")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            ui::step_ok(ctx, version.trim());
            true
        }
        _ => {
            ui::step_warn_hint(ctx, "git not found", "historical builds need git");
            false
        }
    }
}
