//! Engine CLI invocation shared by the Podman and Docker runtimes

use crate::error::{CwbuildError, CwbuildResult};
use crate::orchestration::{build_error_output, stream_child_output};
use std::process::{Output, Stdio};
use tokio::process::{Child, Command};
use tracing::debug;

/// `inspect` template yielding `<status> <exit code>`
const EXIT_STATE_FORMAT: &str = "{{.State.Status}} {{.State.ExitCode}}";

/// Exit code of a container whose process ran to completion
fn parse_exit_state(output: &str) -> Option<i32> {
    let mut fields = output.split_whitespace();
    let status = fields.next()?;
    let code = fields.next()?.parse().ok()?;
    matches!(status, "exited" | "stopped").then_some(code)
}

/// Runs one engine binary (`podman` or `docker`)
#[derive(Debug, Clone, Copy)]
pub(crate) struct EngineCommand {
    program: &'static str,
}

impl EngineCommand {
    pub(crate) const fn new(program: &'static str) -> Self {
        Self { program }
    }

    pub(crate) fn program(&self) -> &'static str {
        self.program
    }

    /// Check if the engine binary runs at all
    pub(crate) async fn installed(&self) -> bool {
        Command::new(self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Execute an engine command and return the output
    pub(crate) async fn exec(&self, args: &[&str]) -> CwbuildResult<Output> {
        debug!("Executing: {} {:?}", self.program, args);

        Command::new(self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(args, e))
    }

    /// Execute and require success, returning stdout
    pub(crate) async fn exec_ok(&self, args: &[&str]) -> CwbuildResult<String> {
        let output = self.exec(args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(CwbuildError::command_exec(
                self.describe(args),
                String::from_utf8_lossy(&output.stderr).trim(),
            ))
        }
    }

    /// Spawn with stdout/stderr piped for streaming.
    ///
    /// The child is killed if its handle is dropped before it exits.
    pub(crate) fn spawn_piped(&self, args: &[&str]) -> CwbuildResult<Child> {
        debug!("Spawning: {} {:?}", self.program, args);

        Command::new(self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(args, e))
    }

    /// Start a created container attached and report its own exit code.
    ///
    /// The status of `start --attach` mixes engine and container failures,
    /// so the code comes from the container state once output ends. Only a
    /// container that never reached `exited` is a launch failure.
    pub(crate) async fn start_attached(
        &self,
        container_id: &str,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> CwbuildResult<i32> {
        let args = ["start", "--attach", container_id];
        let mut child = self.spawn_piped(&args)?;
        let lines = stream_child_output(&mut child, on_output).await;
        let status = child
            .wait()
            .await
            .map_err(|e| self.spawn_error(&args, e))?;

        let state = self
            .exec_ok(&["inspect", "--format", EXIT_STATE_FORMAT, container_id])
            .await;
        match state.as_deref().map(parse_exit_state) {
            Ok(Some(code)) => Ok(code),
            Ok(None) | Err(_) => {
                let mut detail = build_error_output(&lines.join("\n"), "");
                if detail.is_empty() {
                    detail = match &state {
                        Err(e) => e.to_string(),
                        Ok(_) => format!("{} start exited with {}", self.program, status),
                    };
                }
                Err(CwbuildError::ContainerLaunch(detail))
            }
        }
    }

    /// Run to completion synchronously, discarding output and errors
    pub(crate) fn exec_blocking_quiet(&self, args: &[&str]) {
        debug!("Executing (blocking): {} {:?}", self.program, args);

        let _ = std::process::Command::new(self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.program, args.first().copied().unwrap_or_default())
    }

    fn spawn_error(&self, args: &[&str], e: std::io::Error) -> CwbuildError {
        if e.kind() == std::io::ErrorKind::NotFound {
            CwbuildError::EngineNotFound(self.program.to_string())
        } else {
            CwbuildError::command_failed(self.describe(args), e)
        }
    }
}
