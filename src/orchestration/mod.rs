//! Orchestration module for container runtimes
//!
//! Provides engine-agnostic container management over the Podman and Docker
//! command line interfaces.

mod command;
pub mod docker;
mod factory;
pub mod podman;
pub mod run_spec;
mod runtime;

pub use docker::DockerRuntime;
pub use factory::{create_runtime, Engine};
pub use podman::PodmanRuntime;
pub use run_spec::ContainerRunSpec;
pub use runtime::{ContainerRuntime, VolumeInfo};

use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Max number of output lines to include in build error messages.
const BUILD_ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of build output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `BUILD_ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn build_error_output(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let start = lines.len().saturating_sub(BUILD_ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting. This is a standalone
/// async function (not behind `async_trait`) to avoid lifetime issues with the
/// `dyn Fn` callback.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> Vec<String> {
    let mut stderr_reader = child.stderr.take().map(|s| BufReader::new(s).lines());
    let mut stdout_reader = child.stdout.take().map(|s| BufReader::new(s).lines());

    let mut all_output = Vec::new();
    let mut stderr_done = stderr_reader.is_none();
    let mut stdout_done = stdout_reader.is_none();

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = async { stderr_reader.as_mut()?.next_line().await.ok().flatten() }, if !stderr_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stderr_done = true,
                }
            }
            line = async { stdout_reader.as_mut()?.next_line().await.ok().flatten() }, if !stdout_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stdout_done = true,
                }
            }
        }
    }

    all_output
}

/// Labels from Podman's JSON object form
pub(crate) fn parse_label_object(value: &serde_json::Value) -> HashMap<String, String> {
    value
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Labels from Docker's `k=v,k=v` string form
pub(crate) fn parse_label_string(value: &str) -> HashMap<String, String> {
    value
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_output_keeps_tail() {
        let stdout: String = (0..60).map(|i| format!("line {}\n", i)).collect();
        let out = build_error_output(&stdout, "boom");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), BUILD_ERROR_TAIL_LINES);
        assert_eq!(lines.last(), Some(&"boom"));
        assert_eq!(lines.first(), Some(&"line 11"));
    }

    #[test]
    fn error_output_short_input_untouched() {
        assert_eq!(build_error_output("a\nb", ""), "a\nb");
    }

    #[test]
    fn label_parsing() {
        let obj = serde_json::json!({"io.cwbuild.cache": "true", "n": 1});
        let labels = parse_label_object(&obj);
        assert_eq!(labels.get("io.cwbuild.cache").map(String::as_str), Some("true"));
        assert!(!labels.contains_key("n"));

        let labels = parse_label_string("io.cwbuild.cache=true,io.cwbuild.cache.revision=HEAD");
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["io.cwbuild.cache.revision"], "HEAD");
        assert!(parse_label_string("").is_empty());
        assert!(parse_label_object(&serde_json::Value::Null).is_empty());
    }

    #[tokio::test]
    async fn stream_collects_both_streams() {
        let mut child = tokio::process::Command::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .unwrap();
        let seen = std::sync::Mutex::new(Vec::new());
        let lines = stream_child_output(&mut child, &|l: String| seen.lock().unwrap().push(l)).await;
        child.wait().await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&"out".to_string()));
        assert!(lines.contains(&"err".to_string()));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
