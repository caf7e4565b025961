//! Container run specification
//!
//! Everything a build container observes is in [`ContainerRunSpec`]: image,
//! mounts, environment, and command. The maps are ordered so the rendered
//! engine arguments are the same on every run.

use std::collections::BTreeMap;

/// Full description of one build container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRunSpec {
    /// Container name
    pub name: String,
    /// Container image to use
    pub image: String,
    /// Working directory inside the container
    pub workdir: String,
    /// Read-only bind mounts, host path -> container path
    pub readonly_mounts: BTreeMap<String, String>,
    /// Read-write mounts, host path or volume name -> container path
    pub writable_mounts: BTreeMap<String, String>,
    /// Environment variables
    pub env: BTreeMap<String, String>,
    /// Command and arguments
    pub command: Vec<String>,
}

impl ContainerRunSpec {
    /// Engine arguments following `create`: options, image, then command.
    ///
    /// Podman and Docker share this syntax.
    pub fn create_args(&self) -> Vec<String> {
        let mut args = vec![
            "--name".to_string(),
            self.name.clone(),
            "-w".to_string(),
            self.workdir.clone(),
        ];

        for (host, container) in &self.readonly_mounts {
            args.push("--mount".to_string());
            args.push(format!("{},readonly", mount_fields("bind", host, container)));
        }
        for (source, container) in &self.writable_mounts {
            // Absolute sources are host paths, anything else a named volume
            let kind = if source.starts_with('/') { "bind" } else { "volume" };
            args.push("--mount".to_string());
            args.push(mount_fields(kind, source, container));
        }

        for (k, v) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", k, v));
        }

        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }

    /// Host side of the mount at `container_path`, if any
    pub fn host_path_for(&self, container_path: &str) -> Option<&str> {
        self.readonly_mounts
            .iter()
            .chain(&self.writable_mounts)
            .find(|(_, c)| c.as_str() == container_path)
            .map(|(h, _)| h.as_str())
    }
}

/// `--mount` value; the engines read it as one CSV record, so `:` in a
/// path is literal and a field holding `,` or `"` is quoted.
fn mount_fields(kind: &str, source: &str, target: &str) -> String {
    format!(
        "type={},{},{}",
        kind,
        csv_field(&format!("src={}", source)),
        csv_field(&format!("dst={}", target))
    )
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
