//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    /// Create a new spinner (shows immediately in interactive mode)
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            // Plain output for CI
            eprintln!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else if self.interactive {
            eprintln!("{} {}", style("✓").green(), message);
        } else {
            eprintln!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else if self.interactive {
            eprintln!("{} {}", style("✗").red(), message);
        } else {
            eprintln!("{} {}", style("[FAIL]").red(), message);
        }
    }
}

/// Progress display for a contract build.
///
/// Follows cargo's `Compiling <crate> v<version>` lines and shows the
/// crate currently compiling and how many have been compiled so far.
/// Only meant for interactive terminals; CI output streams raw lines.
pub struct BuildProgress {
    bar: ProgressBar,
    compiled: AtomicU64,
}

impl BuildProgress {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} Building {prefix}  {pos:.dim} crates  {msg:.dim}  {elapsed:.dim}")
        {
            bar.set_style(template.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self {
            bar,
            compiled: AtomicU64::new(0),
        }
    }

    /// Process one line of build output
    pub fn on_line(&self, line: &str) {
        let trimmed = line.trim();
        if let Some((name, _version)) = parse_compiling_line(trimmed) {
            let n = self.compiled.fetch_add(1, Ordering::Relaxed) + 1;
            self.bar.set_position(n);
            self.bar.set_message(name.to_string());
        } else if trimmed.starts_with("error") || trimmed.starts_with("warning") {
            self.bar.println(trimmed);
        }
    }

    /// Number of `Compiling` lines seen
    pub fn compiled(&self) -> u64 {
        self.compiled.load(Ordering::Relaxed)
    }

    /// Finish and clear the progress bar.
    pub fn finish(&self) {
        self.bar.disable_steady_tick();
        self.bar.finish_and_clear();
    }
}

/// Parse cargo's `Compiling name v1.2.3 (path)` into name and version
fn parse_compiling_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("Compiling ")?;
    let mut parts = rest.split_whitespace();
    let name = parts.next()?;
    let version = parts.next()?.strip_prefix('v')?;
    Some((name, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_non_interactive() {
        let ctx = UiContext::non_interactive();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Testing...");
        spinner.stop("Done");
        // Should not panic
    }

    #[test]
    fn parse_compiling_line_valid() {
        let (name, version) =
            parse_compiling_line("Compiling cw-storage-plus v1.2.0").unwrap();
        assert_eq!(name, "cw-storage-plus");
        assert_eq!(version, "1.2.0");

        let (name, _) = parse_compiling_line("Compiling kv v0.1.0 (/src/contracts/kv)").unwrap();
        assert_eq!(name, "kv");
    }

    #[test]
    fn parse_compiling_line_rejects_other_output() {
        assert!(parse_compiling_line("Finished release [optimized] target(s)").is_none());
        assert!(parse_compiling_line("Compiling").is_none());
        assert!(parse_compiling_line("Compiling kv").is_none());
        assert!(parse_compiling_line("").is_none());
    }

    #[test]
    fn build_progress_counts_crates() {
        let progress = BuildProgress::new("kv");
        progress.on_line("   Compiling serde v1.0.200");
        progress.on_line("   Compiling kv v0.1.0 (/src)");
        progress.on_line("    Finished release");
        assert_eq!(progress.compiled(), 2);
        progress.finish();
    }
}
