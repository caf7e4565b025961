//! Build output handling
//!
//! Every line a build prints goes through a [`BuildLog`]. Lines are always
//! kept so a failure can carry them; whether they are also shown as they
//! arrive depends on quiet mode.

use std::sync::{Arc, Mutex, MutexGuard};

/// Destination for build output lines
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Sink that writes each line to stderr
pub fn stderr_sink() -> LogSink {
    Arc::new(|line: &str| eprintln!("{}", line))
}

/// Line buffer in front of a [`LogSink`]
pub struct BuildLog {
    sink: LogSink,
    quiet: bool,
    lines: Mutex<Vec<String>>,
}

impl BuildLog {
    pub fn new(sink: LogSink, quiet: bool) -> Self {
        Self {
            sink,
            quiet,
            lines: Mutex::new(Vec::new()),
        }
    }

    /// Record a line, forwarding it unless quiet
    pub fn line(&self, line: String) {
        if !self.quiet {
            (self.sink)(&line);
        }
        self.buffer().push(line);
    }

    /// Forward everything held back by quiet mode.
    ///
    /// Called when a build fails; a no-op when lines were already streamed.
    pub fn replay(&self) {
        if !self.quiet {
            return;
        }
        for line in self.buffer().iter() {
            (self.sink)(line);
        }
    }

    /// All recorded lines joined by newlines
    pub fn contents(&self) -> String {
        self.buffer().join("\n")
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<String>> {
        // A poisoned buffer still holds valid lines
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }
}
