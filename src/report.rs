//! Real-time user-facing reporting.
//!
//! Repair transitions and quarantine decisions are shown to the user as they
//! happen, in addition to being logged. Components report through the
//! [`Reporter`] trait so tests can capture the output instead of printing it.

use std::io::Write;
use std::sync::Mutex;

use yansi::Paint;

/// Sink for messages shown to the user.
pub trait Reporter: Send + Sync {
    /// Informational progress message.
    fn info(&self, message: &str);

    /// Something went wrong but processing continues.
    fn warn(&self, message: &str);

    /// A failure the user must notice (e.g. a file could not be restored).
    fn error(&self, message: &str);
}

/// Reporter printing to stdout with colored severity prefixes.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, line: String) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = writeln!(lock, "{}", line);
        let _ = lock.flush();
    }
}

impl Reporter for ConsoleReporter {
    fn info(&self, message: &str) {
        self.emit(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.emit(format!("{} {}", "WARNING:".yellow().bold(), message));
    }

    fn error(&self, message: &str) {
        self.emit(format!("{} {}", "ERROR:".red().bold(), message));
    }
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Reporter that records messages, prefixed by severity.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<String>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded lines in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Whether any recorded line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    fn push(&self, line: String) {
        self.lines
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(line);
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.push(format!("INFO: {message}"));
    }

    fn warn(&self, message: &str) {
        self.push(format!("WARNING: {message}"));
    }

    fn error(&self, message: &str) {
        self.push(format!("ERROR: {message}"));
    }
}
