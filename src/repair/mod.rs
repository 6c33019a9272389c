//! Staged repair-and-retry for files that fail analysis.
//!
//! When the primary analysis fails with a recoverable decode error, the
//! [`RepairPipeline`] walks an explicit ladder of stages:
//!
//! ```text
//! PrimaryAttempt -> Mp3Repair -> FfmpegRepair -> Failed
//!        \               \             \
//!         `---------------`-------------`--> Succeeded
//! ```
//!
//! Every mutating stage first takes a [`BackupGuard`] of the file. The guard
//! is either committed (backup deleted) after a successful re-analysis, or
//! restored (backup moved back over the original) otherwise, so a file that
//! ends in `Failed` is byte-identical to what it was before the pipeline ran.
//!
//! The external tools are behind the [`Mp3Repairer`] and [`Transcoder`]
//! traits; [`Mp3val`] and [`Ffmpeg`] are the production implementations.

pub mod backup;
pub mod ffmpeg;
pub mod mp3val;
pub mod pipeline;
pub mod stage;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use backup::BackupGuard;
pub use ffmpeg::Ffmpeg;
pub use mp3val::Mp3val;
pub use pipeline::{RepairOutcome, RepairPipeline};
pub use stage::{next_stage, Eligibility, RepairStage, StepOutcome};

/// Errors raised while repairing a file.
#[derive(Debug, Error)]
pub enum RepairError {
    /// The safety backup could not be created. The original is untouched.
    #[error("failed to back up {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The original could not be restored from its backup.
    #[error("CRITICAL: failed to restore {original} from backup {backup}: {source}")]
    RestoreFailed {
        original: PathBuf,
        backup: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The external tool could not be started.
    #[error("{tool} could not be started: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: io::Error,
    },

    /// The external tool ran and reported failure.
    #[error("{tool} failed for {path} (exit code {code:?}): {stderr}")]
    ToolFailed {
        tool: &'static str,
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// The tool reported success but left no usable output.
    #[error("{tool} produced no usable output for {path}")]
    EmptyOutput { tool: &'static str, path: PathBuf },

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What an in-place MP3 repair reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mp3RepairReport {
    /// The tool said it fixed something.
    pub fixed: bool,
}

/// In-place MP3 repair tool.
pub trait Mp3Repairer: Send + Sync {
    /// Repair `path` in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool could not run or reported failure.
    fn repair(&self, path: &Path) -> Result<Mp3RepairReport, RepairError>;
}

/// Re-encode/remux tool producing a new file.
pub trait Transcoder: Send + Sync {
    /// Write a re-encoded or remuxed copy of `source` to `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool could not run or reported failure.
    fn transcode(&self, source: &Path, output: &Path) -> Result<(), RepairError>;
}

/// Whether `path` has an `.mp3` extension (case-insensitive).
#[must_use]
pub fn is_mp3(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
}
