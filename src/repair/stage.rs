//! Repair ladder states and their transition function.
//!
//! The transition function is pure: given the current stage, what the stage
//! produced, and which repair stages this file is eligible for, it returns
//! the next stage. No I/O happens here.

use std::fmt;
use std::path::Path;

use super::is_mp3;

/// State of one file's trip through the repair ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStage {
    /// Analyze the file as-is.
    PrimaryAttempt,
    /// In-place MP3 repair, then re-analyze.
    Mp3Repair,
    /// Re-encode/remux to a temporary file, swap it in, then re-analyze.
    FfmpegRepair,
    /// A stage produced a usable analysis.
    Succeeded,
    /// No stage produced a usable analysis.
    Failed,
}

impl RepairStage {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether this stage mutates the file.
    #[must_use]
    pub fn is_repair(self) -> bool {
        matches!(self, Self::Mp3Repair | Self::FfmpegRepair)
    }
}

impl fmt::Display for RepairStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PrimaryAttempt => "primary attempt",
            Self::Mp3Repair => "mp3val repair",
            Self::FfmpegRepair => "FFmpeg repair",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of running one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The stage ended with a usable analysis.
    Analyzed,
    /// The stage ended without one and the file was left as it was.
    NotAnalyzed,
    /// The stage could not put the original back.
    RestoreFailed,
}

/// Repair stages this file may enter.
///
/// Decided once, from the primary failure: a file whose first failure is not
/// in the recoverable class is eligible for nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Eligibility {
    pub mp3_repair: bool,
    pub ffmpeg_repair: bool,
}

impl Eligibility {
    /// Eligible for nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Compute eligibility after the primary attempt failed.
    ///
    /// * `recoverable` - whether the primary failure is in the recoverable class
    /// * `mp3_enabled` / `ffmpeg_enabled` - the tool is available and enabled
    #[must_use]
    pub fn after_primary_failure(
        path: &Path,
        recoverable: bool,
        mp3_enabled: bool,
        ffmpeg_enabled: bool,
    ) -> Self {
        if !recoverable {
            return Self::none();
        }
        Self {
            mp3_repair: mp3_enabled && is_mp3(path),
            ffmpeg_repair: ffmpeg_enabled,
        }
    }
}

/// Compute the next stage.
#[must_use]
pub fn next_stage(current: RepairStage, outcome: StepOutcome, eligibility: Eligibility) -> RepairStage {
    if current.is_terminal() {
        return current;
    }

    match outcome {
        StepOutcome::Analyzed => RepairStage::Succeeded,
        StepOutcome::RestoreFailed => RepairStage::Failed,
        StepOutcome::NotAnalyzed => match current {
            RepairStage::PrimaryAttempt if eligibility.mp3_repair => RepairStage::Mp3Repair,
            RepairStage::PrimaryAttempt | RepairStage::Mp3Repair if eligibility.ffmpeg_repair => {
                RepairStage::FfmpegRepair
            }
            _ => RepairStage::Failed,
        },
    }
}
