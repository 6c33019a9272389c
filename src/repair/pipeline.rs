//! Driver for the repair ladder.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analysis::{Analysis, Analyzer};
use crate::report::{NullReporter, Reporter};

use super::{
    next_stage, BackupGuard, Eligibility, Ffmpeg, Mp3Repairer, RepairError, RepairStage,
    StepOutcome, Transcoder,
};

/// Final state of one file after the pipeline.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub path: PathBuf,
    /// Analysis from whichever stage succeeded.
    pub analysis: Option<Analysis>,
    /// `Succeeded` or `Failed`.
    pub final_stage: RepairStage,
    /// Repair stage whose re-analysis succeeded, if any.
    pub repaired_by: Option<RepairStage>,
    /// A repair stage could not restore the original. The backup is still on disk.
    pub restore_failed: bool,
    /// Last failure message when the file could not be analyzed.
    pub error: Option<String>,
}

impl RepairOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.final_stage == RepairStage::Succeeded
    }
}

/// Runs primary analysis and, on recoverable failure, the repair stages.
///
/// Safe to share between worker threads; each call to [`RepairPipeline::run`]
/// only touches the one file it is given.
#[derive(Clone)]
pub struct RepairPipeline {
    analyzer: Arc<dyn Analyzer>,
    mp3_repairer: Option<Arc<dyn Mp3Repairer>>,
    transcoder: Option<Arc<dyn Transcoder>>,
    reporter: Arc<dyn Reporter>,
}

impl RepairPipeline {
    /// Pipeline with analysis only; no repair stage is enabled.
    #[must_use]
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            analyzer,
            mp3_repairer: None,
            transcoder: None,
            reporter: Arc::new(NullReporter),
        }
    }

    /// Enable the in-place MP3 repair stage.
    #[must_use]
    pub fn with_mp3_repairer(mut self, repairer: Arc<dyn Mp3Repairer>) -> Self {
        self.mp3_repairer = Some(repairer);
        self
    }

    /// Enable the re-encode/remux stage.
    #[must_use]
    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Analyze `path`, repairing it if needed and allowed.
    pub fn run(&self, path: &Path) -> RepairOutcome {
        let name = display_name(path);
        let mut stage = RepairStage::PrimaryAttempt;
        let mut eligibility = Eligibility::none();
        let mut analysis = None;
        let mut error = None;
        let mut repaired_by = None;
        let mut restore_failed = false;

        while !stage.is_terminal() {
            let outcome = match stage {
                RepairStage::PrimaryAttempt => match self.analyzer.analyze(path) {
                    Ok(a) => {
                        log::debug!(
                            "Fingerprinted {} ({:.2}s)",
                            path.display(),
                            a.duration
                        );
                        analysis = Some(a);
                        StepOutcome::Analyzed
                    }
                    Err(e) => {
                        log::warn!("Initial fingerprint failed for {}: {}", path.display(), e);
                        eligibility = Eligibility::after_primary_failure(
                            path,
                            e.is_recoverable(),
                            self.mp3_repairer.is_some(),
                            self.transcoder.is_some(),
                        );
                        error = Some(e.message().to_string());
                        StepOutcome::NotAnalyzed
                    }
                },
                RepairStage::Mp3Repair => {
                    self.reporter.info(&format!(
                        "Fingerprint failed for {name}, attempting repair with mp3val..."
                    ));
                    self.mp3_stage(path, &mut analysis, &mut error)
                }
                RepairStage::FfmpegRepair => {
                    self.reporter.info(&format!(
                        "Attempting FFmpeg repair of {name} (potential quality loss)..."
                    ));
                    self.ffmpeg_stage(path, &mut analysis, &mut error)
                }
                RepairStage::Succeeded | RepairStage::Failed => break,
            };

            let next = next_stage(stage, outcome, eligibility);
            if outcome == StepOutcome::RestoreFailed {
                restore_failed = true;
            }
            if next == RepairStage::Succeeded && stage.is_repair() {
                repaired_by = Some(stage);
                self.reporter
                    .info(&format!("Successfully fingerprinted {name} after {stage}."));
            }
            stage = next;
        }

        if stage == RepairStage::Failed {
            log::error!(
                "Could not fingerprint {}: {}",
                path.display(),
                error.as_deref().unwrap_or("unknown error")
            );
        }

        RepairOutcome {
            path: path.to_path_buf(),
            analysis,
            final_stage: stage,
            repaired_by,
            restore_failed,
            error,
        }
    }

    fn mp3_stage(
        &self,
        path: &Path,
        analysis: &mut Option<Analysis>,
        error: &mut Option<String>,
    ) -> StepOutcome {
        let Some(repairer) = &self.mp3_repairer else {
            return StepOutcome::NotAnalyzed;
        };

        let guard = match BackupGuard::create(path, "mp3val") {
            Ok(g) => g,
            Err(e) => {
                self.reporter.warn(&e.to_string());
                *error = Some(e.to_string());
                return StepOutcome::NotAnalyzed;
            }
        };

        match repairer.repair(path) {
            Ok(report) => {
                let name = display_name(path);
                if report.fixed {
                    self.reporter
                        .info(&format!("mp3val reported fixing errors for {name}."));
                } else {
                    self.reporter
                        .info(&format!("mp3val processed {name}. Retrying fingerprint."));
                }
                match self.analyzer.analyze(path) {
                    Ok(a) => {
                        guard.commit();
                        *analysis = Some(a);
                        return StepOutcome::Analyzed;
                    }
                    Err(e) => {
                        log::warn!(
                            "Fingerprint still failed for {} after mp3val: {}",
                            path.display(),
                            e
                        );
                        *error = Some(e.message().to_string());
                    }
                }
            }
            Err(e) => {
                self.reporter
                    .warn(&format!("mp3val repair attempt failed: {e}"));
                *error = Some(e.to_string());
            }
        }

        self.restore(guard)
    }

    fn ffmpeg_stage(
        &self,
        path: &Path,
        analysis: &mut Option<Analysis>,
        error: &mut Option<String>,
    ) -> StepOutcome {
        let Some(transcoder) = &self.transcoder else {
            return StepOutcome::NotAnalyzed;
        };

        let guard = match BackupGuard::create(path, "ffmpeg") {
            Ok(g) => g,
            Err(e) => {
                self.reporter.warn(&e.to_string());
                *error = Some(e.to_string());
                return StepOutcome::NotAnalyzed;
            }
        };

        let temp = Ffmpeg::temp_output_path(path);
        let swapped = transcode_and_swap(transcoder.as_ref(), path, &temp);
        if temp.exists() {
            if let Err(e) = fs::remove_file(&temp) {
                log::warn!("Could not remove {}: {}", temp.display(), e);
            }
        }

        match swapped {
            Ok(()) => {
                log::info!("Replaced {} with FFmpeg output", path.display());
                match self.analyzer.analyze(path) {
                    Ok(a) => {
                        guard.commit();
                        *analysis = Some(a);
                        return StepOutcome::Analyzed;
                    }
                    Err(e) => {
                        log::warn!(
                            "Fingerprint still failed for {} after FFmpeg: {}",
                            path.display(),
                            e
                        );
                        *error = Some(e.message().to_string());
                    }
                }
            }
            Err(e) => {
                self.reporter
                    .warn(&format!("FFmpeg processing failed for {}: {e}", display_name(path)));
                *error = Some(e.to_string());
            }
        }

        let outcome = self.restore(guard);
        if outcome == StepOutcome::NotAnalyzed {
            self.reporter.info(&format!(
                "Original file {} restored as FFmpeg repair did not lead to successful fingerprinting.",
                display_name(path)
            ));
        }
        outcome
    }

    fn restore(&self, guard: BackupGuard) -> StepOutcome {
        match guard.restore() {
            Ok(()) => StepOutcome::NotAnalyzed,
            Err(e) => {
                log::error!("{}", e);
                self.reporter.error(&e.to_string());
                StepOutcome::RestoreFailed
            }
        }
    }
}

/// Run the transcoder into `temp` and move a non-empty result over `original`.
fn transcode_and_swap(
    transcoder: &dyn Transcoder,
    original: &Path,
    temp: &Path,
) -> Result<(), RepairError> {
    transcoder.transcode(original, temp)?;

    let produced = fs::metadata(temp).map(|m| m.len() > 0).unwrap_or(false);
    if !produced {
        return Err(RepairError::EmptyOutput {
            tool: "ffmpeg",
            path: original.to_path_buf(),
        });
    }

    fs::rename(temp, original).map_err(|source| RepairError::Io {
        path: original.to_path_buf(),
        source,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
