//! Interactive quarantine flows for duplicates and low-bitrate files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::cache::{CacheEntry, CacheMap, FileStamp};
use crate::duplicates::DuplicateSet;
use crate::report::Reporter;

use super::decision::{confirm, DecisionSource, Prompt, PromptSession, Resolution};
use super::mover::{MoveOutcome, QuarantineMover};

/// Counters for one quarantine flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuarantineSummary {
    /// Files moved (or, in dry-run mode, that would have been moved).
    pub moved: usize,
    /// Files the user chose to keep.
    pub skipped: usize,
    /// Files that were gone before they could be handled.
    pub missing: usize,
    /// Moves that failed.
    pub failed: usize,
    /// Responses that were not understood.
    pub invalid: usize,
    /// Files a question was asked (or auto-answered) for.
    pub prompted: usize,
    /// The user quit before the end of the flow.
    pub quit: bool,
}

/// Runs the quarantine flows against a decision source.
pub struct QuarantineEngine {
    source: Box<dyn DecisionSource>,
    mover: QuarantineMover,
    reporter: Arc<dyn Reporter>,
}

impl QuarantineEngine {
    #[must_use]
    pub fn new(
        source: Box<dyn DecisionSource>,
        mover: QuarantineMover,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            source,
            mover,
            reporter,
        }
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.mover.is_dry_run()
    }

    /// Ask whether to scan for low-bitrate files.
    pub fn confirm_low_bitrate_scan(&mut self, threshold_kbps: u32) -> bool {
        confirm(
            self.source.as_mut(),
            &Prompt::ConfirmLowBitrateScan { threshold_kbps },
        )
    }

    /// Walk every duplicate set in order, asking about each duplicate.
    pub fn process_duplicates(&mut self, sets: &[DuplicateSet], dir: &Path) -> QuarantineSummary {
        let mut summary = QuarantineSummary::default();
        if sets.is_empty() {
            log::info!("No duplicates found to prompt for quarantining");
            return summary;
        }

        let mut session = PromptSession::new();
        self.reporter.info(
            "The following acoustically similar files (duplicates) were found and will be processed individually:",
        );

        'sets: for set in sets {
            self.reporter.info(&format!(
                "--- Keeping (canonical): {} ---",
                set.canonical.display()
            ));

            let total = set.duplicates.len();
            for (i, candidate) in set.duplicates.iter().enumerate() {
                if !candidate.exists() {
                    self.reporter.warn(&format!(
                        "{} (already removed or moved)",
                        candidate.display()
                    ));
                    summary.missing += 1;
                    continue;
                }

                self.reporter.info(&format!(
                    "Considering duplicate {} of {}: {}",
                    i + 1,
                    total,
                    candidate.display()
                ));
                summary.prompted += 1;

                let prompt = Prompt::Duplicate {
                    canonical: set.canonical.clone(),
                    candidate: candidate.clone(),
                    index: i + 1,
                    total,
                };
                match session.resolve(self.source.as_mut(), &prompt) {
                    Resolution::Move { .. } => self.move_one(candidate, dir, &mut summary),
                    Resolution::Skip => {
                        self.reporter.info(&format!("Skipped: {}", candidate.display()));
                        summary.skipped += 1;
                    }
                    Resolution::Invalid(response) => {
                        self.reporter.warn(&format!(
                            "Invalid input '{}'. Skipped: {}",
                            response,
                            candidate.display()
                        ));
                        summary.invalid += 1;
                    }
                    Resolution::Halt => {
                        self.reporter.info("Quitting duplicate file quarantine.");
                        summary.quit = true;
                        summary.prompted -= 1;
                        break 'sets;
                    }
                }
            }
        }

        self.finish("Duplicates", &summary);
        summary
    }

    /// Walk low-bitrate candidates, recording "keep" decisions in `cache`.
    ///
    /// `n` marks the file ignored against its current stamp so an unchanged
    /// file is not asked about again; a move clears the mark; an invalid
    /// response or quitting leaves the cache alone.
    pub fn process_low_bitrate(
        &mut self,
        candidates: &[PathBuf],
        dir: &Path,
        cache: &mut CacheMap,
    ) -> QuarantineSummary {
        let mut summary = QuarantineSummary::default();
        if candidates.is_empty() {
            return summary;
        }

        let mut session = PromptSession::new();
        self.reporter.info(&format!(
            "Found {} file(s) needing review for low bitrate. They will be quarantined to: {}",
            candidates.len(),
            dir.display()
        ));

        let total = candidates.len();
        for (i, candidate) in candidates.iter().enumerate() {
            if !candidate.exists() {
                summary.missing += 1;
                continue;
            }

            self.reporter.info(&format!(
                "--- File {} of {} --- Low bitrate candidate: {}",
                i + 1,
                total,
                candidate.display()
            ));
            summary.prompted += 1;

            let prompt = Prompt::LowBitrate {
                candidate: candidate.clone(),
                index: i + 1,
                total,
                quarantine_dir: dir.to_path_buf(),
            };
            match session.resolve(self.source.as_mut(), &prompt) {
                Resolution::Move { .. } => {
                    record_ignore(cache, candidate, false);
                    self.move_one(candidate, dir, &mut summary);
                }
                Resolution::Skip => {
                    record_ignore(cache, candidate, true);
                    self.reporter.info(&format!(
                        "Skipped (will be ignored next time if unchanged): {}",
                        candidate.display()
                    ));
                    summary.skipped += 1;
                }
                Resolution::Invalid(response) => {
                    self.reporter.warn(&format!(
                        "Invalid input '{}'. Skipped: {}",
                        response,
                        candidate.display()
                    ));
                    summary.invalid += 1;
                }
                Resolution::Halt => {
                    self.reporter.info("Quitting low bitrate quarantine.");
                    summary.quit = true;
                    summary.prompted -= 1;
                    break;
                }
            }
        }

        self.finish("Low bitrate", &summary);
        summary
    }

    fn move_one(&self, candidate: &Path, dir: &Path, summary: &mut QuarantineSummary) {
        match self.mover.move_file(candidate, dir) {
            Ok(MoveOutcome::Moved(dest)) => {
                self.reporter.info(&format!(
                    "Moving '{}' to '{}'",
                    candidate.display(),
                    dest.display()
                ));
                summary.moved += 1;
            }
            Ok(MoveOutcome::WouldMove(dest)) => {
                self.reporter.info(&format!(
                    "DRY RUN: Would move '{}' to '{}'",
                    candidate.display(),
                    dest.display()
                ));
                summary.moved += 1;
            }
            Ok(MoveOutcome::SourceMissing) => {
                self.reporter
                    .warn(&format!("Source file not found: {}", candidate.display()));
                summary.missing += 1;
            }
            Err(e) => {
                log::error!("{}", e);
                self.reporter.error(&e.to_string());
                summary.failed += 1;
            }
        }
    }

    fn finish(&self, flow: &str, summary: &QuarantineSummary) {
        let verb = if self.is_dry_run() {
            "Simulated moving"
        } else {
            "Moved"
        };
        let message = if summary.moved > 0 {
            format!("{flow}: {verb} {} file(s) to quarantine.", summary.moved)
        } else if summary.quit {
            format!("{flow}: quarantine quit by user; no files moved.")
        } else if summary.prompted > 0 {
            format!("{flow}: no files moved to quarantine by choice.")
        } else {
            format!("{flow}: no files were available for review.")
        };
        log::info!("{}", message);
        self.reporter.info(&message);
    }
}

/// Set the low-bitrate decision for `path` against its current stamp.
fn record_ignore(cache: &mut CacheMap, path: &Path, ignored: bool) {
    match FileStamp::capture(path) {
        Ok(stamp) => cache
            .entry(path.to_path_buf())
            .or_insert_with(|| CacheEntry::from_stamp(stamp))
            .set_low_bitrate_ignored(ignored, stamp),
        Err(e) => log::error!(
            "Could not update mtime/size for {}: {}",
            path.display(),
            e
        ),
    }
}
