//! One complete scan of a music library.
//!
//! [`Scan::run`] drives the phases in order:
//!
//! 1. discover audio files (the quarantine directory is never entered)
//! 2. load the fingerprint cache and split files into reusable / to-analyze
//! 3. fingerprint, repairing broken files when enabled
//! 4. resolve duplicate sets and review them interactively
//! 5. optionally find low-bitrate files and review those
//! 6. prune vanished entries and save the cache
//!
//! External programs, the user's answers and the output sinks are all
//! supplied through [`Collaborators`], so a run can be driven end to end
//! with fakes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bytesize::ByteSize;

use crate::analysis::{Analyzer, Fpcalc};
use crate::bitrate::{filter_ignored, BitrateProbe, BitrateScan, Ffprobe};
use crate::cache::{prune_missing, CacheMap, CacheStore, WorkingSet};
use crate::config::RunSettings;
use crate::duplicates::{resolve_duplicates, DuplicateSet, FingerprintOrchestrator, FingerprintStats};
use crate::error::ExitCode;
use crate::progress::{Progress, ProgressCallback};
use crate::quarantine::{
    DecisionSource, QuarantineEngine, QuarantineMover, QuarantineSummary, StdinDecisions,
};
use crate::repair::{Ffmpeg, Mp3Repairer, Mp3val, RepairPipeline, Transcoder};
use crate::report::{ConsoleReporter, Reporter};
use crate::scanner::{Walker, WalkerConfig};
use crate::signal::ShutdownHandler;

/// Everything a run talks to outside its own process state.
pub struct Collaborators {
    /// Primary analysis. `None` disables duplicate detection.
    pub analyzer: Option<Arc<dyn Analyzer>>,
    pub mp3_repairer: Option<Arc<dyn Mp3Repairer>>,
    pub transcoder: Option<Arc<dyn Transcoder>>,
    /// Bitrate prober. `None` disables the low-bitrate scan.
    pub probe: Option<Arc<dyn BitrateProbe>>,
    pub decisions: Box<dyn DecisionSource>,
    pub reporter: Arc<dyn Reporter>,
    pub progress: Option<Arc<dyn ProgressCallback>>,
    pub shutdown: ShutdownHandler,
}

impl Collaborators {
    /// Collaborators with no tools available.
    #[must_use]
    pub fn new(decisions: Box<dyn DecisionSource>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            analyzer: None,
            mp3_repairer: None,
            transcoder: None,
            probe: None,
            decisions,
            reporter,
            progress: None,
            shutdown: ShutdownHandler::new(),
        }
    }

    /// Real tools from the detected toolchain, prompting on the terminal.
    ///
    /// Repair tools are only wired in when their repair stage is enabled.
    #[must_use]
    pub fn from_settings(settings: &RunSettings, quiet: bool) -> Self {
        let tools = &settings.toolchain;
        let mut collaborators = Self::new(
            Box::new(StdinDecisions::terminal()),
            Arc::new(ConsoleReporter::new()),
        )
        .with_progress(Arc::new(Progress::new(quiet)));

        if let Some(ref fpcalc) = tools.fpcalc {
            collaborators.analyzer = Some(Arc::new(
                Fpcalc::new(fpcalc).with_max_length(settings.fingerprint_max_length_secs),
            ));
        }
        if settings.repair.mp3 {
            if let Some(ref mp3val) = tools.mp3val {
                collaborators.mp3_repairer = Some(Arc::new(Mp3val::new(mp3val)));
            }
        }
        if settings.repair.ffmpeg {
            if let Some(ref ffmpeg) = tools.ffmpeg {
                collaborators.transcoder = Some(Arc::new(Ffmpeg::new(ffmpeg)));
            }
        }
        if let Some(ref ffprobe) = tools.ffprobe {
            collaborators.probe = Some(Arc::new(Ffprobe::new(ffprobe)));
        }
        collaborators
    }

    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    #[must_use]
    pub fn with_mp3_repairer(mut self, repairer: Arc<dyn Mp3Repairer>) -> Self {
        self.mp3_repairer = Some(repairer);
        self
    }

    #[must_use]
    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn BitrateProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownHandler) -> Self {
        self.shutdown = shutdown;
        self
    }
}

/// What happened during a run.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub files_found: usize,
    /// Present when the fingerprinting phase ran.
    pub fingerprint: Option<FingerprintStats>,
    pub duplicate_sets: Vec<DuplicateSet>,
    pub duplicates: QuarantineSummary,
    /// Low-bitrate files found before the ignore filter.
    pub low_bitrate_found: usize,
    pub low_bitrate: QuarantineSummary,
    pub cache_saved: bool,
    pub interrupted: bool,
}

impl ScanReport {
    /// Map the run's result to a process exit code.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.interrupted {
            return ExitCode::Interrupted;
        }
        match self.fingerprint {
            Some(ref stats) if stats.failed > 0 || stats.restore_failures > 0 => {
                ExitCode::PartialSuccess
            }
            Some(_) if self.duplicate_sets.is_empty() => ExitCode::NoDuplicates,
            _ => ExitCode::Success,
        }
    }
}

/// A configured scan, ready to run once.
pub struct Scan {
    settings: RunSettings,
    collaborators: Collaborators,
}

impl Scan {
    #[must_use]
    pub fn new(settings: RunSettings, collaborators: Collaborators) -> Self {
        Self {
            settings,
            collaborators,
        }
    }

    /// Run every phase and save the cache.
    ///
    /// Per-file problems are reported and counted; only an unusable worker
    /// pool aborts the run.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker pool cannot be built.
    pub fn run(self) -> anyhow::Result<ScanReport> {
        let Self {
            settings,
            collaborators,
        } = self;
        let Collaborators {
            analyzer,
            mp3_repairer,
            transcoder,
            probe,
            decisions,
            reporter,
            progress,
            shutdown,
        } = collaborators;

        let mut report = ScanReport::default();
        let root = settings.root.as_path();
        reporter.info(&format!(
            "Quarantine Active: Files will be moved to: {}",
            settings.quarantine_dir.display()
        ));

        let files = discover(&settings, &shutdown, progress.as_ref());
        report.files_found = files.len();
        if shutdown.is_shutdown_requested() {
            report.interrupted = true;
            reporter.warn("Interrupted while scanning for audio files.");
            return Ok(report);
        }
        if files.is_empty() {
            reporter.info(&format!(
                "No audio files found in \"{}\" (excluding quarantine path).",
                root.display()
            ));
            return Ok(report);
        }
        reporter.info(&format!(
            "Found {} audio files (excluding quarantine path). Starting analysis...",
            files.len()
        ));

        let store = CacheStore::in_root(root);
        let disk_cache = if settings.force_refingerprint {
            log::info!("Ignoring the fingerprint cache (--force-re-fingerprint)");
            CacheMap::new()
        } else {
            store.load()
        };
        let working = WorkingSet::build(&files, &disk_cache);

        let mut engine = QuarantineEngine::new(
            decisions,
            QuarantineMover::new(settings.dry_run),
            Arc::clone(&reporter),
        );

        // Duplicate detection
        let mut fingerprint_ran = false;
        let mut cache = if settings.skip_duplicates {
            reporter.info("Skipping duplicate detection as per --skip-duplicates flag.");
            working.cache
        } else if let Some(analyzer) = analyzer {
            fingerprint_ran = true;
            let pipeline = configure_repairs(
                RepairPipeline::new(analyzer).with_reporter(Arc::clone(&reporter)),
                &settings,
                mp3_repairer,
                transcoder,
                &*reporter,
            );

            let mut orchestrator = FingerprintOrchestrator::new(pipeline)
                .with_workers(settings.workers)
                .with_shutdown_flag(shutdown.get_flag());
            if let Some(ref callback) = progress {
                orchestrator = orchestrator.with_progress_callback(Arc::clone(callback));
            }
            let run = orchestrator
                .run(working)
                .context("fingerprinting could not start")?;

            report_fingerprint_stats(&run.stats, &run.failures, &*reporter);
            report.duplicate_sets = resolve_duplicates(&run.groups, &settings.unsorted_marker);
            report.fingerprint = Some(run.stats);

            if shutdown.is_shutdown_requested() {
                report.interrupted = true;
            } else if report.duplicate_sets.is_empty() {
                reporter.info("No acoustically similar duplicate audio files found.");
            } else {
                reporter.info(&format!(
                    "Found {} duplicate set(s) holding {} of extra copies.",
                    report.duplicate_sets.len(),
                    ByteSize::b(reclaimable_bytes(&report.duplicate_sets))
                ));
                report.duplicates =
                    engine.process_duplicates(&report.duplicate_sets, &settings.quarantine_dir);
            }
            run.cache
        } else {
            reporter.warn("Skipping duplicate detection: 'fpcalc' utility not available.");
            working.cache
        };

        // Low-bitrate review
        let mut low_bitrate_ran = false;
        if settings.skip_low_bitrate {
            reporter.info("Skipping low bitrate file check.");
        } else if report.interrupted || shutdown.is_shutdown_requested() {
            report.interrupted = true;
        } else if let Some(probe) = probe {
            let confirmed = settings.assume_low_bitrate_scan
                || engine.confirm_low_bitrate_scan(settings.bitrate_threshold_kbps);
            if confirmed {
                low_bitrate_ran = true;
                let mut scan = BitrateScan::new(probe, settings.bitrate_threshold_kbps)
                    .with_workers(settings.workers)
                    .with_shutdown_flag(shutdown.get_flag());
                if let Some(ref callback) = progress {
                    scan = scan.with_progress_callback(Arc::clone(callback));
                }
                let found = scan
                    .find_low_bitrate(&files)
                    .context("bitrate scan could not start")?;
                report.low_bitrate_found = found.len();

                if shutdown.is_shutdown_requested() {
                    report.interrupted = true;
                } else if found.is_empty() {
                    reporter.info(&format!(
                        "No files identified with bitrates < {}kbps.",
                        settings.bitrate_threshold_kbps
                    ));
                } else {
                    let to_prompt = filter_ignored(found, &mut cache);
                    if to_prompt.is_empty() {
                        reporter.info(&format!(
                            "All {} files identified as low bitrate were previously 'ignored' and unchanged, or no longer exist.",
                            report.low_bitrate_found
                        ));
                    } else {
                        report.low_bitrate = engine.process_low_bitrate(
                            &to_prompt,
                            &settings.low_bitrate_dir,
                            &mut cache,
                        );
                    }
                }
            } else {
                reporter.info("Scan for low bitrate files skipped by user.");
            }
        } else {
            reporter.warn("Skipping low bitrate file check: 'ffprobe' utility not available.");
        }

        let pruned = prune_missing(&mut cache);
        if pruned > 0 {
            log::info!("Pruned {} cache entries for files no longer present", pruned);
        }
        if settings.force_refingerprint || fingerprint_ran || low_bitrate_ran {
            report.cache_saved = save_cache(&store, &cache, &*reporter);
        } else {
            log::info!("No cache-relevant phase ran, leaving the cache file untouched");
        }

        if report.interrupted {
            reporter.warn("Interrupted. Progress so far has been saved.");
        } else {
            reporter.info("Finished scanning and processing.");
        }
        Ok(report)
    }
}

fn discover(
    settings: &RunSettings,
    shutdown: &ShutdownHandler,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Vec<PathBuf> {
    if let Some(callback) = progress {
        callback.on_phase_start("walking", 0);
    }
    let config = WalkerConfig::default()
        .with_extensions(&settings.audio_extensions)
        .with_exclude(&settings.quarantine_dir);
    let files = Walker::new(&settings.root, config)
        .with_shutdown_flag(shutdown.get_flag())
        .discover();
    if let Some(callback) = progress {
        callback.on_phase_end("walking");
    }
    files
}

/// Attach the enabled repair stages, telling the user about missing tools.
fn configure_repairs(
    mut pipeline: RepairPipeline,
    settings: &RunSettings,
    mp3_repairer: Option<Arc<dyn Mp3Repairer>>,
    transcoder: Option<Arc<dyn Transcoder>>,
    reporter: &dyn Reporter,
) -> RepairPipeline {
    if settings.repair.mp3 {
        match mp3_repairer {
            Some(repairer) => {
                reporter.info("MP3 auto-repair enabled. Problematic MP3s will be backed up and repaired with mp3val.");
                pipeline = pipeline.with_mp3_repairer(repairer);
            }
            None => reporter.warn(
                "MP3 auto-repair was requested, but mp3val was not found in PATH. Repair feature will be disabled.",
            ),
        }
    }
    if settings.repair.ffmpeg {
        match transcoder {
            Some(transcoder) => {
                reporter.info("FFmpeg auto-repair enabled (used if mp3val fails or is skipped). This may be LOSSY.");
                pipeline = pipeline.with_transcoder(transcoder);
            }
            None => reporter.warn(
                "FFmpeg auto-repair was requested, but ffmpeg was not found in PATH. Repair feature will be disabled.",
            ),
        }
    }
    pipeline
}

fn report_fingerprint_stats(
    stats: &FingerprintStats,
    failures: &[(PathBuf, String)],
    reporter: &dyn Reporter,
) {
    reporter.info(&format!(
        "Fingerprints: {} from cache, {} analyzed ({} after repair), {} failed",
        stats.cached, stats.analyzed, stats.repaired, stats.failed
    ));
    for (path, error) in failures {
        log::warn!("Could not fingerprint {}: {}", path.display(), error);
    }
    if stats.restore_failures > 0 {
        reporter.error(&format!(
            "CRITICAL: {} file(s) could not be restored from their repair backup. Check the .bak files next to them.",
            stats.restore_failures
        ));
    }
}

fn reclaimable_bytes(sets: &[DuplicateSet]) -> u64 {
    sets.iter()
        .flat_map(|set| set.duplicates.iter())
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .sum()
}

fn save_cache(store: &CacheStore, cache: &CacheMap, reporter: &dyn Reporter) -> bool {
    if cache.is_empty() {
        log::info!("Final cache is empty, not writing a cache file");
        return false;
    }
    match store.save(cache) {
        Ok(()) => true,
        Err(e) => {
            log::error!("Could not save fingerprint cache: {}", e);
            reporter.error(&format!(
                "Could not save fingerprint cache to {}: {}",
                store.path().display(),
                e
            ));
            false
        }
    }
}
