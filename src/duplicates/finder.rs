//! Fingerprint orchestrator.
//!
//! # Overview
//!
//! Takes the [`WorkingSet`] produced by the validity gate and turns it into
//! [`FingerprintGroups`]:
//!
//! 1. Files with a reusable cached analysis are grouped directly
//! 2. Every other file runs through the [`RepairPipeline`] on a bounded
//!    `rayon` pool
//! 3. Each result is merged into the shared working cache and the groups
//!    under one mutex
//!
//! Workers never touch the same file twice, so the per-file backup/restore
//! logic needs no locking. The groups are only read after the pool has
//! joined.
//!
//! # Example
//!
//! ```no_run
//! use musicscan::analysis::Fpcalc;
//! use musicscan::cache::{CacheMap, WorkingSet};
//! use musicscan::duplicates::FingerprintOrchestrator;
//! use musicscan::repair::RepairPipeline;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let paths = vec![PathBuf::from("/music/a.mp3")];
//! let working = WorkingSet::build(&paths, &CacheMap::new());
//! let pipeline = RepairPipeline::new(Arc::new(Fpcalc::new("fpcalc")));
//!
//! let run = FingerprintOrchestrator::new(pipeline)
//!     .with_workers(2)
//!     .run(working)
//!     .unwrap();
//! println!("{} files analyzed", run.stats.analyzed);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use thiserror::Error;

use crate::cache::{CacheEntry, CacheMap, FileStamp, WorkingSet};
use crate::progress::ProgressCallback;
use crate::repair::{RepairOutcome, RepairPipeline};

use super::groups::FingerprintGroups;

/// Errors from the orchestrator itself (per-file failures are counted, not raised).
#[derive(Debug, Error)]
pub enum FinderError {
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Default worker count: half the available cores, at least one.
#[must_use]
pub fn default_worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    (cores / 2).max(1)
}

/// Counters for one fingerprinting phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintStats {
    /// Files whose cached analysis was reused.
    pub cached: usize,
    /// Files analyzed in this run (including repaired ones).
    pub analyzed: usize,
    /// Files analyzed only after a repair stage.
    pub repaired: usize,
    /// Files that could not be analyzed.
    pub failed: usize,
    /// Files that disappeared after analysis.
    pub vanished: usize,
    /// Files whose original could not be restored after a failed repair.
    pub restore_failures: usize,
    /// Files not started because shutdown was requested.
    pub skipped: usize,
}

impl FingerprintStats {
    /// Files with an analysis available for grouping.
    #[must_use]
    pub fn fingerprinted(&self) -> usize {
        self.cached + self.analyzed
    }
}

/// Result of a fingerprinting phase.
#[derive(Debug, Default)]
pub struct FingerprintRun {
    pub groups: FingerprintGroups,
    /// Working cache with every new analysis merged in.
    pub cache: CacheMap,
    pub stats: FingerprintStats,
    /// Files that could not be analyzed, with the last error seen.
    pub failures: Vec<(PathBuf, String)>,
}

#[derive(Default)]
struct Shared {
    groups: FingerprintGroups,
    cache: CacheMap,
    stats: FingerprintStats,
    failures: Vec<(PathBuf, String)>,
}

impl Shared {
    fn merge(&mut self, outcome: RepairOutcome) {
        if outcome.restore_failed {
            self.stats.restore_failures += 1;
        }

        let Some(analysis) = outcome.analysis else {
            self.stats.failed += 1;
            self.failures.push((
                outcome.path,
                outcome.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
            return;
        };

        // Repair may have rewritten the file, so the stamp is taken afresh.
        let stamp = match FileStamp::capture(&outcome.path) {
            Ok(s) => s,
            Err(e) => {
                log::warn!(
                    "{} vanished after analysis ({}), discarding result",
                    outcome.path.display(),
                    e
                );
                self.stats.vanished += 1;
                return;
            }
        };

        self.cache
            .entry(outcome.path.clone())
            .or_insert_with(|| CacheEntry::from_stamp(stamp))
            .set_analysis(&analysis, stamp);

        self.stats.analyzed += 1;
        if outcome.repaired_by.is_some() {
            self.stats.repaired += 1;
        }
        self.groups.insert(outcome.path, &analysis);
    }
}

/// Runs the repair pipeline over every file that needs analysis.
pub struct FingerprintOrchestrator {
    pipeline: RepairPipeline,
    workers: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl FingerprintOrchestrator {
    #[must_use]
    pub fn new(pipeline: RepairPipeline) -> Self {
        Self {
            pipeline,
            workers: default_worker_count(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the worker count. Zero falls back to the default.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 {
            default_worker_count()
        } else {
            workers
        };
        self
    }

    /// Stop dispatching new files once the flag is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Group cached analyses and analyze everything else.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::ThreadPool`] if the worker pool cannot be built.
    pub fn run(&self, working: WorkingSet) -> Result<FingerprintRun, FinderError> {
        let WorkingSet {
            cache,
            cached,
            needs_analysis,
            ..
        } = working;

        let mut shared = Shared {
            cache,
            ..Shared::default()
        };
        shared.stats.cached = cached.len();
        for (path, analysis) in cached {
            shared.groups.insert(path, &analysis);
        }

        if needs_analysis.is_empty() {
            log::info!("All {} files were served from cache", shared.stats.cached);
            return Ok(shared.into_run());
        }

        log::info!(
            "Fingerprinting {} files with {} workers",
            needs_analysis.len(),
            self.workers
        );

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start("fingerprint", needs_analysis.len());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;

        let shared = Mutex::new(shared);
        let completed = AtomicUsize::new(0);

        pool.install(|| {
            needs_analysis.par_iter().for_each(|path| {
                if self.is_shutdown_requested() {
                    lock(&shared).stats.skipped += 1;
                    return;
                }

                let outcome = self.pipeline.run(path);
                lock(&shared).merge(outcome);

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                self.report_progress(done, path);
            });
        });

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end("fingerprint");
        }

        let shared = shared.into_inner().unwrap_or_else(PoisonError::into_inner);
        if shared.stats.skipped > 0 {
            log::warn!(
                "Shutdown requested: {} files were not fingerprinted",
                shared.stats.skipped
            );
        }
        log::info!(
            "Fingerprinting complete: {} analyzed ({} repaired), {} failed, {} from cache",
            shared.stats.analyzed,
            shared.stats.repaired,
            shared.stats.failed,
            shared.stats.cached
        );

        Ok(shared.into_run())
    }

    fn report_progress(&self, done: usize, path: &Path) {
        if let Some(ref callback) = self.progress_callback {
            callback.on_progress(done, path.to_string_lossy().as_ref());
        }
    }
}

impl Shared {
    fn into_run(self) -> FingerprintRun {
        FingerprintRun {
            groups: self.groups,
            cache: self.cache,
            stats: self.stats,
            failures: self.failures,
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> std::sync::MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
