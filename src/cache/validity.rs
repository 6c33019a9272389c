//! Validity gate: decide whether a cached analysis can be trusted.
//!
//! A cached entry is trusted only if the file's current modification time
//! and size match the recorded ones exactly and a decodable fingerprint and
//! duration are present. The gate never touches the file beyond a stat call.

use std::io;
use std::path::{Path, PathBuf};

use crate::analysis::Analysis;

use super::entry::{CacheEntry, FileStamp};
use super::store::CacheMap;

/// Classification of one file against its cache entry.
#[derive(Debug)]
pub enum Validity {
    /// Cached analysis matches the file on disk.
    Valid(Analysis),
    /// File must be analyzed again.
    Stale {
        /// Current stamp of the file.
        stamp: FileStamp,
        /// Prior low-bitrate decision, kept only when the file is unchanged.
        retained_ignore: Option<bool>,
    },
    /// File could not be stat'ed (vanished or inaccessible).
    Unavailable(io::Error),
}

/// Classify `path` against its on-disk cache entry.
#[must_use]
pub fn check_validity(path: &Path, entry: Option<&CacheEntry>) -> Validity {
    let stamp = match FileStamp::capture(path) {
        Ok(s) => s,
        Err(e) => return Validity::Unavailable(e),
    };

    let Some(entry) = entry else {
        return Validity::Stale {
            stamp,
            retained_ignore: None,
        };
    };

    if !entry.matches(&stamp) {
        log::debug!("Cache for {} is stale", path.display());
        return Validity::Stale {
            stamp,
            retained_ignore: None,
        };
    }

    match entry.analysis() {
        Some(analysis) => Validity::Valid(analysis),
        None => Validity::Stale {
            stamp,
            retained_ignore: entry.low_bitrate_ignored,
        },
    }
}

/// Working state for one run, produced by the validity gate.
#[derive(Debug, Default)]
pub struct WorkingSet {
    /// Working copy of the cache: one entry per available file.
    pub cache: CacheMap,
    /// Files whose cached analysis was reused.
    pub cached: Vec<(PathBuf, Analysis)>,
    /// Files that must go through the analysis pipeline.
    pub needs_analysis: Vec<PathBuf>,
    /// Files skipped because they could not be stat'ed.
    pub unavailable: Vec<PathBuf>,
}

impl WorkingSet {
    /// Run the validity gate over every discovered file.
    ///
    /// Pass an empty `disk_cache` to force re-analysis of everything.
    #[must_use]
    pub fn build(paths: &[PathBuf], disk_cache: &CacheMap) -> Self {
        let mut set = Self::default();

        for path in paths {
            let disk_entry = disk_cache.get(path);
            match check_validity(path, disk_entry) {
                Validity::Valid(analysis) => {
                    if let Some(entry) = disk_entry {
                        set.cache.insert(path.clone(), entry.clone());
                    }
                    set.cached.push((path.clone(), analysis));
                }
                Validity::Stale {
                    stamp,
                    retained_ignore,
                } => {
                    let mut entry = CacheEntry::from_stamp(stamp);
                    entry.low_bitrate_ignored = retained_ignore;
                    set.cache.insert(path.clone(), entry);
                    set.needs_analysis.push(path.clone());
                }
                Validity::Unavailable(e) => {
                    log::warn!("Could not stat {}: {}. Skipping.", path.display(), e);
                    set.unavailable.push(path.clone());
                }
            }
        }

        log::info!(
            "Cache validation: {} reusable, {} need analysis, {} unavailable",
            set.cached.len(),
            set.needs_analysis.len(),
            set.unavailable.len()
        );

        set
    }
}
