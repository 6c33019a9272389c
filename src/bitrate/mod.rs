//! Low-bitrate candidate detection.
//!
//! Bitrates are read through the [`BitrateProbe`] trait; [`Ffprobe`] is the
//! production implementation. A file whose bitrate cannot be determined is
//! never a candidate.
//!
//! Candidates the user already declined to quarantine, and that have not
//! changed since, are removed by [`filter_ignored`] before any prompt.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Deserialize;
use thiserror::Error;

use crate::cache::{CacheEntry, CacheMap, FileStamp};
use crate::progress::ProgressCallback;

/// Default threshold in kilobits per second.
pub const DEFAULT_THRESHOLD_KBPS: u32 = 256;

/// Errors from a bitrate probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe could not be started: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ffprobe failed for {path}: {stderr}")]
    Failed { path: PathBuf, stderr: String },

    #[error("could not parse ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Reads the audio bitrate of a file.
pub trait BitrateProbe: Send + Sync {
    /// Bitrate in bits per second, or `None` if the file reports none.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] if the probe could not run or its output is unusable.
    fn bitrate(&self, path: &Path) -> Result<Option<u64>, ProbeError>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    bit_rate: Option<serde_json::Value>,
}

/// Extract the bitrate of the first audio stream that reports a parsable one.
///
/// # Errors
///
/// Returns [`ProbeError::Parse`] if `json` is not ffprobe's stream listing.
pub fn parse_ffprobe_json(json: &str) -> Result<Option<u64>, ProbeError> {
    let output: ProbeOutput = serde_json::from_str(json)?;

    for stream in output.streams {
        if stream.codec_type.as_deref() != Some("audio") {
            continue;
        }
        let parsed = match &stream.bit_rate {
            Some(serde_json::Value::String(s)) => s.trim().parse::<u64>().ok(),
            Some(serde_json::Value::Number(n)) => n.as_u64(),
            _ => continue,
        };
        match parsed {
            Some(bps) => return Ok(Some(bps)),
            None => log::warn!("ffprobe: could not parse bit_rate {:?}", stream.bit_rate),
        }
    }
    Ok(None)
}

/// [`BitrateProbe`] running `ffprobe -v quiet -print_format json -show_streams FILE`.
#[derive(Debug, Clone)]
pub struct Ffprobe {
    binary: PathBuf,
}

impl Ffprobe {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl BitrateProbe for Ffprobe {
    fn bitrate(&self, path: &Path) -> Result<Option<u64>, ProbeError> {
        let output = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
            .arg(path)
            .output()
            .map_err(ProbeError::Spawn)?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                path: path.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_ffprobe_json(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Probes files for a bitrate below a threshold on a bounded pool.
pub struct BitrateScan {
    probe: Arc<dyn BitrateProbe>,
    threshold_bps: u64,
    workers: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl BitrateScan {
    /// Scanner flagging files below `threshold_kbps`. Zero means the default.
    #[must_use]
    pub fn new(probe: Arc<dyn BitrateProbe>, threshold_kbps: u32) -> Self {
        let kbps = if threshold_kbps == 0 {
            DEFAULT_THRESHOLD_KBPS
        } else {
            threshold_kbps
        };
        Self {
            probe,
            threshold_bps: u64::from(kbps) * 1000,
            workers: crate::duplicates::default_worker_count(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        if workers > 0 {
            self.workers = workers;
        }
        self
    }

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
    pub fn threshold_bps(&self) -> u64 {
        self.threshold_bps
    }

    /// Whether `path` is below the threshold. Probe failures count as "not low".
    #[must_use]
    pub fn is_low(&self, path: &Path) -> bool {
        match self.probe.bitrate(path) {
            Ok(Some(bps)) => {
                let low = bps < self.threshold_bps;
                log::debug!(
                    "{}: {} kbps ({})",
                    path.display(),
                    bps / 1000,
                    if low { "low" } else { "sufficient" }
                );
                low
            }
            Ok(None) => {
                log::debug!("No audio stream with a bitrate in {}", path.display());
                false
            }
            Err(e) => {
                log::warn!("Could not determine bitrate for {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Return the existing files in `paths` whose bitrate is below the threshold, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be built.
    pub fn find_low_bitrate(
        &self,
        paths: &[PathBuf],
    ) -> Result<Vec<PathBuf>, rayon::ThreadPoolBuildError> {
        let existing: Vec<&PathBuf> = paths.iter().filter(|p| p.exists()).collect();

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_start("bitrate", existing.len());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;
        let completed = AtomicUsize::new(0);

        let mut low: Vec<PathBuf> = pool.install(|| {
            existing
                .par_iter()
                .filter_map(|path| {
                    if self
                        .shutdown_flag
                        .as_ref()
                        .is_some_and(|f| f.load(Ordering::SeqCst))
                    {
                        return None;
                    }
                    let result = self.is_low(path).then(|| (*path).clone());
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback.on_progress(done, path.to_string_lossy().as_ref());
                    }
                    result
                })
                .collect()
        });

        if let Some(ref callback) = self.progress_callback {
            callback.on_phase_end("bitrate");
        }

        low.sort();
        log::info!(
            "{} of {} files are below {} kbps",
            low.len(),
            existing.len(),
            self.threshold_bps / 1000
        );
        Ok(low)
    }
}

/// Drop candidates previously ignored and unchanged; mark the rest for review.
///
/// Every returned candidate gets `low_bitrate_ignored = false` and its
/// current stamp in `cache`. Candidates that cannot be stat'ed are dropped.
pub fn filter_ignored(candidates: Vec<PathBuf>, cache: &mut CacheMap) -> Vec<PathBuf> {
    let mut to_prompt = Vec::with_capacity(candidates.len());

    for path in candidates {
        let stamp = match FileStamp::capture(&path) {
            Ok(s) => s,
            Err(e) => {
                log::warn!(
                    "Could not stat {} for the low bitrate ignore check: {}",
                    path.display(),
                    e
                );
                continue;
            }
        };

        let ignored = cache
            .get(&path)
            .is_some_and(|e| e.matches(&stamp) && e.low_bitrate_ignored == Some(true));
        if ignored {
            log::info!(
                "Skipping low bitrate prompt for {} (previously ignored and unchanged)",
                path.display()
            );
            continue;
        }

        cache
            .entry(path.clone())
            .or_insert_with(|| CacheEntry::from_stamp(stamp))
            .set_low_bitrate_ignored(false, stamp);
        to_prompt.push(path);
    }

    to_prompt
}
