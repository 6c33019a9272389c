//! Cache entry definitions.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::analysis::{Analysis, Fingerprint};

/// Identity of a file on disk: modification time plus size.
///
/// Two stamps are equal only if both fields match exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileStamp {
    /// Modification time in seconds since the Unix epoch.
    pub mtime: f64,
    /// File size in bytes.
    pub size: u64,
}

impl FileStamp {
    /// Stat `path` and capture its current stamp.
    ///
    /// # Errors
    ///
    /// Propagates the underlying stat error (typically `NotFound`).
    pub fn capture(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let mtime = metadata
            .modified()
            .map(system_time_to_secs)
            .unwrap_or(0.0);
        Ok(Self {
            mtime,
            size: metadata.len(),
        })
    }
}

/// Convert a `SystemTime` into float seconds since the Unix epoch.
#[must_use]
pub fn system_time_to_secs(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Cached analysis metadata for one absolute file path.
///
/// `fingerprint_hex` and `duration` are either both present or both absent;
/// [`CacheEntry::normalize`] enforces this for entries read from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Modification time (seconds since epoch) when the entry was recorded.
    pub mtime: f64,
    /// File size in bytes when the entry was recorded.
    pub size: u64,
    /// Hex-encoded fingerprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_hex: Option<String>,
    /// Duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Tri-state user decision on the low-bitrate prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_bitrate_ignored: Option<bool>,
}

impl CacheEntry {
    /// Entry carrying only a file stamp.
    #[must_use]
    pub fn from_stamp(stamp: FileStamp) -> Self {
        Self {
            mtime: stamp.mtime,
            size: stamp.size,
            fingerprint_hex: None,
            duration: None,
            low_bitrate_ignored: None,
        }
    }

    #[must_use]
    pub fn stamp(&self) -> FileStamp {
        FileStamp {
            mtime: self.mtime,
            size: self.size,
        }
    }

    /// Whether the recorded stamp equals `stamp`.
    #[must_use]
    pub fn matches(&self, stamp: &FileStamp) -> bool {
        self.mtime == stamp.mtime && self.size == stamp.size
    }

    /// Whether both fingerprint and duration are recorded.
    #[must_use]
    pub fn has_analysis(&self) -> bool {
        self.fingerprint_hex.is_some() && self.duration.is_some()
    }

    /// Decode the stored analysis.
    ///
    /// Returns `None` if either half is missing or the hex does not decode.
    #[must_use]
    pub fn analysis(&self) -> Option<Analysis> {
        let hex = self.fingerprint_hex.as_deref()?;
        let duration = self.duration?;
        match Fingerprint::from_hex(hex) {
            Ok(fp) => Some(Analysis::new(duration, fp)),
            Err(e) => {
                log::warn!("Cached fingerprint could not be decoded: {}", e);
                None
            }
        }
    }

    /// Record a fresh analysis.
    ///
    /// Also refreshes the stamp and clears any low-bitrate decision, since
    /// the content may have changed.
    pub fn set_analysis(&mut self, analysis: &Analysis, stamp: FileStamp) {
        self.fingerprint_hex = Some(analysis.fingerprint.to_hex());
        self.duration = Some(analysis.duration);
        self.mtime = stamp.mtime;
        self.size = stamp.size;
        self.low_bitrate_ignored = None;
    }

    /// Record a low-bitrate decision against the file's current stamp.
    pub fn set_low_bitrate_ignored(&mut self, ignored: bool, stamp: FileStamp) {
        self.low_bitrate_ignored = Some(ignored);
        self.mtime = stamp.mtime;
        self.size = stamp.size;
    }

    /// Drop a half-present fingerprint/duration pair.
    ///
    /// Returns `true` if the entry was modified.
    pub fn normalize(&mut self) -> bool {
        if self.fingerprint_hex.is_some() != self.duration.is_some() {
            self.fingerprint_hex = None;
            self.duration = None;
            true
        } else {
            false
        }
    }
}
