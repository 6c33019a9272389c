//! Primary analysis operation: audio duration plus acoustic fingerprint.
//!
//! # Overview
//!
//! The fingerprinting algorithm itself lives outside this crate. This module
//! defines the contract the rest of the pipeline relies on:
//!
//! - [`Analyzer`]: takes a path, returns an [`Analysis`] or a typed failure
//! - [`AnalysisError`]: `Recoverable` failures are eligible for the repair
//!   pipeline, `Other` failures are not
//! - [`Fingerprint`]: opaque fingerprint bytes with hex encoding for the cache
//!
//! The production implementation is [`Fpcalc`], which shells out to the
//! Chromaprint `fpcalc` utility.

pub mod fpcalc;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use fpcalc::Fpcalc;

/// Substrings of a failure message that mark a decode/format problem a
/// repair tool may be able to fix.
pub const RECOVERABLE_SIGNATURES: &[&str] = &[
    "fpcalc exited with status",
    "error decoding",
    "header missing",
];

/// Check whether a failure message belongs to the recoverable class.
#[must_use]
pub fn is_recoverable_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    RECOVERABLE_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

/// Opaque acoustic fingerprint bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    /// Wrap raw fingerprint bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw fingerprint bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hexadecimal encoding, as stored in the cache file.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Decode a hexadecimal string (either case).
    ///
    /// # Errors
    ///
    /// Returns [`hex::FromHexError`] on odd length or a non-hex character.
    pub fn from_hex(encoded: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(encoded.trim()).map(Self)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        if hex.len() > 16 {
            write!(f, "Fingerprint({}…, {} bytes)", &hex[..16], self.0.len())
        } else {
            write!(f, "Fingerprint({hex})")
        }
    }
}

/// Result of a successful analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Audio duration in seconds.
    pub duration: f64,
    /// Acoustic fingerprint.
    pub fingerprint: Fingerprint,
}

impl Analysis {
    #[must_use]
    pub fn new(duration: f64, fingerprint: Fingerprint) -> Self {
        Self {
            duration,
            fingerprint,
        }
    }

    /// Duration rounded to the nearest whole second, ties to even.
    #[must_use]
    pub fn rounded_duration(&self) -> i64 {
        self.duration.round_ties_even() as i64
    }
}

/// Failure of the primary analysis operation.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Decode/format failure that a repair tool may fix.
    #[error("recoverable analysis failure for {path}: {message}")]
    Recoverable { path: PathBuf, message: String },

    /// Any other failure. Never retried.
    #[error("analysis failed for {path}: {message}")]
    Other { path: PathBuf, message: String },
}

impl AnalysisError {
    /// Classify a failure message into the recoverable or unrecoverable class.
    #[must_use]
    pub fn classify(path: &Path, message: impl Into<String>) -> Self {
        let message = message.into();
        if is_recoverable_message(&message) {
            Self::Recoverable {
                path: path.to_path_buf(),
                message,
            }
        } else {
            Self::Other {
                path: path.to_path_buf(),
                message,
            }
        }
    }

    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable { .. })
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Recoverable { message, .. } | Self::Other { message, .. } => message,
        }
    }
}

/// The primary analysis operation.
///
/// Implementations must be callable from several worker threads at once;
/// a single file is never analyzed concurrently with itself.
pub trait Analyzer: Send + Sync {
    /// Compute duration and fingerprint for `path`.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::Recoverable`] for decode/format problems,
    /// [`AnalysisError::Other`] for everything else.
    fn analyze(&self, path: &Path) -> Result<Analysis, AnalysisError>;
}
