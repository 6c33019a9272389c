//! Chromaprint `fpcalc` analyzer.
//!
//! Runs `fpcalc [-length N] FILE` and parses its key/value output:
//!
//! ```text
//! DURATION=241
//! FINGERPRINT=AQADtEmUaEkSRZEGAA...
//! ```
//!
//! A non-zero exit status is reported as `fpcalc exited with status N`,
//! which places the failure in the recoverable class.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{Analysis, AnalysisError, Analyzer, Fingerprint};

/// Analyzer backed by the `fpcalc` executable.
#[derive(Debug, Clone)]
pub struct Fpcalc {
    binary: PathBuf,
    max_length_secs: u32,
}

impl Fpcalc {
    /// Create an analyzer using the given `fpcalc` binary.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            max_length_secs: 0,
        }
    }

    /// Limit how many seconds of audio are fingerprinted (0 = whole file).
    #[must_use]
    pub fn with_max_length(mut self, secs: u32) -> Self {
        self.max_length_secs = secs;
        self
    }

    /// Parse `fpcalc` standard output.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Other`] if either field is missing or malformed.
    pub fn parse_output(path: &Path, stdout: &str) -> Result<Analysis, AnalysisError> {
        let mut duration = None;
        let mut fingerprint = None;

        for line in stdout.lines() {
            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "DURATION" => duration = value.trim().parse::<f64>().ok(),
                    "FINGERPRINT" => {
                        let value = value.trim();
                        if !value.is_empty() {
                            fingerprint = Some(Fingerprint::new(value.as_bytes().to_vec()));
                        }
                    }
                    _ => {}
                }
            }
        }

        match (duration, fingerprint) {
            (Some(duration), Some(fingerprint)) => Ok(Analysis::new(duration, fingerprint)),
            _ => Err(AnalysisError::Other {
                path: path.to_path_buf(),
                message: "fpcalc output malformed".to_string(),
            }),
        }
    }
}

impl Analyzer for Fpcalc {
    fn analyze(&self, path: &Path) -> Result<Analysis, AnalysisError> {
        let mut cmd = Command::new(&self.binary);
        if self.max_length_secs > 0 {
            cmd.arg("-length").arg(self.max_length_secs.to_string());
        }
        cmd.arg(path);

        let output = cmd.output().map_err(|e| AnalysisError::Other {
            path: path.to_path_buf(),
            message: format!("could not run {}: {}", self.binary.display(), e),
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            log::debug!(
                "fpcalc failed for {} (status {}): {}",
                path.display(),
                code,
                stderr.trim()
            );
            return Err(AnalysisError::classify(
                path,
                format!("fpcalc exited with status {}: {}", code, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match Self::parse_output(path, &stdout) {
            Ok(analysis) => Ok(analysis),
            // fpcalc occasionally exits 0 after printing a decoder error
            Err(_) if !stderr.trim().is_empty() => {
                Err(AnalysisError::classify(path, stderr.trim().to_string()))
            }
            Err(e) => Err(e),
        }
    }
}
