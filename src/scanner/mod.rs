//! Scanner module for audio file discovery.
//!
//! This module provides:
//! - Validation of the scan root
//! - Recursive discovery of audio files by extension using walkdir
//! - Pruning of the quarantine directory so moved files are never rescanned
//!
//! # Example
//!
//! ```no_run
//! use musicscan::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig::default().with_exclude(Path::new("/music/Deletions"));
//! let walker = Walker::new(Path::new("/music"), config);
//! for path in walker.discover() {
//!     println!("{}", path.display());
//! }
//! ```

pub mod walker;

use std::path::{Path, PathBuf};

pub use walker::Walker;

/// Audio extensions scanned by default (compared case-insensitively).
pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "m4a", "ogg", "aac", "opus", "wma", "aiff", "ape",
];

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Lowercase extensions (without the dot) of files to collect.
    pub extensions: Vec<String>,

    /// Directory subtree never entered (the quarantine directory).
    pub exclude: Option<PathBuf>,

    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_AUDIO_EXTENSIONS
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
            exclude: None,
            follow_symlinks: false,
        }
    }
}

impl WalkerConfig {
    /// Replace the extension list. Leading dots and case are ignored.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn with_exclude(mut self, dir: &Path) -> Self {
        self.exclude = Some(dir.to_path_buf());
        self
    }

    /// Whether `path` has one of the configured extensions.
    #[must_use]
    pub fn is_audio(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            self.extensions.iter().any(|e| *e == ext)
        })
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file or directory.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Check that `root` is an existing directory and return its absolute form.
///
/// # Errors
///
/// Returns [`ScanError::NotFound`] or [`ScanError::NotADirectory`].
pub fn validate_root(root: &Path) -> Result<PathBuf, ScanError> {
    let absolute = std::path::absolute(root).map_err(|source| ScanError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    if !absolute.exists() {
        return Err(ScanError::NotFound(absolute));
    }
    if !absolute.is_dir() {
        return Err(ScanError::NotADirectory(absolute));
    }
    Ok(absolute)
}
