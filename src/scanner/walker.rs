//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! The walker visits the root recursively and yields the absolute paths of
//! files whose extension is in the configured audio list. The quarantine
//! directory is pruned with `filter_entry`, so its subtree is never read.
//!
//! # Error Handling
//!
//! Unreadable directories and entries are reported as [`ScanError`]s in the
//! iterator; [`Walker::discover`] logs and skips them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

use super::{ScanError, WalkerConfig};

/// Directory walker for audio file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// Relative roots are made absolute against the current directory.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        let root = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        Self {
            root,
            config,
            shutdown_flag: None,
        }
    }

    /// Stop iteration as soon as the flag is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.config.exclude.as_deref().is_some_and(|ex| path == ex)
    }

    /// Walk the tree, yielding audio file paths and access errors.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                let prune = entry.file_type().is_dir() && self.is_excluded(entry.path());
                if prune {
                    log::debug!(
                        "Skipping quarantine directory: {}",
                        entry.path().display()
                    );
                }
                !prune
            })
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    return false;
                }
                true
            })
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() && !entry.path().is_file() {
                        return None;
                    }
                    let path = entry.into_path();
                    if self.config.is_audio(&path) {
                        Some(Ok(path))
                    } else {
                        log::trace!("Not an audio file: {}", path.display());
                        None
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    log::warn!("Could not read {}: {}", path.display(), e);
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                    Some(Err(ScanError::Io { path, source }))
                }
            })
    }

    /// Collect every audio file, skipping errors, sorted by path.
    #[must_use]
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.walk().filter_map(Result::ok).collect();
        files.sort();
        log::info!(
            "Found {} audio files under {}",
            files.len(),
            self.root.display()
        );
        files
    }
}
