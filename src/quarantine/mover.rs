//! Moves files into a quarantine directory without overwriting anything.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from a quarantine move.
#[derive(Debug, Error)]
pub enum QuarantineError {
    #[error("could not create quarantine directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of a single move request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The file now lives at this path.
    Moved(PathBuf),
    /// Dry run: the file would have been moved here.
    WouldMove(PathBuf),
    /// The source no longer exists; nothing was done.
    SourceMissing,
}

impl MoveOutcome {
    /// Whether this counts as a (real or hypothetical) move.
    #[must_use]
    pub fn counts_as_moved(&self) -> bool {
        matches!(self, Self::Moved(_) | Self::WouldMove(_))
    }
}

/// First free path for `file_name` in `dir`.
///
/// `a.mp3` becomes `a (1).mp3`, then `a (2).mp3`, and so on.
#[must_use]
pub fn unique_destination(dir: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u64;
    loop {
        let candidate = dir.join(format!("{stem} ({counter}){ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Performs (or in dry-run mode, simulates) quarantine moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuarantineMover {
    dry_run: bool,
}

impl QuarantineMover {
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Move `source` into `dir` under a collision-free name.
    ///
    /// The directory is created on the first real move. In dry-run mode
    /// nothing on disk changes.
    ///
    /// # Errors
    ///
    /// Returns [`QuarantineError`] if the directory cannot be created or the
    /// move fails.
    pub fn move_file(&self, source: &Path, dir: &Path) -> Result<MoveOutcome, QuarantineError> {
        if !source.exists() {
            log::warn!(
                "Source file for quarantine not found (already moved or deleted?): {}",
                source.display()
            );
            return Ok(MoveOutcome::SourceMissing);
        }

        let Some(file_name) = source.file_name() else {
            return Err(QuarantineError::Move {
                from: source.to_path_buf(),
                to: dir.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            });
        };

        if self.dry_run {
            let destination = unique_destination(dir, file_name);
            log::info!(
                "DRY RUN: Would move '{}' to '{}'",
                source.display(),
                destination.display()
            );
            return Ok(MoveOutcome::WouldMove(destination));
        }

        fs::create_dir_all(dir).map_err(|e| QuarantineError::CreateDir {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let destination = unique_destination(dir, file_name);
        move_across(source, &destination).map_err(|e| QuarantineError::Move {
            from: source.to_path_buf(),
            to: destination.clone(),
            source: e,
        })?;

        log::info!(
            "Moved '{}' to '{}'",
            source.display(),
            destination.display()
        );
        Ok(MoveOutcome::Moved(destination))
    }
}

/// Rename, falling back to copy + remove when crossing filesystems.
fn move_across(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            log::debug!(
                "rename {} -> {} failed ({}), copying instead",
                from.display(),
                to.display(),
                rename_err
            );
            fs::copy(from, to)?;
            if let Err(e) = fs::remove_file(from) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
    }
}
