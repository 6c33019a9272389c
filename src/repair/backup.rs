//! Scoped safety backups for repair stages.
//!
//! A [`BackupGuard`] copies the original next to itself before a repair tool
//! touches it. The guard must be resolved one of two ways:
//!
//! * [`BackupGuard::commit`]: the repair worked, delete the backup.
//! * [`BackupGuard::restore`]: the repair did not work, put the original back.
//!
//! A guard dropped without being resolved restores the original.

use std::fs;
use std::path::{Path, PathBuf};

use filetime::FileTime;

use super::RepairError;

/// Safety copy of a file, restored unless explicitly committed.
#[derive(Debug)]
pub struct BackupGuard {
    original: PathBuf,
    backup: PathBuf,
    armed: bool,
}

impl BackupGuard {
    /// Path of the backup for `original` taken by the stage named `tag`.
    ///
    /// `song.mp3` with tag `mp3val` becomes `song.mp3.musicscan_mp3val_repair.bak`.
    #[must_use]
    pub fn backup_path(original: &Path, tag: &str) -> PathBuf {
        let mut name = original
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".musicscan_{tag}_repair.bak"));
        original.with_file_name(name)
    }

    /// Copy `original` to its backup path, keeping its modification time.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Backup`] if the copy fails. No partial backup is
    /// left behind and the original is not touched.
    pub fn create(original: &Path, tag: &str) -> Result<Self, RepairError> {
        let backup = Self::backup_path(original, tag);
        let backup_err = |source| RepairError::Backup {
            path: original.to_path_buf(),
            source,
        };

        let metadata = fs::metadata(original).map_err(backup_err)?;
        if let Err(e) = fs::copy(original, &backup) {
            let _ = fs::remove_file(&backup);
            return Err(backup_err(e));
        }

        let mtime = FileTime::from_last_modification_time(&metadata);
        if let Err(e) = filetime::set_file_mtime(&backup, mtime) {
            log::debug!(
                "Could not carry mtime over to backup {}: {}",
                backup.display(),
                e
            );
        }

        log::debug!(
            "Backed up {} to {}",
            original.display(),
            backup.display()
        );

        Ok(Self {
            original: original.to_path_buf(),
            backup,
            armed: true,
        })
    }

    #[must_use]
    pub fn original(&self) -> &Path {
        &self.original
    }

    #[must_use]
    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Keep the repaired file and delete the backup.
    ///
    /// A backup that cannot be deleted is logged and left in place.
    pub fn commit(mut self) {
        self.armed = false;
        if let Err(e) = fs::remove_file(&self.backup) {
            log::warn!(
                "Could not remove backup {}: {}",
                self.backup.display(),
                e
            );
        }
    }

    /// Put the original back from the backup.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::RestoreFailed`] if the backup could not be moved
    /// back. The backup file is left on disk in that case.
    pub fn restore(mut self) -> Result<(), RepairError> {
        self.armed = false;
        self.restore_inner()
    }

    fn restore_inner(&self) -> Result<(), RepairError> {
        let result = fs::rename(&self.backup, &self.original).or_else(|_| {
            fs::copy(&self.backup, &self.original)?;
            let metadata = fs::metadata(&self.backup)?;
            if let Err(e) = filetime::set_file_mtime(
                &self.original,
                FileTime::from_last_modification_time(&metadata),
            ) {
                log::debug!(
                    "Could not carry mtime back to restored {}: {}",
                    self.original.display(),
                    e
                );
            }
            fs::remove_file(&self.backup)
        });

        match result {
            Ok(()) => {
                log::debug!("Restored {} from backup", self.original.display());
                Ok(())
            }
            Err(source) => Err(RepairError::RestoreFailed {
                original: self.original.clone(),
                backup: self.backup.clone(),
                source,
            }),
        }
    }
}

impl Drop for BackupGuard {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            if let Err(e) = self.restore_inner() {
                log::error!("{}", e);
            }
        }
    }
}
