//! JSON-backed fingerprint cache store.
//!
//! The cache is a single JSON object stored inside the scanned root, mapping
//! absolute path strings to [`CacheEntry`] objects. Loading never fails the
//! run: a missing or corrupted file yields an empty map. Saving is atomic:
//! the map is serialized to a sibling `.tmp` file which is then renamed over
//! the target. Entries whose path has no UTF-8 form cannot be a JSON key;
//! they are left out of the file with a warning and analyzed again next run.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::entry::CacheEntry;

/// Well-known cache file name inside the scanned root.
pub const CACHE_FILENAME: &str = ".musicscan_fp_cache.json";

/// In-memory cache map keyed by absolute path.
///
/// A `BTreeMap` keeps the serialized file in a stable order.
pub type CacheMap = BTreeMap<PathBuf, CacheEntry>;

/// Errors raised by the cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read cache {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cache {path} is corrupted: {source}")]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize cache: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Durable location of the fingerprint cache.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// Store at the well-known file name inside `root`.
    #[must_use]
    pub fn in_root(root: &Path) -> Self {
        Self {
            path: root.join(CACHE_FILENAME),
        }
    }

    /// Store at an explicit file path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Load the cache, treating any failure as an empty cache.
    #[must_use]
    pub fn load(&self) -> CacheMap {
        match self.try_load() {
            Ok(Some(map)) => {
                log::info!(
                    "Fingerprint cache loaded from {} with {} entries",
                    self.path.display(),
                    map.len()
                );
                map
            }
            Ok(None) => {
                log::info!(
                    "Fingerprint cache not found at {}. A new cache will be created.",
                    self.path.display()
                );
                CacheMap::new()
            }
            Err(e) => {
                log::warn!("{}. Starting with an empty cache.", e);
                CacheMap::new()
            }
        }
    }

    /// Load the cache, reporting errors.
    ///
    /// Returns `Ok(None)` if the file does not exist. Entries with only one
    /// of fingerprint/duration are normalized to neither.
    ///
    /// # Errors
    ///
    /// [`CacheError::Read`] or [`CacheError::Corrupted`].
    pub fn try_load(&self) -> CacheResult<Option<CacheMap>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut map: CacheMap =
            serde_json::from_str(&content).map_err(|source| CacheError::Corrupted {
                path: self.path.clone(),
                source,
            })?;

        for (path, entry) in &mut map {
            if entry.normalize() {
                log::debug!(
                    "Dropped incomplete fingerprint data for {}",
                    path.display()
                );
            }
        }

        Ok(Some(map))
    }

    /// Atomically persist `map`.
    ///
    /// On failure the temporary file is removed and any previous cache file
    /// is left untouched.
    ///
    /// # Errors
    ///
    /// [`CacheError::Serialize`] or [`CacheError::Write`].
    pub fn save(&self, map: &CacheMap) -> CacheResult<()> {
        let temp = self.temp_path();

        let result = self.write_temp(&temp, map).and_then(|()| {
            fs::rename(&temp, &self.path).map_err(|source| CacheError::Write {
                path: self.path.clone(),
                source,
            })
        });

        match result {
            Ok(()) => {
                log::info!(
                    "Fingerprint cache with {} entries saved to {}",
                    map.len(),
                    self.path.display()
                );
                Ok(())
            }
            Err(e) => {
                if temp.exists() {
                    if let Err(rm) = fs::remove_file(&temp) {
                        log::error!(
                            "Could not remove temporary cache file {}: {}",
                            temp.display(),
                            rm
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn write_temp(&self, temp: &Path, map: &CacheMap) -> CacheResult<()> {
        let write_err = |source| CacheError::Write {
            path: temp.to_path_buf(),
            source,
        };

        let entries = serializable_entries(map);

        let file = File::create(temp).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &entries).map_err(CacheError::Serialize)?;
        writer.flush().map_err(write_err)?;
        writer
            .into_inner()
            .map_err(|e| write_err(e.into_error()))?
            .sync_all()
            .map_err(write_err)?;
        Ok(())
    }
}

/// Borrow the entries that can be written as JSON object keys.
fn serializable_entries(map: &CacheMap) -> BTreeMap<&str, &CacheEntry> {
    map.iter()
        .filter_map(|(path, entry)| match path.to_str() {
            Some(key) => Some((key, entry)),
            None => {
                log::warn!(
                    "Not caching {}: path is not valid UTF-8",
                    path.display()
                );
                None
            }
        })
        .collect()
}

/// Remove entries whose file no longer exists.
///
/// Returns the number of entries pruned.
pub fn prune_missing(map: &mut CacheMap) -> usize {
    let before = map.len();
    map.retain(|path, _| {
        let exists = path.exists();
        if !exists {
            log::info!(
                "Pruning cache entry for non-existent file: {}",
                path.display()
            );
        }
        exists
    });
    before - map.len()
}
