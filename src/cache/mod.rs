//! Fingerprint cache for musicscan.
//!
//! This module keeps fingerprints and durations between runs so unchanged
//! files are never analyzed twice.
//!
//! # Architecture
//!
//! * [`store`]: JSON persistence with atomic save and corruption recovery.
//! * [`entry`]: The per-file record and its [`FileStamp`] identity.
//! * [`validity`]: The gate deciding whether a cached analysis is trusted.
//!
//! # Cache Invalidation
//!
//! Entries are validated using:
//! * File path (absolute, the map key)
//! * File size
//! * Modification time (mtime)
//!
//! If either attribute changes, the fingerprint is discarded and the file is
//! analyzed again.

pub mod entry;
pub mod store;
pub mod validity;

pub use entry::{CacheEntry, FileStamp};
pub use store::{prune_missing, CacheError, CacheMap, CacheResult, CacheStore, CACHE_FILENAME};
pub use validity::{check_validity, Validity, WorkingSet};
