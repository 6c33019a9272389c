//! Duplicate detection: fingerprint orchestration and canonical selection.
//!
//! - [`finder`]: runs analysis (with repair) over a bounded worker pool
//! - [`groups`]: groups by fingerprint and picks the file to keep

pub mod finder;
pub mod groups;

pub use finder::{
    default_worker_count, FinderError, FingerprintOrchestrator, FingerprintRun, FingerprintStats,
};
pub use groups::{DuplicateSet, FingerprintGroups, GroupKey, UnsortedMarker};

/// Resolve duplicate sets from `groups`, reading file sizes from disk.
#[must_use]
pub fn resolve_duplicates(groups: &FingerprintGroups, marker: &UnsortedMarker) -> Vec<DuplicateSet> {
    groups.resolve(marker)
}
