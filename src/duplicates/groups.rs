//! Fingerprint grouping and canonical-file selection.
//!
//! # Overview
//!
//! Files are grouped by the exact pair (fingerprint bytes, duration rounded
//! to whole seconds). Every group with two or more members is a duplicate
//! set. Within a set one file is kept as the canonical copy; the rest are
//! quarantine candidates.
//!
//! ## Canonical Selection
//!
//! Members are sorted by the key `(in_unsorted, -size, path)` and the first
//! one wins:
//!
//! 1. Files outside the "Music/Unsorted" area beat files inside it
//! 2. Larger files beat smaller ones
//! 3. The lexicographically smaller path string breaks the remaining ties
//!    (compared as a whole string, not component by component)
//!
//! # Example
//!
//! ```
//! use musicscan::duplicates::{FingerprintGroups, UnsortedMarker};
//! use musicscan::analysis::{Analysis, Fingerprint};
//! use std::path::{Path, PathBuf};
//!
//! let fp = Fingerprint::new(b"AQAD".to_vec());
//! let mut groups = FingerprintGroups::new();
//! groups.insert(PathBuf::from("/m/Music/Unsorted/a.mp3"), &Analysis::new(200.2, fp.clone()));
//! groups.insert(PathBuf::from("/m/Artist/a.mp3"), &Analysis::new(199.8, fp));
//!
//! let sets = groups.resolve_with_sizes(&UnsortedMarker::default(), |_: &Path| Some(1000));
//! assert_eq!(sets.len(), 1);
//! assert_eq!(sets[0].canonical, PathBuf::from("/m/Artist/a.mp3"));
//! ```

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::analysis::{Analysis, Fingerprint};

/// Grouping key: identical fingerprints with the same rounded duration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub fingerprint: Fingerprint,
    pub rounded_duration: i64,
}

impl GroupKey {
    #[must_use]
    pub fn from_analysis(analysis: &Analysis) -> Self {
        Self {
            fingerprint: analysis.fingerprint.clone(),
            rounded_duration: analysis.rounded_duration(),
        }
    }
}

/// Consecutive path segments marking the unsorted area of a library.
///
/// Matched case-insensitively anywhere in a path. The default marker is
/// `Music/Unsorted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsortedMarker {
    segments: Vec<String>,
}

impl Default for UnsortedMarker {
    fn default() -> Self {
        Self::new(["Music", "Unsorted"])
    }
}

impl UnsortedMarker {
    #[must_use]
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Parse a `/`-separated marker such as `"Music/Unsorted"`.
    #[must_use]
    pub fn parse(marker: &str) -> Self {
        Self::new(marker.split(['/', '\\']))
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the marker segments appear consecutively in `path`.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        if self.segments.is_empty() {
            return false;
        }
        let parts: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().to_lowercase()),
                _ => None,
            })
            .collect();

        parts
            .windows(self.segments.len())
            .any(|w| w == self.segments.as_slice())
    }
}

/// One canonical file and the duplicates to consider quarantining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateSet {
    pub canonical: PathBuf,
    pub duplicates: Vec<PathBuf>,
}

/// Analyzed files grouped by [`GroupKey`].
#[derive(Debug, Default, Clone)]
pub struct FingerprintGroups {
    groups: HashMap<GroupKey, Vec<PathBuf>>,
}

impl FingerprintGroups {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a successfully analyzed file.
    pub fn insert(&mut self, path: PathBuf, analysis: &Analysis) {
        self.groups
            .entry(GroupKey::from_analysis(analysis))
            .or_default()
            .push(path);
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of grouped files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Members of the group for `key`, in insertion order.
    #[must_use]
    pub fn get(&self, key: &GroupKey) -> Option<&[PathBuf]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Resolve duplicate sets using current file sizes from disk.
    #[must_use]
    pub fn resolve(&self, marker: &UnsortedMarker) -> Vec<DuplicateSet> {
        self.resolve_with_sizes(marker, |p| fs::metadata(p).ok().map(|m| m.len()))
    }

    /// Resolve duplicate sets with an injectable size lookup.
    ///
    /// Members for which `size_of` returns `None` have vanished and are
    /// dropped; a group left with fewer than two members yields no set.
    /// Sets are returned ordered by canonical path string.
    pub fn resolve_with_sizes<F>(&self, marker: &UnsortedMarker, size_of: F) -> Vec<DuplicateSet>
    where
        F: Fn(&Path) -> Option<u64>,
    {
        let mut sets = Vec::new();

        for members in self.groups.values() {
            if members.len() < 2 {
                continue;
            }

            let mut ranked: Vec<(bool, u64, &PathBuf)> = members
                .iter()
                .filter_map(|p| match size_of(p) {
                    Some(size) => Some((marker.matches(p), size, p)),
                    None => {
                        log::warn!(
                            "Duplicate candidate {} no longer exists, skipping",
                            p.display()
                        );
                        None
                    }
                })
                .collect();

            if ranked.len() < 2 {
                continue;
            }

            ranked.sort_by(|a, b| {
                (a.0, Reverse(a.1), a.2.as_os_str()).cmp(&(b.0, Reverse(b.1), b.2.as_os_str()))
            });

            let mut paths = ranked.into_iter().map(|(_, _, p)| p.clone());
            if let Some(canonical) = paths.next() {
                sets.push(DuplicateSet {
                    canonical,
                    duplicates: paths.collect(),
                });
            }
        }

        sets.sort_by(|a, b| a.canonical.as_os_str().cmp(b.canonical.as_os_str()));
        log::info!("Found {} duplicate set(s)", sets.len());
        sets
    }
}
