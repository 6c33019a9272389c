use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use musicscan::analysis::{Analysis, Fingerprint};
use musicscan::app::Scan;
use musicscan::cache::{CacheEntry, CacheMap, CacheStore, FileStamp, CACHE_FILENAME};
use musicscan::report::RecordingReporter;
use tempfile::tempdir;

use super::support::{collaborators, run_scan, settings, write_track, ContentAnalyzer};

fn analyzed_entry(path: &Path) -> CacheEntry {
    let stamp = FileStamp::capture(path).unwrap();
    let mut entry = CacheEntry::from_stamp(stamp);
    entry.set_analysis(&Analysis::new(12.5, Fingerprint::new(vec![0xde, 0xad])), stamp);
    entry
}

#[test]
fn test_store_round_trip() {
    let dir = tempdir().unwrap();
    let track = dir.path().join("a.mp3");
    write_track(&track, "a", 10.0, 320);

    let mut map = CacheMap::new();
    map.insert(track.clone(), analyzed_entry(&track));

    let store = CacheStore::in_root(dir.path());
    store.save(&map).unwrap();

    assert_eq!(store.path(), dir.path().join(CACHE_FILENAME));
    assert_eq!(store.load(), map);

    let raw = fs::read_to_string(store.path()).unwrap();
    assert!(raw.contains("\"fingerprint_hex\": \"dead\""));
    assert!(!raw.contains("low_bitrate_ignored"));
}

#[test]
fn test_corrupted_cache_is_treated_as_empty() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(CACHE_FILENAME), "{ not json").unwrap();

    let store = CacheStore::in_root(dir.path());
    assert!(store.try_load().is_err());
    assert!(store.load().is_empty());
}

#[test]
fn test_second_run_is_served_from_cache() {
    let dir = tempdir().unwrap();
    write_track(&dir.path().join("a.mp3"), "a", 100.0, 320);
    write_track(&dir.path().join("b.mp3"), "b", 100.0, 320);

    let (first, _) = run_scan(settings(dir.path()), Vec::<String>::new());
    assert!(first.cache_saved);
    assert_eq!(first.fingerprint.as_ref().unwrap().analyzed, 2);

    let analyzer = ContentAnalyzer::new();
    let reporter = Arc::new(RecordingReporter::new());
    let second = Scan::new(
        settings(dir.path()),
        collaborators(analyzer.clone(), reporter, Vec::<String>::new()),
    )
    .run()
    .unwrap();

    assert_eq!(analyzer.calls(), 0);
    assert_eq!(second.fingerprint.unwrap().cached, 2);
}

#[test]
fn test_modified_file_is_reanalyzed() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.mp3");
    write_track(&a, "a", 100.0, 320);
    write_track(&dir.path().join("b.mp3"), "b", 100.0, 320);
    run_scan(settings(dir.path()), Vec::<String>::new());

    let later = SystemTime::now() + Duration::from_secs(3600);
    filetime::set_file_mtime(&a, FileTime::from_system_time(later)).unwrap();

    let analyzer = ContentAnalyzer::new();
    let report = Scan::new(
        settings(dir.path()),
        collaborators(
            analyzer.clone(),
            Arc::new(RecordingReporter::new()),
            Vec::<String>::new(),
        ),
    )
    .run()
    .unwrap();

    assert_eq!(analyzer.calls(), 1);
    let stats = report.fingerprint.unwrap();
    assert_eq!(stats.cached, 1);
    assert_eq!(stats.analyzed, 1);

    let saved = CacheStore::in_root(dir.path()).load();
    assert!(saved[&a].matches(&FileStamp::capture(&a).unwrap()));
}

#[test]
fn test_force_refingerprint_ignores_cache() {
    let dir = tempdir().unwrap();
    write_track(&dir.path().join("a.mp3"), "a", 100.0, 320);
    run_scan(settings(dir.path()), Vec::<String>::new());

    let mut forced = settings(dir.path());
    forced.force_refingerprint = true;
    let analyzer = ContentAnalyzer::new();
    Scan::new(
        forced,
        collaborators(
            analyzer.clone(),
            Arc::new(RecordingReporter::new()),
            Vec::<String>::new(),
        ),
    )
    .run()
    .unwrap();

    assert_eq!(analyzer.calls(), 1);
}

#[test]
fn test_cache_untouched_when_no_phase_runs() {
    let dir = tempdir().unwrap();
    write_track(&dir.path().join("a.mp3"), "a", 100.0, 320);

    let mut skip_all = settings(dir.path());
    skip_all.skip_duplicates = true;
    skip_all.skip_low_bitrate = true;
    let (report, reporter) = run_scan(skip_all, Vec::<String>::new());

    assert!(!report.cache_saved);
    assert!(!dir.path().join(CACHE_FILENAME).exists());
    assert!(reporter.contains("Skipping duplicate detection"));
}

#[test]
fn test_vanished_entries_are_pruned_on_save() {
    let dir = tempdir().unwrap();
    let gone = dir.path().join("gone.mp3");
    write_track(&dir.path().join("a.mp3"), "a", 100.0, 320);
    write_track(&gone, "g", 100.0, 320);
    run_scan(settings(dir.path()), Vec::<String>::new());
    assert!(CacheStore::in_root(dir.path()).load().contains_key(&gone));

    fs::remove_file(&gone).unwrap();
    run_scan(settings(dir.path()), Vec::<String>::new());

    let saved = CacheStore::in_root(dir.path()).load();
    assert!(!saved.contains_key(&gone));
    assert_eq!(saved.len(), 1);
}
