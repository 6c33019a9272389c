use std::fs;
use std::sync::Arc;

use musicscan::app::Scan;
use musicscan::cache::CacheStore;
use musicscan::error::ExitCode;
use musicscan::report::RecordingReporter;
use tempfile::tempdir;

use super::support::{collaborators, run_scan, settings, write_track, ContentAnalyzer};

#[test]
fn test_duplicate_in_unsorted_is_quarantined() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let keep = root.join("Artist/Album/song.mp3");
    let dupe = root.join("Music/Unsorted/song.mp3");
    write_track(&keep, "same", 200.0, 320);
    write_track(&dupe, "same", 200.0, 320);
    write_track(&root.join("other.mp3"), "other", 200.0, 320);

    // "y" moves the duplicate, "n" declines the low-bitrate scan.
    let (report, reporter) = run_scan(settings(root), ["y", "n"]);

    assert_eq!(report.duplicate_sets.len(), 1);
    assert_eq!(report.duplicate_sets[0].canonical, keep);
    assert_eq!(report.duplicates.moved, 1);
    assert_eq!(report.exit_code(), ExitCode::Success);
    assert!(keep.exists());
    assert!(!dupe.exists());
    assert!(root.join("Deletions/song.mp3").exists());
    assert!(reporter.contains("Duplicates: Moved 1 file(s) to quarantine."));
    assert!(reporter.contains("Scan for low bitrate files skipped by user."));

    let saved = CacheStore::in_root(root).load();
    assert!(saved.contains_key(&keep));
    assert!(!saved.contains_key(&dupe));
}

#[test]
fn test_quarantine_never_overwrites() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_track(&root.join("Deletions/song.mp3"), "old", 50.0, 320);
    write_track(&root.join("a/song.mp3"), "same", 200.0, 320);
    write_track(&root.join("b/song.mp3"), "same", 200.0, 320);

    let (report, _) = run_scan(settings(root), ["y", "n"]);

    assert_eq!(report.duplicates.moved, 1);
    assert!(root.join("a/song.mp3").exists());
    assert!(!root.join("b/song.mp3").exists());
    assert!(fs::read_to_string(root.join("Deletions/song.mp3"))
        .unwrap()
        .starts_with("GOOD:old"));
    assert!(root.join("Deletions/song (1).mp3").exists());
}

#[test]
fn test_dry_run_moves_nothing() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_track(&root.join("a.mp3"), "same", 200.0, 320);
    write_track(&root.join("b.mp3"), "same", 200.0, 320);

    let mut dry = settings(root);
    dry.dry_run = true;
    let (report, reporter) = run_scan(dry, ["y", "n"]);

    assert_eq!(report.duplicates.moved, 1);
    assert!(root.join("b.mp3").exists());
    assert!(!root.join("Deletions").exists());
    assert!(reporter.contains("DRY RUN: Would move"));
    assert!(reporter.contains("Simulated moving 1 file(s)"));
}

#[test]
fn test_low_bitrate_ignore_is_remembered() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let low = root.join("low.mp3");
    write_track(&low, "low", 200.0, 128);
    write_track(&root.join("high.mp3"), "high", 200.0, 320);

    // Confirm the scan, then keep the file.
    let (first, _) = run_scan(settings(root), ["y", "n"]);
    assert_eq!(first.low_bitrate_found, 1);
    assert_eq!(first.low_bitrate.skipped, 1);
    assert_eq!(
        CacheStore::in_root(root).load()[&low].low_bitrate_ignored,
        Some(true)
    );

    let (second, reporter) = run_scan(settings(root), ["y"]);
    assert_eq!(second.low_bitrate_found, 1);
    assert_eq!(second.low_bitrate.prompted, 0);
    assert!(low.exists());
    assert!(reporter.contains("previously 'ignored' and unchanged"));
}

#[test]
fn test_changed_file_is_asked_about_again() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let low = root.join("low.mp3");
    write_track(&low, "low", 200.0, 128);
    run_scan(settings(root), ["y", "n"]);

    write_track(&low, "low-reencoded", 200.0, 128);
    let (report, _) = run_scan(settings(root), ["y", "y"]);

    assert_eq!(report.low_bitrate.moved, 1);
    assert!(!low.exists());
    assert!(root.join("Deletions/low-bitrate/low.mp3").exists());
}

#[test]
fn test_move_all_does_not_carry_into_low_bitrate_flow() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_track(&root.join("a.mp3"), "same", 200.0, 320);
    write_track(&root.join("b.mp3"), "same", 200.0, 320);
    write_track(&root.join("low1.mp3"), "l1", 200.0, 96);
    write_track(&root.join("low2.mp3"), "l2", 200.0, 96);

    let (report, _) = run_scan(settings(root), ["a", "y", "n", "n"]);

    assert_eq!(report.duplicates.moved, 1);
    assert_eq!(report.low_bitrate.prompted, 2);
    assert_eq!(report.low_bitrate.skipped, 2);
    assert_eq!(report.low_bitrate.moved, 0);
    assert!(root.join("low1.mp3").exists());
    assert!(root.join("low2.mp3").exists());
}

#[test]
fn test_invalid_low_bitrate_answer_changes_nothing() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    let low = root.join("low.mp3");
    write_track(&low, "low", 200.0, 128);

    let reporter = Arc::new(RecordingReporter::new());
    let report = Scan::new(
        settings(root),
        collaborators(ContentAnalyzer::new(), reporter.clone(), ["y", "maybe"]),
    )
    .run()
    .unwrap();

    assert_eq!(report.low_bitrate.invalid, 1);
    assert!(low.exists());
    assert!(reporter.contains("Invalid input 'maybe'"));
    assert_eq!(
        CacheStore::in_root(root).load()[&low].low_bitrate_ignored,
        Some(false)
    );
}

#[test]
fn test_quit_stops_low_bitrate_flow() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_track(&root.join("low1.mp3"), "l1", 200.0, 96);
    write_track(&root.join("low2.mp3"), "l2", 200.0, 96);

    let (report, reporter) = run_scan(settings(root), ["y", "q"]);

    assert!(report.low_bitrate.quit);
    assert_eq!(report.low_bitrate.moved, 0);
    assert!(reporter.contains("Quitting low bitrate quarantine."));
}
