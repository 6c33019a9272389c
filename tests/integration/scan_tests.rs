use std::sync::Arc;

use musicscan::app::{Collaborators, Scan};
use musicscan::cache::CACHE_FILENAME;
use musicscan::error::ExitCode;
use musicscan::quarantine::ScriptedDecisions;
use musicscan::report::RecordingReporter;
use musicscan::signal::ShutdownHandler;
use tempfile::tempdir;

use super::support::{
    collaborators, run_scan, settings, write_broken, write_file, write_track,
    BackupLosingRepairer, ContentAnalyzer, ContentProbe, FixingRepairer,
};

#[test]
fn test_library_without_audio() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("cover.jpg"), "jpeg");

    let (report, reporter) = run_scan(settings(dir.path()), Vec::<String>::new());

    assert_eq!(report.files_found, 0);
    assert_eq!(report.exit_code(), ExitCode::Success);
    assert!(reporter.contains("No audio files found"));
    assert!(!dir.path().join(CACHE_FILENAME).exists());
}

#[test]
fn test_no_duplicates_exit_code() {
    let dir = tempdir().unwrap();
    write_track(&dir.path().join("a.mp3"), "a", 100.0, 320);
    write_track(&dir.path().join("b.flac"), "b", 100.0, 320);

    let (report, reporter) = run_scan(settings(dir.path()), ["n"]);

    assert_eq!(report.files_found, 2);
    assert!(report.duplicate_sets.is_empty());
    assert_eq!(report.exit_code(), ExitCode::NoDuplicates);
    assert!(reporter.contains("No acoustically similar duplicate audio files found."));
    assert!(report.cache_saved);
}

#[test]
fn test_quarantined_files_are_not_rescanned() {
    let dir = tempdir().unwrap();
    write_track(&dir.path().join("song.mp3"), "same", 100.0, 320);
    write_track(&dir.path().join("Deletions/song.mp3"), "same", 100.0, 320);
    write_track(&dir.path().join("Deletions/low-bitrate/x.mp3"), "same", 100.0, 64);

    let (report, _) = run_scan(settings(dir.path()), ["n"]);

    assert_eq!(report.files_found, 1);
    assert!(report.duplicate_sets.is_empty());
}

#[test]
fn test_missing_fpcalc_skips_duplicate_detection() {
    let dir = tempdir().unwrap();
    write_track(&dir.path().join("a.mp3"), "same", 100.0, 320);
    write_track(&dir.path().join("b.mp3"), "same", 100.0, 320);

    let reporter = Arc::new(RecordingReporter::new());
    let collaborators = Collaborators::new(
        Box::new(ScriptedDecisions::new(["n"])),
        reporter.clone(),
    )
    .with_probe(Arc::new(ContentProbe));
    let report = Scan::new(settings(dir.path()), collaborators).run().unwrap();

    assert!(report.fingerprint.is_none());
    assert!(report.duplicate_sets.is_empty());
    assert_eq!(report.exit_code(), ExitCode::Success);
    assert!(reporter.contains("'fpcalc' utility not available"));
    assert!(!report.cache_saved);
}

#[test]
fn test_missing_prober_skips_low_bitrate_question() {
    let dir = tempdir().unwrap();
    write_track(&dir.path().join("a.mp3"), "a", 100.0, 64);

    let reporter = Arc::new(RecordingReporter::new());
    let collaborators = Collaborators::new(
        Box::new(ScriptedDecisions::new(Vec::<String>::new())),
        reporter.clone(),
    )
    .with_analyzer(ContentAnalyzer::new());
    let report = Scan::new(settings(dir.path()), collaborators).run().unwrap();

    assert_eq!(report.low_bitrate_found, 0);
    assert!(reporter.contains("'ffprobe' utility not available"));
}

#[test]
fn test_assume_low_bitrate_scan_skips_question() {
    let dir = tempdir().unwrap();
    let low = dir.path().join("low.mp3");
    write_track(&low, "low", 100.0, 64);

    let settings = settings(dir.path()).with_assume_low_bitrate_scan(true);
    let (report, _) = run_scan(settings, ["y"]);

    assert_eq!(report.low_bitrate.moved, 1);
    assert!(dir.path().join("Deletions/low-bitrate/low.mp3").exists());
}

#[test]
fn test_custom_bitrate_threshold() {
    let dir = tempdir().unwrap();
    write_track(&dir.path().join("a.mp3"), "a", 100.0, 192);

    let mut strict = settings(dir.path());
    strict.bitrate_threshold_kbps = 128;
    let (report, reporter) = run_scan(strict, ["y"]);

    assert_eq!(report.low_bitrate_found, 0);
    assert!(reporter.contains("No files identified with bitrates < 128kbps."));
}

#[test]
fn test_custom_quarantine_directory() {
    let dir = tempdir().unwrap();
    let elsewhere = tempdir().unwrap();
    write_track(&dir.path().join("a.mp3"), "same", 100.0, 320);
    write_track(&dir.path().join("b.mp3"), "same", 100.0, 320);

    let mut custom = settings(dir.path());
    custom.quarantine_dir = elsewhere.path().join("q");
    custom.low_bitrate_dir = elsewhere.path().join("q").join("low-bitrate");
    let (report, _) = run_scan(custom, ["y", "n"]);

    assert_eq!(report.duplicates.moved, 1);
    assert!(elsewhere.path().join("q/b.mp3").exists());
    assert!(!dir.path().join("Deletions").exists());
}

#[test]
fn test_repaired_file_joins_duplicate_group() {
    let dir = tempdir().unwrap();
    write_broken(&dir.path().join("broken.mp3"), "same", 100.0);
    write_track(&dir.path().join("good.flac"), "same", 100.0, 320);

    let mut with_repair = settings(dir.path());
    with_repair.repair.mp3 = true;
    let repairer = FixingRepairer::new();
    let reporter = Arc::new(RecordingReporter::new());
    let collaborators = collaborators(ContentAnalyzer::new(), reporter.clone(), ["n", "n"])
        .with_mp3_repairer(repairer.clone());
    let report = Scan::new(with_repair, collaborators).run().unwrap();

    assert_eq!(repairer.calls(), 1);
    let stats = report.fingerprint.as_ref().unwrap();
    assert_eq!(stats.repaired, 1);
    assert_eq!(report.duplicate_sets.len(), 1);
    assert!(reporter.contains("MP3 auto-repair enabled"));
}

#[test]
fn test_repair_requested_without_tool_warns() {
    let dir = tempdir().unwrap();
    write_broken(&dir.path().join("broken.mp3"), "x", 100.0);

    let mut with_repair = settings(dir.path());
    with_repair.repair.mp3 = true;
    with_repair.repair.ffmpeg = true;
    let (report, reporter) = run_scan(with_repair, ["n"]);

    assert!(reporter.contains("mp3val was not found"));
    assert!(reporter.contains("ffmpeg was not found"));
    assert_eq!(report.fingerprint.unwrap().failed, 1);
}

#[test]
fn test_failed_analysis_is_partial_success() {
    let dir = tempdir().unwrap();
    write_track(&dir.path().join("a.mp3"), "a", 100.0, 320);
    write_file(&dir.path().join("junk.mp3"), "junk");

    let (report, _) = run_scan(settings(dir.path()), ["n"]);

    assert_eq!(report.exit_code(), ExitCode::PartialSuccess);
}

#[test]
fn test_unrestorable_repair_is_partial_success() {
    let dir = tempdir().unwrap();
    write_track(&dir.path().join("a.mp3"), "a", 100.0, 320);
    write_broken(&dir.path().join("broken.mp3"), "b", 100.0);

    let mut with_repair = settings(dir.path());
    with_repair.repair.mp3 = true;
    let reporter = Arc::new(RecordingReporter::new());
    let collaborators = collaborators(ContentAnalyzer::new(), reporter.clone(), ["n"])
        .with_mp3_repairer(BackupLosingRepairer::new());
    let report = Scan::new(with_repair, collaborators).run().unwrap();

    let stats = report.fingerprint.as_ref().unwrap();
    assert_eq!(stats.restore_failures, 1);
    assert_eq!(stats.analyzed, 1);
    assert_eq!(report.exit_code(), ExitCode::PartialSuccess);
    assert!(reporter.contains("could not be restored from their repair backup"));
}

#[test]
fn test_interrupted_run() {
    let dir = tempdir().unwrap();
    write_track(&dir.path().join("a.mp3"), "a", 100.0, 320);

    let shutdown = ShutdownHandler::new();
    shutdown.request_shutdown();
    let reporter = Arc::new(RecordingReporter::new());
    let collaborators = collaborators(ContentAnalyzer::new(), reporter, Vec::<String>::new())
        .with_shutdown(shutdown);
    let report = Scan::new(settings(dir.path()), collaborators).run().unwrap();

    assert!(report.interrupted);
    assert_eq!(report.exit_code(), ExitCode::Interrupted);
    assert!(!dir.path().join(CACHE_FILENAME).exists());
}
