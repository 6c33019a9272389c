use std::fs;
use std::sync::Arc;

use musicscan::repair::{BackupGuard, RepairPipeline, RepairStage};
use musicscan::report::RecordingReporter;
use tempfile::tempdir;

use super::support::{
    write_broken, write_track, BackupLosingRepairer, ContentAnalyzer, CorruptingRepairer,
    FixingRepairer, FixingTranscoder,
};

#[test]
fn test_good_file_needs_no_repair() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.mp3");
    write_track(&path, "abc", 200.0, 320);

    let repairer = FixingRepairer::new();
    let pipeline = RepairPipeline::new(ContentAnalyzer::new()).with_mp3_repairer(repairer.clone());
    let outcome = pipeline.run(&path);

    assert!(outcome.succeeded());
    assert_eq!(outcome.final_stage, RepairStage::Succeeded);
    assert_eq!(outcome.repaired_by, None);
    assert_eq!(repairer.calls(), 0);
}

#[test]
fn test_mp3_repair_fixes_file_and_removes_backup() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.mp3");
    write_broken(&path, "abc", 200.0);

    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = RepairPipeline::new(ContentAnalyzer::new())
        .with_mp3_repairer(FixingRepairer::new())
        .with_reporter(reporter.clone());
    let outcome = pipeline.run(&path);

    assert!(outcome.succeeded());
    assert_eq!(outcome.repaired_by, Some(RepairStage::Mp3Repair));
    assert!(fs::read_to_string(&path).unwrap().starts_with("GOOD:abc"));
    assert!(!BackupGuard::backup_path(&path, "mp3val").exists());
    assert!(reporter.contains("attempting repair with mp3val"));
}

#[test]
fn test_mp3_repair_skipped_for_other_formats() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.flac");
    write_broken(&path, "abc", 200.0);

    let repairer = FixingRepairer::new();
    let pipeline = RepairPipeline::new(ContentAnalyzer::new()).with_mp3_repairer(repairer.clone());
    let outcome = pipeline.run(&path);

    assert!(!outcome.succeeded());
    assert_eq!(outcome.final_stage, RepairStage::Failed);
    assert_eq!(repairer.calls(), 0);
    assert!(fs::read_to_string(&path).unwrap().starts_with("BAD:"));
}

#[test]
fn test_failed_mp3_repair_restores_original_then_ffmpeg_runs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.mp3");
    write_broken(&path, "abc", 200.0);

    let transcoder = FixingTranscoder::new();
    let pipeline = RepairPipeline::new(ContentAnalyzer::new())
        .with_mp3_repairer(Arc::new(CorruptingRepairer))
        .with_transcoder(transcoder.clone());
    let outcome = pipeline.run(&path);

    assert!(outcome.succeeded());
    assert_eq!(outcome.repaired_by, Some(RepairStage::FfmpegRepair));
    assert_eq!(transcoder.calls(), 1);
    assert!(fs::read_to_string(&path).unwrap().starts_with("GOOD:abc"));

    let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(leftovers.len(), 1, "backups and temp output must be gone");
}

#[test]
fn test_failed_repair_leaves_original_bytes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.mp3");
    write_broken(&path, "abc", 200.0);
    let before = fs::read(&path).unwrap();

    let pipeline =
        RepairPipeline::new(ContentAnalyzer::new()).with_mp3_repairer(Arc::new(CorruptingRepairer));
    let outcome = pipeline.run(&path);

    assert!(!outcome.succeeded());
    assert!(!outcome.restore_failed);
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(outcome.error.is_some());
}

#[test]
fn test_unrecoverable_failure_is_not_repaired() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.mp3");
    fs::write(&path, "not audio at all").unwrap();

    let repairer = FixingRepairer::new();
    let transcoder = FixingTranscoder::new();
    let pipeline = RepairPipeline::new(ContentAnalyzer::new())
        .with_mp3_repairer(repairer.clone())
        .with_transcoder(transcoder.clone());
    let outcome = pipeline.run(&path);

    assert!(!outcome.succeeded());
    assert_eq!(repairer.calls(), 0);
    assert_eq!(transcoder.calls(), 0);
}

#[test]
fn test_lost_backup_stops_the_ladder() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.mp3");
    write_broken(&path, "abc", 200.0);

    let repairer = BackupLosingRepairer::new();
    let transcoder = FixingTranscoder::new();
    let reporter = Arc::new(RecordingReporter::new());
    let pipeline = RepairPipeline::new(ContentAnalyzer::new())
        .with_mp3_repairer(repairer.clone())
        .with_transcoder(transcoder.clone())
        .with_reporter(reporter.clone());
    let outcome = pipeline.run(&path);

    assert_eq!(outcome.final_stage, RepairStage::Failed);
    assert!(outcome.restore_failed);
    assert!(outcome.analysis.is_none());
    assert_eq!(outcome.repaired_by, None);
    assert_eq!(repairer.calls(), 1);
    assert_eq!(transcoder.calls(), 0, "no further stage runs on an unrestored file");
    assert!(reporter.contains("CRITICAL"));
}
