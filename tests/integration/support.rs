//! Fake audio tools and library builders shared by the integration tests.
//!
//! Track files are plain text. The first line is `GOOD:<id>:<secs>` for a
//! decodable track or `BAD:<id>:<secs>` for one needing repair; an optional
//! second line `bitrate=<bps>` is what the fake prober reports.
#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use musicscan::analysis::{Analysis, AnalysisError, Analyzer, Fingerprint};
use musicscan::app::{Collaborators, Scan, ScanReport};
use musicscan::bitrate::{BitrateProbe, ProbeError};
use musicscan::config::{Config, RunSettings};
use musicscan::quarantine::ScriptedDecisions;
use musicscan::repair::{BackupGuard, Mp3RepairReport, Mp3Repairer, RepairError, Transcoder};
use musicscan::report::RecordingReporter;
use musicscan::tools::Toolchain;

/// Write a decodable track.
pub fn write_track(path: &Path, id: &str, secs: f64, bitrate_kbps: u64) {
    write_file(
        path,
        &format!("GOOD:{id}:{secs}\nbitrate={}\n", bitrate_kbps * 1000),
    );
}

/// Write a track the analyzer rejects until it is repaired.
pub fn write_broken(path: &Path, id: &str, secs: f64) {
    write_file(path, &format!("BAD:{id}:{secs}\nbitrate=320000\n"));
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn first_line(path: &Path) -> io::Result<String> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().next().unwrap_or_default().to_string())
}

/// Analyzer reading the fingerprint id and duration from the file.
#[derive(Debug, Default)]
pub struct ContentAnalyzer {
    calls: AtomicUsize,
}

impl ContentAnalyzer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Analyzer for ContentAnalyzer {
    fn analyze(&self, path: &Path) -> Result<Analysis, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let line = first_line(path).map_err(|e| AnalysisError::Other {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let parts: Vec<&str> = line.split(':').collect();
        match parts.as_slice() {
            ["GOOD", id, secs] => {
                let secs: f64 = secs.parse().map_err(|_| AnalysisError::Other {
                    path: path.to_path_buf(),
                    message: "bad duration".to_string(),
                })?;
                Ok(Analysis::new(secs, Fingerprint::new(id.as_bytes().to_vec())))
            }
            ["BAD", ..] => Err(AnalysisError::classify(
                path,
                "fpcalc exited with status 3: ERROR: error decoding audio frame",
            )),
            _ => Err(AnalysisError::classify(path, "could not open input")),
        }
    }
}

fn fixed_content(path: &Path) -> Result<String, RepairError> {
    let content = fs::read_to_string(path).map_err(|source| RepairError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content.replacen("BAD:", "GOOD:", 1))
}

/// In-place repairer turning `BAD` tracks into `GOOD` ones.
#[derive(Debug, Default)]
pub struct FixingRepairer {
    calls: AtomicUsize,
}

impl FixingRepairer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Mp3Repairer for FixingRepairer {
    fn repair(&self, path: &Path) -> Result<Mp3RepairReport, RepairError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = fixed_content(path)?;
        fs::write(path, content).map_err(|source| RepairError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Mp3RepairReport { fixed: true })
    }
}

/// In-place repairer that scribbles over the file and then reports failure.
#[derive(Debug, Default)]
pub struct CorruptingRepairer;

impl Mp3Repairer for CorruptingRepairer {
    fn repair(&self, path: &Path) -> Result<Mp3RepairReport, RepairError> {
        fs::write(path, "garbage").map_err(|source| RepairError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Err(RepairError::ToolFailed {
            tool: "mp3val",
            path: path.to_path_buf(),
            code: Some(1),
            stderr: "could not fix".to_string(),
        })
    }
}

/// In-place repairer that rewrites the file and loses its safety backup,
/// so the original can no longer be restored.
#[derive(Debug, Default)]
pub struct BackupLosingRepairer {
    calls: AtomicUsize,
}

impl BackupLosingRepairer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Mp3Repairer for BackupLosingRepairer {
    fn repair(&self, path: &Path) -> Result<Mp3RepairReport, RepairError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let io_err = |source| RepairError::Io {
            path: path.to_path_buf(),
            source,
        };
        fs::write(path, "garbage").map_err(io_err)?;
        fs::remove_file(BackupGuard::backup_path(path, "mp3val")).map_err(io_err)?;
        Ok(Mp3RepairReport { fixed: true })
    }
}

/// Transcoder writing a repaired copy to the output path.
#[derive(Debug, Default)]
pub struct FixingTranscoder {
    calls: AtomicUsize,
}

impl FixingTranscoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcoder for FixingTranscoder {
    fn transcode(&self, source: &Path, output: &Path) -> Result<(), RepairError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = fixed_content(source)?;
        fs::write(output, content).map_err(|source| RepairError::Io {
            path: output.to_path_buf(),
            source,
        })
    }
}

/// Prober reading the `bitrate=` line.
#[derive(Debug, Default)]
pub struct ContentProbe;

impl BitrateProbe for ContentProbe {
    fn bitrate(&self, path: &Path) -> Result<Option<u64>, ProbeError> {
        let content = fs::read_to_string(path).map_err(ProbeError::Spawn)?;
        Ok(content
            .lines()
            .find_map(|l| l.strip_prefix("bitrate="))
            .and_then(|v| v.trim().parse().ok()))
    }
}

/// Settings for a library at `root` with two workers and no real tools.
pub fn settings(root: &Path) -> RunSettings {
    let config = Config {
        max_workers: Some(2),
        ..Config::default()
    };
    RunSettings::resolve(config, root.to_path_buf(), Toolchain::none())
}

/// Collaborators with the fake analyzer and prober, answering from `responses`.
pub fn collaborators<I, S>(
    analyzer: Arc<ContentAnalyzer>,
    reporter: Arc<RecordingReporter>,
    responses: I,
) -> Collaborators
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Collaborators::new(Box::new(ScriptedDecisions::new(responses)), reporter)
        .with_analyzer(analyzer)
        .with_probe(Arc::new(ContentProbe))
}

/// Run a scan with default fakes and the given answers.
pub fn run_scan<I, S>(settings: RunSettings, responses: I) -> (ScanReport, Arc<RecordingReporter>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let reporter = Arc::new(RecordingReporter::new());
    let collaborators = collaborators(ContentAnalyzer::new(), Arc::clone(&reporter), responses);
    let report = Scan::new(settings, collaborators).run().unwrap();
    (report, reporter)
}

/// Paths under `dir`, relative and sorted.
pub fn relative_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(dir).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}
