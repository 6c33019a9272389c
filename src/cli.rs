//! Command-line interface definitions for musicscan.
//!
//! Every option mirrors a configuration field (see [`crate::config`]); flags
//! given here take priority over configuration files and the environment.
//!
//! # Example
//!
//! ```bash
//! # Review duplicates and low-bitrate files under ~/Music
//! musicscan ~/Music
//!
//! # Show what would be moved without touching anything
//! musicscan --dry-run ~/Music
//!
//! # Only look for files below 192 kbps, trying repairs on broken files
//! musicscan --skip-duplicates --bitrate 192 --auto-repair-mp3 ~/Music
//! ```

use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;

/// Find acoustically identical tracks and low-bitrate files in a music library.
///
/// Files are fingerprinted with Chromaprint (`fpcalc`); identical recordings
/// are grouped, one canonical copy is kept, and the rest can be moved into a
/// quarantine directory after confirmation.
#[derive(Debug, Parser)]
#[command(name = "musicscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Music library to scan (read from stdin when omitted)
    #[arg(value_name = "DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Show what would be moved without moving anything
    #[arg(long)]
    pub dry_run: bool,

    /// Quarantine directory (default: <DIRECTORY>/Deletions)
    #[arg(long, value_name = "PATH")]
    pub quarantine_path: Option<PathBuf>,

    /// Skip duplicate detection
    #[arg(long)]
    pub skip_duplicates: bool,

    /// Skip the low-bitrate scan
    #[arg(long)]
    pub skip_low_bitrate: bool,

    /// Bitrate threshold in kbps below which files are flagged (default: 256)
    #[arg(long, value_name = "KBPS")]
    pub bitrate: Option<u32>,

    /// Ignore the fingerprint cache and analyze every file again
    #[arg(long)]
    pub force_re_fingerprint: bool,

    /// Worker threads for analysis (default: half the CPU cores)
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Try mp3val on MP3 files that fail to fingerprint
    #[arg(long)]
    pub auto_repair_mp3: bool,

    /// Try an ffmpeg re-encode on files that fail to fingerprint
    #[arg(long)]
    pub auto_repair_ffmpeg: bool,

    /// Answer yes to the "scan for low bitrate?" question
    #[arg(long)]
    pub yes_low_bitrate: bool,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write log records to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}

impl Cli {
    /// The directory to scan, prompting on stdin if none was given.
    ///
    /// # Errors
    ///
    /// Returns an error if stdin cannot be read or the answer is empty.
    pub fn directory_or_prompt(&self) -> anyhow::Result<PathBuf> {
        if let Some(ref dir) = self.directory {
            return Ok(dir.clone());
        }
        let stdin = std::io::stdin();
        read_directory(&mut stdin.lock(), &mut std::io::stdout())
    }
}

/// Ask for the library directory and read one line of answer.
///
/// Surrounding whitespace and quotes (as left by drag-and-drop) are removed.
///
/// # Errors
///
/// Returns an error if reading fails or the answer is empty.
pub fn read_directory<R: BufRead, W: std::io::Write>(
    reader: &mut R,
    writer: &mut W,
) -> anyhow::Result<PathBuf> {
    write!(writer, "Enter the path to your music library: ")?;
    writer.flush()?;

    let mut line = String::new();
    reader.read_line(&mut line)?;
    let trimmed = line.trim().trim_matches(|c| c == '"' || c == '\'');
    if trimmed.is_empty() {
        anyhow::bail!("no music directory given");
    }
    Ok(PathBuf::from(trimmed))
}
