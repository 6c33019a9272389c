//! Decision policy for interactive quarantine.
//!
//! A [`DecisionSource`] supplies raw responses (a terminal, or a script in
//! tests); a [`PromptSession`] turns them into [`Resolution`]s and carries
//! the "all" and "quit" state for one flow.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// A user's answer to a quarantine prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// `y`: move this file.
    Move,
    /// `n`: leave this file.
    Skip,
    /// `a`: move this file and every remaining one without asking.
    MoveAllRemaining,
    /// `q`: stop prompting; remaining files are left alone.
    QuitRemaining,
}

/// Parse a single-character response, ignoring case and surrounding space.
///
/// Returns `None` for anything other than `y`, `n`, `a` or `q`.
#[must_use]
pub fn parse_response(input: &str) -> Option<Decision> {
    match input.trim().to_lowercase().as_str() {
        "y" => Some(Decision::Move),
        "n" => Some(Decision::Skip),
        "a" => Some(Decision::MoveAllRemaining),
        "q" => Some(Decision::QuitRemaining),
        _ => None,
    }
}

/// A question put to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// Should this duplicate of `canonical` be quarantined?
    Duplicate {
        canonical: PathBuf,
        candidate: PathBuf,
        /// 1-based position within the set.
        index: usize,
        total: usize,
    },
    /// Should this low-bitrate file be quarantined?
    LowBitrate {
        candidate: PathBuf,
        index: usize,
        total: usize,
        quarantine_dir: PathBuf,
    },
    /// Should the library be scanned for low-bitrate files at all?
    ConfirmLowBitrateScan { threshold_kbps: u32 },
}

impl Prompt {
    /// Text shown before reading a response.
    #[must_use]
    pub fn question(&self) -> String {
        match self {
            Self::Duplicate { .. } => "Move this duplicate file to quarantine? \
                 (y/n/a/q - yes/no/yes to ALL subsequent/quit ALL subsequent): "
                .to_string(),
            Self::LowBitrate { quarantine_dir, .. } => {
                let name = quarantine_dir
                    .file_name()
                    .map_or_else(|| quarantine_dir.display().to_string(), |n| {
                        n.to_string_lossy().into_owned()
                    });
                format!("Move to '{name}' quarantine? (y/n/a/q): ")
            }
            Self::ConfirmLowBitrateScan { threshold_kbps } => {
                format!("Scan for files with bitrates < {threshold_kbps}kbps (to quarantine)? (y/n): ")
            }
        }
    }

    /// The file this prompt is about, if any.
    #[must_use]
    pub fn candidate(&self) -> Option<&Path> {
        match self {
            Self::Duplicate { candidate, .. } | Self::LowBitrate { candidate, .. } => {
                Some(candidate)
            }
            Self::ConfirmLowBitrateScan { .. } => None,
        }
    }
}

/// Source of raw user responses.
pub trait DecisionSource {
    /// Read a response to `prompt`. `Ok(None)` means input is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the underlying input.
    fn read_response(&mut self, prompt: &Prompt) -> io::Result<Option<String>>;
}

/// Reads responses line by line, writing each question first.
pub struct StdinDecisions<R, W> {
    reader: R,
    writer: W,
}

impl StdinDecisions<io::StdinLock<'static>, io::Stdout> {
    /// Read from the process's stdin and write questions to stdout.
    #[must_use]
    pub fn terminal() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> StdinDecisions<R, W> {
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R: BufRead, W: Write> DecisionSource for StdinDecisions<R, W> {
    fn read_response(&mut self, prompt: &Prompt) -> io::Result<Option<String>> {
        write!(self.writer, "\t{}", prompt.question())?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

/// Pre-recorded responses. Answers `q` once the script runs out.
#[derive(Debug, Default, Clone)]
pub struct ScriptedDecisions {
    responses: VecDeque<String>,
    asked: Vec<Prompt>,
}

impl ScriptedDecisions {
    #[must_use]
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// Every prompt that was asked, in order.
    #[must_use]
    pub fn asked(&self) -> &[Prompt] {
        &self.asked
    }

    /// Responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

impl DecisionSource for ScriptedDecisions {
    fn read_response(&mut self, prompt: &Prompt) -> io::Result<Option<String>> {
        self.asked.push(prompt.clone());
        Ok(Some(
            self.responses
                .pop_front()
                .unwrap_or_else(|| "q".to_string()),
        ))
    }
}

/// What to do with the file a prompt was about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Move it. `auto` is set when no question was asked ("all" mode).
    Move { auto: bool },
    /// Leave it; the user said no.
    Skip,
    /// Leave it; the response was not understood.
    Invalid(String),
    /// Leave it and everything after it.
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionMode {
    Asking,
    MoveAll,
    Quit,
}

/// "All"/"quit" state for one quarantine flow.
#[derive(Debug)]
pub struct PromptSession {
    mode: SessionMode,
}

impl Default for PromptSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: SessionMode::Asking,
        }
    }

    #[must_use]
    pub fn is_quit(&self) -> bool {
        self.mode == SessionMode::Quit
    }

    #[must_use]
    pub fn is_move_all(&self) -> bool {
        self.mode == SessionMode::MoveAll
    }

    /// Resolve `prompt`, asking `source` only while in asking mode.
    ///
    /// End of input and read errors are treated as `q`.
    pub fn resolve(&mut self, source: &mut dyn DecisionSource, prompt: &Prompt) -> Resolution {
        match self.mode {
            SessionMode::Quit => return Resolution::Halt,
            SessionMode::MoveAll => return Resolution::Move { auto: true },
            SessionMode::Asking => {}
        }

        let response = match source.read_response(prompt) {
            Ok(Some(r)) => r,
            Ok(None) => {
                log::info!("End of input, treating as quit");
                self.mode = SessionMode::Quit;
                return Resolution::Halt;
            }
            Err(e) => {
                log::error!("Could not read response: {}", e);
                self.mode = SessionMode::Quit;
                return Resolution::Halt;
            }
        };

        match parse_response(&response) {
            Some(Decision::Move) => Resolution::Move { auto: false },
            Some(Decision::MoveAllRemaining) => {
                self.mode = SessionMode::MoveAll;
                Resolution::Move { auto: false }
            }
            Some(Decision::Skip) => Resolution::Skip,
            Some(Decision::QuitRemaining) => {
                self.mode = SessionMode::Quit;
                Resolution::Halt
            }
            None => Resolution::Invalid(response),
        }
    }
}

/// Ask a plain yes/no question. Only `y` counts as yes.
pub fn confirm(source: &mut dyn DecisionSource, prompt: &Prompt) -> bool {
    match source.read_response(prompt) {
        Ok(Some(r)) => r.trim().eq_ignore_ascii_case("y"),
        Ok(None) => false,
        Err(e) => {
            log::error!("Could not read response: {}", e);
            false
        }
    }
}
