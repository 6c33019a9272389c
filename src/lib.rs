//! musicscan - acoustic duplicate finder for music libraries
//!
//! Fingerprints every audio file under a library root with Chromaprint,
//! groups acoustically identical recordings, keeps one canonical copy of
//! each and lets the user quarantine the rest. Files below a bitrate
//! threshold can be reviewed the same way. Fingerprints are cached next to
//! the library so unchanged files are never analyzed twice.

pub mod analysis;
pub mod app;
pub mod bitrate;
pub mod cache;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod progress;
pub mod quarantine;
pub mod repair;
pub mod report;
pub mod scanner;
pub mod signal;
pub mod tools;

use anyhow::Context;

use crate::app::{Collaborators, Scan};
use crate::cli::Cli;
use crate::config::{Config, RunSettings};
use crate::error::ExitCode;
use crate::tools::Toolchain;

/// Run the application for parsed command-line arguments.
///
/// # Errors
///
/// Returns an error for fatal startup problems: an unopenable log file,
/// unreadable configuration or an invalid library directory.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    if cli.no_color {
        yansi::disable();
    }

    logging::init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()).with_context(|| {
        format!(
            "could not open log file {}",
            cli.log_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })?;

    let shutdown = match signal::install_handler() {
        Ok(handler) => handler,
        Err(e) => {
            log::warn!("Ctrl+C handling unavailable: {}", e);
            signal::ShutdownHandler::new()
        }
    };

    let config = Config::load(cli.config.as_deref())
        .context("failed to load configuration")?
        .with_cli_overrides(&cli);

    let directory = cli.directory_or_prompt()?;
    let root = scanner::validate_root(&directory)
        .with_context(|| format!("cannot scan {}", directory.display()))?;
    log::info!("Starting scan in directory: {}", root.display());

    let settings = RunSettings::resolve(config, root, Toolchain::detect())
        .with_assume_low_bitrate_scan(cli.yes_low_bitrate);
    log::debug!("Effective settings: {:?}", settings);

    let collaborators = Collaborators::from_settings(&settings, cli.quiet).with_shutdown(shutdown);
    let report = Scan::new(settings, collaborators).run()?;
    Ok(report.exit_code())
}
