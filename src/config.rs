//! Layered configuration.
//!
//! Values are merged in increasing priority:
//!
//! 1. [`Config::default()`]
//! 2. `musicscan.toml` in the platform configuration directory
//! 3. an explicit `--config FILE`
//! 4. `MUSICSCAN_*` environment variables (`__` separates nested keys,
//!    e.g. `MUSICSCAN_REPAIR__MP3=true`)
//! 5. command-line flags, applied by [`Config::with_cli_overrides`]
//!
//! The merged [`Config`] is then combined with the detected [`Toolchain`]
//! into [`RunSettings`], the immutable view every phase of a run reads.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bitrate::DEFAULT_THRESHOLD_KBPS;
use crate::cli::Cli;
use crate::duplicates::{default_worker_count, UnsortedMarker};
use crate::scanner::DEFAULT_AUDIO_EXTENSIONS;
use crate::tools::Toolchain;

/// File name looked up in the platform configuration directory.
pub const CONFIG_FILENAME: &str = "musicscan.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "MUSICSCAN_";

/// Name of the quarantine directory created under the scan root.
pub const DEFAULT_QUARANTINE_DIRNAME: &str = "Deletions";

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file passed with `--config` does not exist.
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    /// A source could not be parsed or had the wrong types.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Invalid(Box::new(err))
    }
}

/// Which repair stages may run after a failed analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Try `mp3val` on MP3 files.
    pub mp3: bool,
    /// Try an `ffmpeg` re-encode.
    pub ffmpeg: bool,
}

/// User configuration as merged from every source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker threads for fingerprinting and probing. `None` uses half the cores.
    pub max_workers: Option<usize>,
    pub bitrate_threshold_kbps: u32,
    /// Seconds of audio handed to `fpcalc`; 0 analyzes the whole file.
    pub fingerprint_max_length_secs: u32,
    /// Path segments marking the "not yet sorted" area of the library.
    pub unsorted_marker: Vec<String>,
    pub audio_extensions: Vec<String>,
    /// Quarantine directory. `None` uses `<root>/Deletions`.
    pub quarantine_dir: Option<PathBuf>,
    pub low_bitrate_subdir: String,
    pub dry_run: bool,
    pub force_refingerprint: bool,
    pub skip_duplicates: bool,
    pub skip_low_bitrate: bool,
    pub repair: RepairConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: None,
            bitrate_threshold_kbps: DEFAULT_THRESHOLD_KBPS,
            fingerprint_max_length_secs: 0,
            unsorted_marker: vec!["Music".to_string(), "Unsorted".to_string()],
            audio_extensions: DEFAULT_AUDIO_EXTENSIONS
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
            quarantine_dir: None,
            low_bitrate_subdir: "low-bitrate".to_string(),
            dry_run: false,
            force_refingerprint: false,
            skip_duplicates: false,
            skip_low_bitrate: false,
            repair: RepairConfig::default(),
        }
    }
}

impl Config {
    /// Path of the per-user configuration file, if the platform has one.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "musicscan", "musicscan")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
    }

    /// Build the provider stack without extracting it.
    ///
    /// Missing files are skipped silently by figment, so callers check an
    /// explicit path themselves (see [`Config::load`]).
    #[must_use]
    pub fn figment(user_file: Option<&Path>, explicit_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = user_file {
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = explicit_file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the configuration from defaults, files and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `explicit_file` does not exist and
    /// [`ConfigError::Invalid`] if any source fails to parse.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit_file {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
        }

        let user_file = Self::user_config_path();
        if let Some(ref path) = user_file {
            log::debug!("Looking for user configuration at {}", path.display());
        }

        let config: Config = Self::figment(user_file.as_deref(), explicit_file).extract()?;
        Ok(config)
    }

    /// Apply command-line flags on top of the loaded values.
    ///
    /// Boolean flags only ever switch a behavior on.
    #[must_use]
    pub fn with_cli_overrides(mut self, cli: &Cli) -> Self {
        if let Some(workers) = cli.max_workers {
            self.max_workers = Some(workers);
        }
        if let Some(kbps) = cli.bitrate {
            self.bitrate_threshold_kbps = kbps;
        }
        if let Some(ref dir) = cli.quarantine_path {
            self.quarantine_dir = Some(dir.clone());
        }
        self.dry_run |= cli.dry_run;
        self.force_refingerprint |= cli.force_re_fingerprint;
        self.skip_duplicates |= cli.skip_duplicates;
        self.skip_low_bitrate |= cli.skip_low_bitrate;
        self.repair.mp3 |= cli.auto_repair_mp3;
        self.repair.ffmpeg |= cli.auto_repair_ffmpeg;
        self
    }
}

/// Effective, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Absolute scan root.
    pub root: PathBuf,
    pub quarantine_dir: PathBuf,
    pub low_bitrate_dir: PathBuf,
    pub workers: usize,
    pub bitrate_threshold_kbps: u32,
    pub fingerprint_max_length_secs: u32,
    pub unsorted_marker: UnsortedMarker,
    pub audio_extensions: Vec<String>,
    pub dry_run: bool,
    pub force_refingerprint: bool,
    pub skip_duplicates: bool,
    pub skip_low_bitrate: bool,
    /// Skip the "scan for low bitrate?" question and answer yes.
    pub assume_low_bitrate_scan: bool,
    pub repair: RepairConfig,
    pub toolchain: Toolchain,
}

impl RunSettings {
    /// Resolve `config` against an absolute `root` and the detected tools.
    ///
    /// Out-of-range values fall back to their defaults with a warning.
    #[must_use]
    pub fn resolve(config: Config, root: PathBuf, toolchain: Toolchain) -> Self {
        let workers = match config.max_workers {
            Some(0) => {
                log::warn!("max_workers must be at least 1, using the default");
                default_worker_count()
            }
            Some(n) => n,
            None => default_worker_count(),
        };

        let bitrate_threshold_kbps = if config.bitrate_threshold_kbps == 0 {
            log::warn!(
                "bitrate threshold must be positive, using the default of {} kbps",
                DEFAULT_THRESHOLD_KBPS
            );
            DEFAULT_THRESHOLD_KBPS
        } else {
            config.bitrate_threshold_kbps
        };

        let quarantine_dir = match config.quarantine_dir {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => root.join(dir),
            None => root.join(DEFAULT_QUARANTINE_DIRNAME),
        };
        let low_bitrate_dir = quarantine_dir.join(&config.low_bitrate_subdir);

        let unsorted_marker = if config.unsorted_marker.is_empty() {
            UnsortedMarker::default()
        } else {
            UnsortedMarker::new(config.unsorted_marker)
        };

        Self {
            root,
            quarantine_dir,
            low_bitrate_dir,
            workers,
            bitrate_threshold_kbps,
            fingerprint_max_length_secs: config.fingerprint_max_length_secs,
            unsorted_marker,
            audio_extensions: config.audio_extensions,
            dry_run: config.dry_run,
            force_refingerprint: config.force_refingerprint,
            skip_duplicates: config.skip_duplicates,
            skip_low_bitrate: config.skip_low_bitrate,
            assume_low_bitrate_scan: false,
            repair: config.repair,
            toolchain,
        }
    }

    #[must_use]
    pub fn with_assume_low_bitrate_scan(mut self, assume: bool) -> Self {
        self.assume_low_bitrate_scan = assume;
        self
    }
}
