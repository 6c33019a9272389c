//! Detection of the external audio tools.

use std::path::PathBuf;

/// Locations of the external programs a run may call.
///
/// Built once at startup; a `None` disables the features needing that tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toolchain {
    pub fpcalc: Option<PathBuf>,
    pub mp3val: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

impl Toolchain {
    /// Look every tool up on `PATH` and log what was found.
    #[must_use]
    pub fn detect() -> Self {
        let toolchain = Self {
            fpcalc: find("fpcalc"),
            mp3val: find("mp3val"),
            ffmpeg: find("ffmpeg"),
            ffprobe: find("ffprobe"),
        };
        toolchain.log_availability();
        toolchain
    }

    /// A toolchain with nothing available.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fpcalc(mut self, path: impl Into<PathBuf>) -> Self {
        self.fpcalc = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_mp3val(mut self, path: impl Into<PathBuf>) -> Self {
        self.mp3val = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_ffmpeg(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_ffprobe(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffprobe = Some(path.into());
        self
    }

    fn log_availability(&self) {
        for (name, path) in [
            ("fpcalc", &self.fpcalc),
            ("mp3val", &self.mp3val),
            ("ffmpeg", &self.ffmpeg),
            ("ffprobe", &self.ffprobe),
        ] {
            match path {
                Some(p) => log::info!("{} found at {}", name, p.display()),
                None => log::warn!("{} not found on PATH", name),
            }
        }
    }
}

fn find(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}
