//! Re-encode/remux via `ffmpeg`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{is_mp3, RepairError, Transcoder};

const TOOL: &str = "ffmpeg";

/// [`Transcoder`] backed by the `ffmpeg` executable.
///
/// MP3 sources are re-encoded with LAME at VBR quality 2; everything else is
/// remuxed with the audio stream copied unchanged.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: PathBuf,
}

impl Ffmpeg {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments for converting `source` into `output`.
    #[must_use]
    pub fn arguments(source: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), source.into()];
        if is_mp3(source) {
            args.extend(["-codec:a", "libmp3lame", "-qscale:a", "2"].map(OsString::from));
        } else {
            args.extend(["-codec:a", "copy"].map(OsString::from));
        }
        args.extend(["-loglevel", "error"].map(OsString::from));
        args.push(output.into());
        args
    }

    /// Temporary output path for a repair of `original`, in the same directory.
    ///
    /// `song.flac` becomes `song.flac.ffmpeg_temp_out.flac`, keeping the extension
    /// so ffmpeg picks the right container.
    #[must_use]
    pub fn temp_output_path(original: &Path) -> PathBuf {
        let mut name = original
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".ffmpeg_temp_out");
        if let Some(ext) = original.extension() {
            name.push(".");
            name.push(ext);
        }
        original.with_file_name(name)
    }
}

impl Transcoder for Ffmpeg {
    fn transcode(&self, source: &Path, output: &Path) -> Result<(), RepairError> {
        let result = Command::new(&self.binary)
            .args(Self::arguments(source, output))
            .output()
            .map_err(|source| RepairError::Spawn { tool: TOOL, source })?;

        if result.status.success() {
            Ok(())
        } else {
            Err(RepairError::ToolFailed {
                tool: TOOL,
                path: source.to_path_buf(),
                code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            })
        }
    }
}
