//! In-place MP3 repair via `mp3val`.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::{Mp3RepairReport, Mp3Repairer, RepairError};

const TOOL: &str = "mp3val";

/// [`Mp3Repairer`] running `mp3val -f -nb -si FILE`.
///
/// `-f` fixes errors in place, `-nb` suppresses mp3val's own backup (the
/// pipeline takes its own), `-si` suppresses informational messages.
#[derive(Debug, Clone)]
pub struct Mp3val {
    binary: PathBuf,
}

impl Mp3val {
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Whether mp3val's output says it fixed something.
    #[must_use]
    pub fn reports_fix(stdout: &str) -> bool {
        stdout.contains("FIXED")
    }
}

impl Mp3Repairer for Mp3val {
    fn repair(&self, path: &Path) -> Result<Mp3RepairReport, RepairError> {
        let output = Command::new(&self.binary)
            .args(["-f", "-nb", "-si"])
            .arg(path)
            .output()
            .map_err(|source| RepairError::Spawn { tool: TOOL, source })?;

        if !output.status.success() {
            return Err(RepairError::ToolFailed {
                tool: TOOL,
                path: path.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let fixed = Self::reports_fix(&stdout);
        log::debug!(
            "mp3val on {}: {}",
            path.display(),
            if fixed { "fixed" } else { "no changes" }
        );
        Ok(Mp3RepairReport { fixed })
    }
}
