//! sox-backed bitrate probe

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::bitrate::parse_bitrate;
use super::{BitrateProbe, ProbeError};

/// Runs `sox --i -B <asset>` and parses its output
///
/// The child is killed if the probe times out or the caller gives up on the
/// future; `output()` drains both pipes before the exit status is read.
#[derive(Debug, Clone)]
pub struct SoxProbe {
    program: PathBuf,
    timeout: Duration,
}

impl SoxProbe {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, asset: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--i")
            .arg("-B")
            .arg(asset)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

impl BitrateProbe for SoxProbe {
    async fn probe(&self, asset: &Path) -> Result<u64, ProbeError> {
        let output = tokio::time::timeout(self.timeout, self.command(asset).output())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
            .map_err(ProbeError::Launch)?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            return Err(ProbeError::Reported(stderr.to_string()));
        }

        if !output.status.success() {
            return Err(ProbeError::Exit(output.status.code()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_bitrate(&stdout).ok_or_else(|| ProbeError::Unparseable(stdout.trim().to_string()))
    }
}
