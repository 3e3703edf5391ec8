use std::process::Stdio;
use std::time::Duration;

use label_diff_common::config::VideoConfig;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::intervals::UNKNOWN_FRAME_COUNT;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to spawn probe: {0}")]
    Spawn(String),
    #[error("probe timed out after {0}s")]
    Timeout(u64),
    #[error("probe exited with non-zero status: {0}")]
    Failed(String),
    #[error("probe output is not a frame count: {0:?}")]
    Unparseable(String),
}

/// Total number of frames in the video at `locator` (a path or URL).
///
/// Any failure, and a reported count of zero, yields
/// [`UNKNOWN_FRAME_COUNT`] with a warning.
pub async fn frame_count(locator: &str, config: &VideoConfig) -> i64 {
    if !config.enabled {
        debug!(locator, "video probing disabled");
        return UNKNOWN_FRAME_COUNT;
    }

    match probe(locator, config).await {
        Ok(n) if n > 0 => {
            debug!(locator, frames = n, "probed video length");
            n
        }
        Ok(n) => {
            warn!(locator, frames = n, "probe reported no frames");
            UNKNOWN_FRAME_COUNT
        }
        Err(e) => {
            warn!(locator, error = %e, "failed to get frame count");
            UNKNOWN_FRAME_COUNT
        }
    }
}

async fn probe(locator: &str, config: &VideoConfig) -> Result<i64, ProbeError> {
    let mut cmd = Command::new(&config.probe_command);
    cmd.args([
        "-v", "error",
        "-select_streams", "v:0",
        "-show_entries", "stream=nb_frames",
        "-of", "default=nokey=1:noprint_wrappers=1",
    ])
    .arg(locator)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let output = tokio::time::timeout(
        Duration::from_secs(config.probe_timeout_secs),
        cmd.output(),
    )
    .await
    .map_err(|_| ProbeError::Timeout(config.probe_timeout_secs))?
    .map_err(|e| ProbeError::Spawn(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::Failed(stderr.trim().to_string()));
    }

    parse_frame_count(&String::from_utf8_lossy(&output.stdout))
}

/// First non-empty line of the probe's output as an integer. Containers
/// without a frame count in their header report `N/A`.
pub fn parse_frame_count(stdout: &str) -> Result<i64, ProbeError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default();
    line.parse()
        .map_err(|_| ProbeError::Unparseable(line.to_string()))
}

/// Check whether the probe is available on PATH. Logs a warning if not found.
pub async fn check_probe_available(config: &VideoConfig) {
    if !config.enabled {
        return;
    }
    match Command::new(&config.probe_command).arg("-version").output().await {
        Ok(out) if out.status.success() => {
            debug!(probe = config.probe_command, "video probe is available");
        }
        Ok(_) => {
            warn!(probe = config.probe_command, "probe returned non-zero for -version; frame counts may be unknown");
        }
        Err(e) => {
            warn!(
                probe = config.probe_command,
                error = %e,
                "video probe not found on PATH; trailing intervals will end at -1"
            );
        }
    }
}
