//! Preflight checks for the external encoder and prober.
//!
//! Verifies that `ffmpeg` and `ffprobe` execute before the walk begins; a
//! missing tool is a fatal startup error rather than a per-file failure loop.

use std::process::Command;
use thiserror::Error;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ffmpeg not available: {0}")]
    FfmpegUnavailable(String),

    #[error("ffprobe not available: {0}")]
    FfprobeUnavailable(String),
}

/// Check that ffmpeg runs by invoking `ffmpeg -version`.
pub fn check_ffmpeg_available() -> Result<(), StartupError> {
    check_tool("ffmpeg").map_err(StartupError::FfmpegUnavailable)
}

/// Check that ffprobe runs by invoking `ffprobe -version`.
pub fn check_ffprobe_available() -> Result<(), StartupError> {
    check_tool("ffprobe").map_err(StartupError::FfprobeUnavailable)
}

/// Run all startup checks in order.
pub fn run_startup_checks() -> Result<(), StartupError> {
    check_ffmpeg_available()?;
    check_ffprobe_available()?;
    Ok(())
}

fn check_tool(tool: &str) -> Result<(), String> {
    let output = Command::new(tool)
        .arg("-version")
        .output()
        .map_err(|e| format!("{} -version failed; is it in PATH? Error: {}", tool, e))?;

    if !output.status.success() {
        return Err(format!("{} -version exited with {}", tool, output.status));
    }

    Ok(())
}
