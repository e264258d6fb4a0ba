//! ffmpeg invocation and retry supervision.
//!
//! Spawns the external encoder once per attempt, streams its stderr through
//! the telemetry parser, and verifies the output after a reported success.
//! Attempts are retried with a fixed backoff; after the last failure any
//! partial output is removed best-effort and the source is left untouched.

use crate::probe::AudioMode;
use crate::telemetry::{LineEvent, ProgressSnapshot, TelemetryParser};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::sleep;

/// Total encoder attempts per file before giving up.
pub const MAX_ATTEMPTS: u32 = 3;

/// Pause between attempts.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Error type for encoding operations
#[derive(Debug, Error)]
pub enum EncodeError {
    /// ffmpeg exited with non-zero status.
    #[error("ffmpeg failed with exit code {0}")]
    ExitCode(i32),

    /// ffmpeg was terminated by a signal.
    #[error("ffmpeg was terminated by a signal")]
    Terminated,

    /// The process reported success but no output file exists.
    #[error("output file missing after encode: {0}")]
    MissingOutput(PathBuf),

    /// The process reported success but wrote an empty file.
    #[error("output file empty after encode: {0}")]
    EmptyOutput(PathBuf),

    /// IO error spawning or waiting on the encoder.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encoder invocation settings, fixed for the whole run.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    /// x265 preset.
    pub preset: String,
    /// Quality factor.
    pub crf: u8,
    /// Resolution cap in pixels of height; 0 disables the cap.
    pub max_height: u32,
    /// Echo the full command line for each spawn.
    pub verbose: bool,
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSuccess {
    /// Verified size of the output file in bytes.
    pub output_bytes: u64,
    /// Terminal telemetry snapshot of the winning attempt.
    pub final_progress: ProgressSnapshot,
}

/// Derives the `-vf` scale filter for a resolution cap.
///
/// Returns `None` when no cap is configured or the coded height is unknown
/// (-1) or already within the cap. `-2` keeps the width even as required by
/// libx265.
pub fn video_filter_for(coded_height: i32, max_height: u32) -> Option<String> {
    if max_height == 0 || coded_height <= max_height as i32 {
        return None;
    }
    Some(format!("scale=-2:{}", max_height))
}

/// Builds the ffmpeg command for a single attempt.
///
/// The argument order is fixed: overwrite + hwaccel flags, input path,
/// optional resolution filter, video codec, preset, quality factor, hvc1 tag,
/// audio mode, output path.
pub fn build_ffmpeg_command(
    input: &Path,
    output: &Path,
    settings: &EncoderSettings,
    audio_mode: AudioMode,
    video_filter: Option<&str>,
) -> std::process::Command {
    let mut cmd = std::process::Command::new("ffmpeg");

    cmd.arg("-y");
    cmd.arg("-hwaccel").arg("auto");
    cmd.arg("-i").arg(input);

    if let Some(filter) = video_filter {
        cmd.arg("-vf").arg(filter);
    }

    cmd.arg("-c:v").arg("libx265");
    cmd.arg("-preset").arg(&settings.preset);
    cmd.arg("-crf").arg(settings.crf.to_string());
    cmd.arg("-tag:v").arg("hvc1");
    cmd.arg("-c:a").arg(audio_mode.as_codec_arg());
    cmd.arg(output);

    cmd
}

/// Converts one file, retrying up to [`MAX_ATTEMPTS`] times.
///
/// On success the output size is verified and returned; the caller deletes
/// the source. On exhaustion any partial output is removed best-effort and
/// the last error is returned; the caller releases the lock and leaves the
/// source untouched.
pub async fn convert(
    input: &Path,
    output: &Path,
    settings: &EncoderSettings,
    audio_mode: AudioMode,
    video_filter: Option<&str>,
) -> Result<EncodeSuccess, EncodeError> {
    let mut attempt = 0;
    loop {
        match run_attempt(input, output, settings, audio_mode, video_filter).await {
            Ok(success) => return Ok(success),
            Err(e) => {
                attempt += 1;
                warn!(
                    "encode attempt {}/{} failed for {}: {}",
                    attempt,
                    MAX_ATTEMPTS,
                    input.display(),
                    e
                );
                if attempt >= MAX_ATTEMPTS {
                    let _ = tokio::fs::remove_file(output).await;
                    return Err(e);
                }
                sleep(RETRY_BACKOFF).await;
            }
        }
    }
}

/// One encoder invocation: spawn, stream telemetry, await, verify output.
async fn run_attempt(
    input: &Path,
    output: &Path,
    settings: &EncoderSettings,
    audio_mode: AudioMode,
    video_filter: Option<&str>,
) -> Result<EncodeSuccess, EncodeError> {
    let std_cmd = build_ffmpeg_command(input, output, settings, audio_mode, video_filter);

    if settings.verbose {
        info!("ffmpeg command: {}", render_command(&std_cmd));
    }

    let mut cmd = Command::from(std_cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    let mut parser = TelemetryParser::new();

    // ffmpeg separates progress updates with carriage returns and diagnostic
    // text with newlines; split on CR first, then on LF within each segment.
    // Draining stderr to EOF before wait() also keeps the pipe from filling.
    if let Some(stderr) = child.stderr.take() {
        let mut segments = BufReader::new(stderr).split(b'\r');
        while let Ok(Some(segment)) = segments.next_segment().await {
            let text = String::from_utf8_lossy(&segment);
            for line in text.lines() {
                if let LineEvent::Progress(snapshot) = parser.feed_line(line) {
                    debug!(
                        "{}: {:.1}% at {} ({}, {})",
                        input.display(),
                        snapshot.percent * 100.0,
                        snapshot.speed_str,
                        snapshot.bitrate_str,
                        snapshot.human_size
                    );
                }
            }
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(match status.code() {
            Some(code) => EncodeError::ExitCode(code),
            None => EncodeError::Terminated,
        });
    }

    // A zero exit is not enough: the output must exist and be non-empty
    // before anyone is allowed to delete the source.
    let metadata = tokio::fs::metadata(output)
        .await
        .map_err(|_| EncodeError::MissingOutput(output.to_path_buf()))?;
    if metadata.len() == 0 {
        return Err(EncodeError::EmptyOutput(output.to_path_buf()));
    }

    Ok(EncodeSuccess {
        output_bytes: metadata.len(),
        final_progress: parser.latest().clone(),
    })
}

/// Renders a command line for verbose echo.
fn render_command(cmd: &std::process::Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}
