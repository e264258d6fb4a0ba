//! Media classification via the external prober.
//!
//! Runs `ffprobe -v quiet -show_format -show_streams` on a candidate and
//! interprets its key=value stream dump. Only `codec_name`, `coded_width` and
//! `coded_height` tokens are extracted; everything else is noise. A prober
//! crash or unparsable output yields an empty result, which classifies the
//! file as unknown: unknown media is skipped, never converted or deleted.

use log::warn;
use std::path::Path;
use tokio::process::Command;

/// Codec identifier conversions are aimed at; files already carrying it are skipped.
pub const TARGET_CODEC: &str = "hevc";

/// Audio codecs that cannot be stream-copied into MP4 and force AAC re-encoding.
const REENCODE_AUDIO_CODECS: &[&str] = &["wmav1", "wmav2", "wmapro"];

/// Codec and dimension information extracted from prober output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInfo {
    /// Every `codec_name=` token found, in stream order (video first in practice).
    pub codec_names: Vec<String>,
    /// Coded width in pixels; -1 when unknown, never 0.
    pub coded_width: i32,
    /// Coded height in pixels; -1 when unknown, never 0.
    pub coded_height: i32,
}

impl Default for ProbeInfo {
    fn default() -> Self {
        Self {
            codec_names: Vec::new(),
            coded_width: -1,
            coded_height: -1,
        }
    }
}

impl ProbeInfo {
    /// The codec of the primary stream (first `codec_name=` token), if any.
    pub fn video_codec(&self) -> Option<&str> {
        self.codec_names.first().map(String::as_str)
    }

    /// True when probing produced nothing usable.
    pub fn is_empty(&self) -> bool {
        self.codec_names.is_empty()
    }
}

/// How the audio streams will be handled by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    /// Pass audio through unchanged.
    Copy,
    /// Re-encode audio to AAC.
    Reencode,
}

impl AudioMode {
    /// The `-c:a` argument value for this mode.
    pub fn as_codec_arg(&self) -> &'static str {
        match self {
            AudioMode::Copy => "copy",
            AudioMode::Reencode => "aac",
        }
    }
}

/// Result of classifying a candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// The file should be converted.
    Convert {
        probe: ProbeInfo,
        audio_mode: AudioMode,
    },
    /// The file should be left alone, with the given reason.
    Skip { reason: String },
}

/// Probes a file, returning an empty [`ProbeInfo`] on any prober failure.
pub async fn probe_file(path: &Path) -> ProbeInfo {
    let output = match Command::new("ffprobe")
        .args(["-v", "quiet", "-show_format", "-show_streams"])
        .arg(path)
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            warn!("ffprobe failed to spawn for {}: {}", path.display(), e);
            return ProbeInfo::default();
        }
    };

    if !output.status.success() {
        warn!(
            "ffprobe exited with {} for {}",
            output.status,
            path.display()
        );
        return ProbeInfo::default();
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Scans prober output for `codec_name`, `coded_width` and `coded_height` tokens.
pub fn parse_probe_output(text: &str) -> ProbeInfo {
    let mut info = ProbeInfo::default();

    for line in text.lines() {
        if let Some(value) = token_value(line, "codec_name=") {
            info.codec_names.push(value.to_string());
        }
        if info.coded_width < 0 {
            if let Some(value) = token_value(line, "coded_width=") {
                if let Ok(width) = value.parse::<i32>() {
                    info.coded_width = width;
                }
            }
        }
        if info.coded_height < 0 {
            if let Some(value) = token_value(line, "coded_height=") {
                if let Ok(height) = value.parse::<i32>() {
                    info.coded_height = height;
                }
            }
        }
    }

    info
}

/// Decides whether a probed file is converted and how its audio is handled.
pub fn classify_probe(probe: &ProbeInfo, force_audio_reencode: bool) -> Classification {
    if probe.is_empty() {
        return Classification::Skip {
            reason: "unknown codec (probe produced no usable output)".to_string(),
        };
    }

    // Target match is exact and case-sensitive: prober codec identifiers are
    // stable lowercase names.
    if probe.video_codec() == Some(TARGET_CODEC) {
        return Classification::Skip {
            reason: format!("already {}", TARGET_CODEC),
        };
    }

    let needs_audio_reencode = force_audio_reencode
        || probe
            .codec_names
            .iter()
            .any(|codec| REENCODE_AUDIO_CODECS.contains(&codec.as_str()));

    Classification::Convert {
        probe: probe.clone(),
        audio_mode: if needs_audio_reencode {
            AudioMode::Reencode
        } else {
            AudioMode::Copy
        },
    }
}

/// Extracts the word value following `key` in a line, if present.
fn token_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = &line[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some(&rest[..end])
}
