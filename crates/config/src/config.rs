//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Encoder-related configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncoderConfig {
    /// x265 preset passed to the encoder (default "fast")
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Constant rate factor / quality setting (default 25)
    #[serde(default = "default_crf")]
    pub crf: u8,
    /// Resolution cap in pixels of height (0 = no cap)
    #[serde(default)]
    pub max_height: u32,
    /// Always re-encode audio to AAC instead of stream-copying
    #[serde(default)]
    pub force_audio_reencode: bool,
}

fn default_preset() -> String {
    "fast".to_string()
}

fn default_crf() -> u8 {
    25
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            crf: default_crf(),
            max_height: 0,
            force_audio_reencode: false,
        }
    }
}

/// Run-related configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Concurrent conversions per directory chunk (clamped to 1..=10, 0 = auto-derive)
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    /// Visit directory entries in reverse lexicographic order
    #[serde(default)]
    pub reverse: bool,
    /// Echo full encoder command lines
    #[serde(default)]
    pub verbose: bool,
}

fn default_concurrency() -> u32 {
    3
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            reverse: false,
            verbose: false,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - HEVC_SWEEP_PRESET -> encoder.preset
    /// - HEVC_SWEEP_CRF -> encoder.crf
    /// - HEVC_SWEEP_MAX_HEIGHT -> encoder.max_height
    /// - HEVC_SWEEP_FORCE_AUDIO_REENCODE -> encoder.force_audio_reencode
    /// - HEVC_SWEEP_CONCURRENCY -> run.concurrency
    /// - HEVC_SWEEP_REVERSE -> run.reverse
    /// - HEVC_SWEEP_VERBOSE -> run.verbose
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("HEVC_SWEEP_PRESET") {
            if !val.is_empty() {
                self.encoder.preset = val;
            }
        }

        if let Ok(val) = env::var("HEVC_SWEEP_CRF") {
            if let Ok(crf) = val.parse::<u8>() {
                self.encoder.crf = crf;
            }
        }

        if let Ok(val) = env::var("HEVC_SWEEP_MAX_HEIGHT") {
            if let Ok(height) = val.parse::<u32>() {
                self.encoder.max_height = height;
            }
        }

        if let Ok(val) = env::var("HEVC_SWEEP_FORCE_AUDIO_REENCODE") {
            if let Some(flag) = parse_bool(&val) {
                self.encoder.force_audio_reencode = flag;
            }
        }

        if let Ok(val) = env::var("HEVC_SWEEP_CONCURRENCY") {
            if let Ok(limit) = val.parse::<u32>() {
                self.run.concurrency = limit;
            }
        }

        if let Ok(val) = env::var("HEVC_SWEEP_REVERSE") {
            if let Some(flag) = parse_bool(&val) {
                self.run.reverse = flag;
            }
        }

        if let Ok(val) = env::var("HEVC_SWEEP_VERBOSE") {
            if let Some(flag) = parse_bool(&val) {
                self.run.verbose = flag;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }
}

/// Parse a boolean environment value; accepts "true"/"1"/"yes" and "false"/"0"/"no".
///
/// Invalid values return None and leave the existing setting untouched.
fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
