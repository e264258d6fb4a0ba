//! Encoding modules for hevc-sweep

pub mod ffmpeg;

pub use ffmpeg::{
    build_ffmpeg_command, convert, video_filter_for, EncodeError, EncodeSuccess, EncoderSettings,
    MAX_ATTEMPTS,
};
