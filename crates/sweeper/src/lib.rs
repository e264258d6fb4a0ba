//! hevc-sweep
//!
//! Batch transcoding orchestrator: walks a directory tree, classifies video
//! files by codec, and converts everything not yet HEVC with bounded
//! parallelism, crash-safe per-file locking, and run-wide space statistics.

pub mod encode;
pub mod lock;
pub mod naming;
pub mod pipeline;
pub mod probe;
pub mod scan;
pub mod scheduler;
pub mod startup;
pub mod stats;
pub mod telemetry;
pub mod walk;

pub use hevc_sweep_config as config;
pub use hevc_sweep_config::Config;

pub use encode::{
    build_ffmpeg_command, convert, video_filter_for, EncodeError, EncodeSuccess, EncoderSettings,
    MAX_ATTEMPTS,
};
pub use lock::{lock_path, FileLock, LastLock, LockError};
pub use naming::{derive_output_path, OUTPUT_EXTENSION};
pub use pipeline::{process_classified, process_file, TaskContext, TaskOutcome};
pub use probe::{
    classify_probe, parse_probe_output, probe_file, AudioMode, Classification, ProbeInfo,
    TARGET_CODEC,
};
pub use scan::{
    has_converted_suffix, is_video_file, read_level, FileCandidate, LevelEntry,
    CONVERTED_SUFFIXES, VIDEO_EXTENSIONS,
};
pub use scheduler::{
    clamp_limit, effective_limit, run_bounded, MAX_CONCURRENCY, MIN_CONCURRENCY,
};
pub use startup::{
    check_ffmpeg_available, check_ffprobe_available, run_startup_checks, StartupError,
};
pub use stats::{new_shared_stats, percent_saved, RunStats, SharedStats, StatsSnapshot};
pub use telemetry::{timestamp_to_secs, LineEvent, ProgressSnapshot, TelemetryParser};
pub use walk::{WalkError, Walker};
