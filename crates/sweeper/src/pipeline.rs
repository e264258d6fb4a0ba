//! Per-file conversion pipeline.
//!
//! Combines the classifier, naming strategy, lock manager and encoder
//! supervisor into the per-file policy: decide, lock, convert, verify, then
//! delete the source or clean up. The source file is deleted only after a
//! verified non-empty output exists; on exhausted retries the partial output
//! and the lock are removed and the source is preserved. No outcome here ever
//! aborts the surrounding batch.

use crate::encode::{self, EncoderSettings};
use crate::lock::{FileLock, LastLock, LockError};
use crate::naming;
use crate::probe::{self, AudioMode, Classification, ProbeInfo};
use crate::scan::{self, FileCandidate};
use crate::stats::{percent_saved, SharedStats};
use log::{info, warn};

/// Shared, run-wide state handed to every file task.
pub struct TaskContext {
    /// Encoder invocation settings.
    pub settings: EncoderSettings,
    /// Re-encode audio even when it could be stream-copied.
    pub force_audio_reencode: bool,
    /// Run statistics accumulator.
    pub stats: SharedStats,
    /// Most-recent-lock tracker for interrupt cleanup.
    pub last_lock: LastLock,
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The file was left untouched.
    Skipped { reason: String },
    /// The file was converted and its source deleted.
    Converted {
        input_bytes: u64,
        output_bytes: u64,
    },
    /// All encode attempts failed, or the task had to abort; source preserved.
    Failed { reason: String },
}

/// Runs the full pipeline for one candidate.
pub async fn process_file(ctx: &TaskContext, candidate: FileCandidate) -> TaskOutcome {
    let path = candidate.path.clone();

    // Fast path: outputs of a previous run are recognizable by name alone.
    if scan::has_converted_suffix(&path) {
        return skip(ctx, &candidate, "output of a previous run");
    }

    let probe_info = probe::probe_file(&path).await;
    let (probe_info, audio_mode) =
        match probe::classify_probe(&probe_info, ctx.force_audio_reencode) {
            Classification::Skip { reason } => return skip(ctx, &candidate, &reason),
            Classification::Convert { probe, audio_mode } => (probe, audio_mode),
        };

    process_classified(ctx, &candidate, &probe_info, audio_mode).await
}

/// The post-classification stages: name, lock, convert, verify, delete.
pub async fn process_classified(
    ctx: &TaskContext,
    candidate: &FileCandidate,
    probe_info: &ProbeInfo,
    audio_mode: AudioMode,
) -> TaskOutcome {
    let path = &candidate.path;

    let output_path = match naming::derive_output_path(path) {
        Some(output_path) => output_path,
        None => {
            // Never risk overwriting the source; abort before any spawn.
            warn!("no safe output name for {}, aborting task", path.display());
            ctx.stats.record_failure();
            return TaskOutcome::Failed {
                reason: "no non-colliding output name".to_string(),
            };
        }
    };

    let lock = match FileLock::acquire(path) {
        Ok(lock) => lock,
        Err(LockError::AlreadyLocked(_)) => {
            return skip(ctx, candidate, "locked by another worker");
        }
        Err(e) => {
            warn!("cannot lock {}: {}", path.display(), e);
            ctx.stats.record_failure();
            return TaskOutcome::Failed {
                reason: format!("lock acquisition failed: {}", e),
            };
        }
    };
    ctx.last_lock.set(lock.sentinel());

    info!(
        "converting {} (codec {}, {}x{}, audio {:?}) -> {}",
        path.display(),
        probe_info.video_codec().unwrap_or("?"),
        probe_info.coded_width,
        probe_info.coded_height,
        audio_mode,
        output_path.display()
    );

    let video_filter = encode::video_filter_for(probe_info.coded_height, ctx.settings.max_height);

    let result = encode::convert(
        path,
        &output_path,
        &ctx.settings,
        audio_mode,
        video_filter.as_deref(),
    )
    .await;

    let outcome = match result {
        Ok(success) => {
            // Verified success: fold into the run totals, then remove the source.
            ctx.stats
                .record_success(candidate.size_bytes, success.output_bytes);

            match tokio::fs::remove_file(path).await {
                Ok(()) => info!("deleted source {}", path.display()),
                Err(e) => warn!("failed to delete source {}: {}", path.display(), e),
            }

            let run = ctx.stats.snapshot();
            info!(
                "finished {}: saved {:.1}% this file, {:.1}% over {} file(s) this run",
                path.display(),
                percent_saved(candidate.size_bytes, success.output_bytes),
                run.percent_saved,
                run.converted_files
            );

            TaskOutcome::Converted {
                input_bytes: candidate.size_bytes,
                output_bytes: success.output_bytes,
            }
        }
        Err(e) => {
            // The supervisor already removed the partial output; keep the source.
            warn!(
                "giving up on {} after {} attempts: {}",
                path.display(),
                encode::MAX_ATTEMPTS,
                e
            );
            ctx.stats.record_failure();
            TaskOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    ctx.last_lock.clear(lock.sentinel());
    lock.release();
    outcome
}

fn skip(ctx: &TaskContext, candidate: &FileCandidate, reason: &str) -> TaskOutcome {
    info!("skip {}: {}", candidate.path.display(), reason);
    ctx.stats.record_skip();
    TaskOutcome::Skipped {
        reason: reason.to_string(),
    }
}
