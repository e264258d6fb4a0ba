//! Chunked bounded-concurrency scheduling.
//!
//! Work is partitioned into consecutive chunks of the concurrency limit; each
//! chunk's tasks run concurrently and the whole chunk is awaited (no
//! fail-fast) before the next one starts. A chunk with one slow file delays
//! the next chunk, but peak resource usage (encoder processes, memory, disk
//! I/O) stays predictably bounded.

use log::warn;
use std::future::Future;

/// Smallest allowed concurrency limit.
pub const MIN_CONCURRENCY: usize = 1;
/// Largest allowed concurrency limit.
pub const MAX_CONCURRENCY: usize = 10;

/// Clamps a limit to the supported range.
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

/// Resolves the configured concurrency value to an effective limit.
///
/// `0` auto-derives from the logical core count (a quarter of the cores,
/// clamped); explicit values are clamped as-is.
pub fn effective_limit(configured: u32) -> usize {
    if configured == 0 {
        derive_limit(num_cpus::get())
    } else {
        clamp_limit(configured as usize)
    }
}

/// Derives a limit from a core count: one encoder per four cores, clamped.
fn derive_limit(cores: usize) -> usize {
    clamp_limit(cores / 4)
}

/// Runs `worker` over `items` in chunks of at most `limit` concurrent tasks.
///
/// Every item is processed; a panicking task is logged and does not cancel
/// its chunk siblings or the remaining chunks.
pub async fn run_bounded<T, F, Fut>(items: Vec<T>, limit: usize, worker: F)
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let limit = clamp_limit(limit);
    let mut iter = items.into_iter();

    loop {
        let chunk: Vec<T> = iter.by_ref().take(limit).collect();
        if chunk.is_empty() {
            break;
        }

        let handles: Vec<_> = chunk
            .into_iter()
            .map(|item| tokio::spawn(worker(item)))
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("scheduled task panicked: {}", e);
            }
        }
    }
}
