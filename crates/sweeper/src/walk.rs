//! Recursive directory traversal driving the scheduler.
//!
//! Directories are visited depth-first in sorted (or reverse-sorted) order.
//! Files accumulate into a pending batch as a level is enumerated; when the
//! enumeration reaches a subdirectory the batch runs to completion through
//! the bounded scheduler before the recursion descends, and a trailing batch
//! runs at the end of the level. Sibling files therefore share a concurrency
//! budget while directory recursion itself stays sequential.

use crate::scan::{self, FileCandidate, LevelEntry};
use crate::scheduler;
use log::info;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use thiserror::Error;

/// Error type for traversal. Only the root being unreadable is fatal; every
/// deeper failure is skipped in place.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("cannot read root directory {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Depth-first walker feeding file batches to a worker through the scheduler.
pub struct Walker<F> {
    worker: F,
    limit: usize,
    reverse: bool,
}

impl<F, Fut> Walker<F>
where
    F: Fn(FileCandidate) -> Fut + Clone + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    /// Creates a walker running `worker` on each discovered candidate, at
    /// most `limit` concurrently within a batch.
    pub fn new(worker: F, limit: usize, reverse: bool) -> Self {
        Self {
            worker,
            limit,
            reverse,
        }
    }

    /// Walks the tree rooted at `root`.
    pub async fn walk(&self, root: &Path) -> Result<(), WalkError> {
        // Readability of the root is the one fatal precondition.
        std::fs::read_dir(root).map_err(|source| WalkError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })?;

        self.walk_dir(root.to_path_buf()).await;
        Ok(())
    }

    // Recursion through an async fn needs the boxed indirection.
    fn walk_dir(&self, dir: PathBuf) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            info!("working dir: {}", dir.display());

            let entries = scan::read_level(&dir, self.reverse);
            let mut pending: Vec<FileCandidate> = Vec::new();

            for entry in entries {
                match entry {
                    LevelEntry::File(candidate) => pending.push(candidate),
                    LevelEntry::Dir(subdir) => {
                        self.run_pending(&mut pending).await;
                        self.walk_dir(subdir).await;
                    }
                }
            }

            self.run_pending(&mut pending).await;
        })
    }

    async fn run_pending(&self, pending: &mut Vec<FileCandidate>) {
        if pending.is_empty() {
            return;
        }
        let batch = std::mem::take(pending);
        scheduler::run_bounded(batch, self.limit, self.worker.clone()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    type EventLog = Arc<Mutex<Vec<String>>>;

    fn recording_worker(
        events: EventLog,
    ) -> impl Fn(FileCandidate) -> Pin<Box<dyn Future<Output = ()> + Send>> + Clone + Send + Sync
    {
        move |candidate: FileCandidate| {
            let events = events.clone();
            Box::pin(async move {
                let name = candidate
                    .path
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned();
                events.lock().unwrap().push(format!("start {}", name));
                tokio::time::sleep(Duration::from_millis(5)).await;
                events.lock().unwrap().push(format!("end {}", name));
            })
        }
    }

    #[tokio::test]
    async fn test_unreadable_root_is_fatal() {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let walker = Walker::new(recording_worker(events), 2, false);

        let result = walker.walk(Path::new("/nonexistent/hevc-sweep-root")).await;
        assert!(matches!(result, Err(WalkError::RootUnreadable { .. })));
    }

    #[tokio::test]
    async fn test_every_video_file_is_visited() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        File::create(root.join("a.avi")).unwrap();
        File::create(root.join("b.mkv")).unwrap();
        File::create(root.join("notes.txt")).unwrap();
        fs::create_dir(root.join("season1")).unwrap();
        File::create(root.join("season1/e1.avi")).unwrap();
        File::create(root.join("season1/e2.avi")).unwrap();

        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let walker = Walker::new(recording_worker(events.clone()), 2, false);
        walker.walk(root).await.unwrap();

        let events = events.lock().unwrap();
        let visited: Vec<&String> = events.iter().filter(|e| e.starts_with("start")).collect();
        assert_eq!(visited.len(), 4, "txt files must not be visited: {:?}", events);
    }

    #[tokio::test]
    async fn test_parent_batch_completes_before_subdirectory() {
        // Sorted level: a.avi, b-sub/, d.avi — the pending batch [a] must
        // finish before b-sub's children start, and d runs after the
        // recursion returns.
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        File::create(root.join("a.avi")).unwrap();
        fs::create_dir(root.join("b-sub")).unwrap();
        File::create(root.join("b-sub/c.avi")).unwrap();
        File::create(root.join("d.avi")).unwrap();

        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let walker = Walker::new(recording_worker(events.clone()), 4, false);
        walker.walk(root).await.unwrap();

        let events = events.lock().unwrap();
        let pos = |needle: &str| {
            events
                .iter()
                .position(|e| e == needle)
                .unwrap_or_else(|| panic!("missing event {:?} in {:?}", needle, events))
        };

        assert!(pos("end a.avi") < pos("start c.avi"));
        assert!(pos("end c.avi") < pos("start d.avi"));
    }

    #[tokio::test]
    async fn test_reverse_order_flips_sibling_scheduling() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        File::create(root.join("a.avi")).unwrap();
        File::create(root.join("z.avi")).unwrap();

        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        // limit 1 forces strictly sequential execution so order is observable
        let walker = Walker::new(recording_worker(events.clone()), 1, true);
        walker.walk(root).await.unwrap();

        let events = events.lock().unwrap();
        let starts: Vec<&String> = events.iter().filter(|e| e.starts_with("start")).collect();
        assert_eq!(starts, vec!["start z.avi", "start a.avi"]);
    }

    #[tokio::test]
    async fn test_empty_tree_walks_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("empty-sub")).unwrap();

        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let walker = Walker::new(recording_worker(events.clone()), 2, false);
        walker.walk(temp_dir.path()).await.unwrap();

        assert!(events.lock().unwrap().is_empty());
    }
}
