//! Per-file lock sentinels for crash-safe mutual exclusion.
//!
//! A zero-length marker at `<path>.lock` claims a file across concurrent tasks
//! and across separate runs of the tool. Acquisition uses atomic
//! create-if-absent semantics (`create_new`), so two workers can never both
//! hold the same file; a leftover sentinel from a crashed run reads as
//! contention and the file is skipped.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur while acquiring a lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The sentinel already exists; another worker (or a previous run) owns the file.
    #[error("already locked: {0}")]
    AlreadyLocked(PathBuf),

    /// Sentinel creation failed for a reason other than contention.
    #[error("IO error creating lock: {0}")]
    Io(#[from] io::Error),
}

/// Constructs the lock sentinel path for a given video file.
///
/// The sentinel is placed adjacent to the video file with `.lock` appended.
/// For example: `/media/movie.avi` -> `/media/movie.avi.lock`
pub fn lock_path(video_path: &Path) -> PathBuf {
    let mut sentinel = video_path.as_os_str().to_owned();
    sentinel.push(".lock");
    PathBuf::from(sentinel)
}

/// An exclusive claim on one input path, held until released.
#[derive(Debug)]
pub struct FileLock {
    sentinel: PathBuf,
}

impl FileLock {
    /// Atomically creates the sentinel for `video_path`.
    ///
    /// Fails with [`LockError::AlreadyLocked`] when the sentinel exists; the
    /// caller skips the file rather than waiting.
    pub fn acquire(video_path: &Path) -> Result<Self, LockError> {
        let sentinel = lock_path(video_path);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&sentinel)
        {
            Ok(_) => Ok(Self { sentinel }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(LockError::AlreadyLocked(video_path.to_path_buf()))
            }
            Err(e) => Err(LockError::Io(e)),
        }
    }

    /// Path of the sentinel file backing this lock.
    pub fn sentinel(&self) -> &Path {
        &self.sentinel
    }

    /// Deletes the sentinel. Runs on every exit path of a task, so deletion
    /// failures (already removed) are swallowed.
    pub fn release(self) {
        let _ = fs::remove_file(&self.sentinel);
    }
}

/// Tracks the single most recently acquired lock, process-wide.
///
/// On an interrupt signal the tracked sentinel is removed before exit. Only
/// one path is tracked: within a task, attempts are strictly sequential, so a
/// full set would never hold more than the latest entry per slot anyway.
#[derive(Debug, Clone, Default)]
pub struct LastLock {
    inner: Arc<Mutex<Option<PathBuf>>>,
}

impl LastLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `sentinel` as the most recently acquired lock.
    pub fn set(&self, sentinel: &Path) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(sentinel.to_path_buf());
        }
    }

    /// Clears the tracked path, but only if it still refers to `sentinel`;
    /// a later acquisition by a sibling task must not be forgotten.
    pub fn clear(&self, sentinel: &Path) {
        if let Ok(mut slot) = self.inner.lock() {
            if slot.as_deref() == Some(sentinel) {
                *slot = None;
            }
        }
    }

    /// Best-effort removal of the tracked sentinel, for interrupt handlers.
    pub fn release_last(&self) {
        if let Ok(mut slot) = self.inner.lock() {
            if let Some(path) = slot.take() {
                let _ = fs::remove_file(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_construction() {
        let video = Path::new("/media/movies/film.avi");
        assert_eq!(
            lock_path(video),
            PathBuf::from("/media/movies/film.avi.lock")
        );
    }

    #[test]
    fn test_acquire_creates_empty_sentinel() {
        let temp_dir = TempDir::new().unwrap();
        let video = temp_dir.path().join("film.avi");
        File::create(&video).unwrap();

        let lock = FileLock::acquire(&video).unwrap();
        let sentinel = lock.sentinel().to_path_buf();

        assert!(sentinel.exists(), "sentinel should exist while held");
        assert_eq!(fs::metadata(&sentinel).unwrap().len(), 0);

        lock.release();
        assert!(!sentinel.exists(), "sentinel should be removed on release");
    }

    #[test]
    fn test_second_acquire_fails_with_contention() {
        let temp_dir = TempDir::new().unwrap();
        let video = temp_dir.path().join("film.avi");
        File::create(&video).unwrap();

        let first = FileLock::acquire(&video).unwrap();
        let second = FileLock::acquire(&video);
        assert!(matches!(second, Err(LockError::AlreadyLocked(_))));

        first.release();
        // Once released the path can be claimed again.
        let third = FileLock::acquire(&video);
        assert!(third.is_ok());
        third.unwrap().release();
    }

    #[test]
    fn test_stale_sentinel_reads_as_contention() {
        let temp_dir = TempDir::new().unwrap();
        let video = temp_dir.path().join("film.avi");
        File::create(&video).unwrap();
        // Simulate a crashed run that left its sentinel behind.
        File::create(lock_path(&video)).unwrap();

        let result = FileLock::acquire(&video);
        assert!(matches!(result, Err(LockError::AlreadyLocked(_))));
    }

    #[test]
    fn test_last_lock_release_removes_sentinel() {
        let temp_dir = TempDir::new().unwrap();
        let video = temp_dir.path().join("film.avi");
        File::create(&video).unwrap();

        let lock = FileLock::acquire(&video).unwrap();
        let last = LastLock::new();
        last.set(lock.sentinel());

        last.release_last();
        assert!(!lock.sentinel().exists());

        // A second release finds nothing tracked and is a no-op.
        last.release_last();
    }

    #[test]
    fn test_last_lock_clear_only_matching_path() {
        let last = LastLock::new();
        last.set(Path::new("/a.lock"));

        // A stale clear for a different sentinel must not drop the tracked one.
        last.clear(Path::new("/b.lock"));
        {
            let slot = last.inner.lock().unwrap();
            assert_eq!(slot.as_deref(), Some(Path::new("/a.lock")));
        }

        last.clear(Path::new("/a.lock"));
        let slot = last.inner.lock().unwrap();
        assert!(slot.is_none());
    }
}
