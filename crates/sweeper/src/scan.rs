//! Directory-level scanning for discovering conversion candidates.
//!
//! This module enumerates a single directory level in deterministic order,
//! filtering entries down to video files and classifying subdirectories for
//! the walker to recurse into.

use std::path::{Path, PathBuf};

/// Video file extensions eligible for conversion (case-insensitive matching).
pub const VIDEO_EXTENSIONS: &[&str] = &[
    ".avi", ".wmv", ".rmvb", ".rm", ".asf", ".divx", ".mpg", ".mpeg", ".mpe", ".mp4", ".mkv",
    ".mov", ".vob", ".3gp", ".flv", ".ts", ".webm", ".m4v", ".f4v", ".f4p", ".f4a", ".f4b",
    ".mts",
];

/// Filename suffixes that mark a file as a previous run's output.
///
/// Files carrying one of these are skipped before probing.
pub const CONVERTED_SUFFIXES: &[&str] = &[".x265.mp4", "-x265.mp4", " x265.mp4"];

/// A candidate video file discovered during scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Full path to the video file.
    pub path: PathBuf,
    /// File size in bytes at discovery time.
    pub size_bytes: u64,
}

/// One entry of a directory level, in visit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelEntry {
    /// A subdirectory to recurse into.
    Dir(PathBuf),
    /// A video file to schedule for conversion.
    File(FileCandidate),
}

/// Checks if a file has a video extension (case-insensitive).
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = format!(".{}", ext.to_lowercase());
            VIDEO_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

/// Checks if a filename already carries a converted-output suffix.
pub fn has_converted_suffix(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| CONVERTED_SUFFIXES.iter().any(|s| name.ends_with(s)))
        .unwrap_or(false)
}

/// Enumerates exactly one directory level in sorted order.
///
/// Entries are sorted lexicographically by file name (reversed when `reverse`
/// is set). Entries whose type or metadata cannot be read (broken symlinks,
/// permission errors, files removed mid-walk) are skipped; one bad entry never
/// aborts the listing. Non-video files are dropped here so the walker only
/// ever sees directories and candidates.
pub fn read_level(dir: &Path, reverse: bool) -> Vec<LevelEntry> {
    use walkdir::WalkDir;

    let mut entries: Vec<LevelEntry> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter_map(|entry| {
            let path = entry.path().to_path_buf();
            if entry.file_type().is_dir() {
                return Some(LevelEntry::Dir(path));
            }
            if !entry.file_type().is_file() || !is_video_file(&path) {
                return None;
            }
            let metadata = entry.metadata().ok()?;
            Some(LevelEntry::File(FileCandidate {
                path,
                size_bytes: metadata.len(),
            }))
        })
        .collect();

    if reverse {
        entries.reverse();
    }

    entries
}
