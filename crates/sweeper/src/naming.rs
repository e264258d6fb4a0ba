//! Output naming strategy for converted files.
//!
//! Derives a non-colliding output path from an input path by replacing the
//! extension with the target container extension, falling back to `.x265`,
//! `-x265`, and ` x265` markers when the naive replacement collides (as it
//! does for `.mp4` sources that carry a different codec).

use std::path::{Path, PathBuf};

/// Container extension of converted outputs.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Derives the output path for a conversion.
///
/// Tries, in order: plain extension replacement, a `.x265` marker, a `-x265`
/// marker, and a ` x265` marker before the extension. Returns the first
/// candidate that does not collide with the input path; `None` when every
/// fallback collides, in which case the task must abort rather than risk
/// overwriting the source. Collisions are compared case-insensitively so the
/// derivation stays safe on case-insensitive filesystems.
///
/// Pure and deterministic: the same input always yields the same candidate.
pub fn derive_output_path(input: &Path) -> Option<PathBuf> {
    for candidate in candidate_outputs(input) {
        if !paths_collide(input, &candidate) {
            return Some(candidate);
        }
    }
    None
}

/// The ordered output candidates for an input path.
fn candidate_outputs(input: &Path) -> [PathBuf; 4] {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    [
        input.with_extension(OUTPUT_EXTENSION),
        input.with_file_name(format!("{}.x265.{}", stem, OUTPUT_EXTENSION)),
        input.with_file_name(format!("{}-x265.{}", stem, OUTPUT_EXTENSION)),
        input.with_file_name(format!("{} x265.{}", stem, OUTPUT_EXTENSION)),
    ]
}

/// Compares two paths for collision, case-insensitively.
fn paths_collide(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}
