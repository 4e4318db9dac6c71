//! Atomic content persistence shared by both fetch backends.
//!
//! Content is staged in a temporary file created in the target's own
//! directory (same filesystem, so the final rename is atomic) and only
//! moved over the target after a final existence re-check under the
//! caller's overwrite flag. Both backends use the same policy, so a
//! would-be overwrite never silently diverges between them.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use md5::{Digest, Md5};
use tempfile::NamedTempFile;
use tokio::task;

/// Result of moving staged content into place.
#[derive(Debug)]
pub(crate) enum FinalizeResult {
    /// Temp file was renamed over the target.
    Written(PathBuf),
    /// Target appeared between validation and rename and overwrite is
    /// off; staged content was discarded, the existing file untouched.
    SkippedExisting(PathBuf),
}

/// Create a staging file in `target`'s directory.
pub(crate) fn staging_file(target: &Path) -> Result<NamedTempFile> {
    let parent = target
        .parent()
        .with_context(|| format!("target path has no parent: {}", target.display()))?;
    NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create staging file in {}", parent.display()))
}

/// Re-check existence and rename the staged file over the target.
///
/// Dropping the temp file on the skip path removes it; no partial or
/// orphaned file remains either way.
pub(crate) fn finalize(
    staged: NamedTempFile,
    target: &Path,
    overwrite: bool,
) -> Result<FinalizeResult> {
    if target.exists() && !overwrite {
        return Ok(FinalizeResult::SkippedExisting(target.to_path_buf()));
    }
    staged
        .persist(target)
        .with_context(|| format!("failed to move staged content to {}", target.display()))?;
    Ok(FinalizeResult::Written(target.to_path_buf()))
}

/// Write an in-memory document (browser-rendered HTML) atomically,
/// returning its MD5 alongside the finalize decision.
///
/// Rendered documents can be multi-megabyte, so the synchronous write
/// runs on the blocking pool instead of a worker's event-loop thread.
pub(crate) async fn write_bytes_atomic(
    content: Vec<u8>,
    target: PathBuf,
    overwrite: bool,
) -> Result<(FinalizeResult, String)> {
    task::spawn_blocking(move || write_bytes_blocking(&content, &target, overwrite))
        .await
        .context("staged write task panicked")?
}

fn write_bytes_blocking(
    content: &[u8],
    target: &Path,
    overwrite: bool,
) -> Result<(FinalizeResult, String)> {
    let mut staged = staging_file(target)?;
    staged
        .write_all(content)
        .with_context(|| format!("failed to write staged content for {}", target.display()))?;
    staged.flush().context("failed to flush staged content")?;

    let mut hasher = Md5::new();
    hasher.update(content);
    let md5_hex = hex::encode(hasher.finalize());

    let result = finalize(staged, target, overwrite)?;
    Ok((result, md5_hex))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_file_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("page.html");
        let (result, md5_hex) = write_bytes_blocking(b"hello", &target, false).unwrap();
        assert!(matches!(result, FinalizeResult::Written(_)));
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
        assert_eq!(md5_hex, "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn existing_target_skipped_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("page.html");
        std::fs::write(&target, b"original").unwrap();

        let (result, _) = write_bytes_blocking(b"replacement", &target, false).unwrap();
        assert!(matches!(result, FinalizeResult::SkippedExisting(_)));
        assert_eq!(std::fs::read(&target).unwrap(), b"original");
        // Staged temp file was cleaned up
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn existing_target_replaced_with_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("page.html");
        std::fs::write(&target, b"original").unwrap();

        let (result, _) = write_bytes_blocking(b"replacement", &target, true).unwrap();
        assert!(matches!(result, FinalizeResult::Written(_)));
        assert_eq!(std::fs::read(&target).unwrap(), b"replacement");
    }

    #[tokio::test]
    async fn async_write_offloads_and_matches_blocking_result() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("page.html");
        let (result, md5_hex) = write_bytes_atomic(b"hello".to_vec(), target.clone(), false)
            .await
            .unwrap();
        assert!(matches!(result, FinalizeResult::Written(_)));
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
        assert_eq!(md5_hex, "5d41402abc4b2a76b9719d911017c592");
    }
}
