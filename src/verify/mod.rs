//! Two-pass verification: a cheap metadata-only pass followed by a
//! content-hash pass, each diffing a freshly recomputed seal against the
//! directory's on-disk manifest without ever writing one.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::diff::diff;
use crate::scan::{scan, Dir, ScanError};
use crate::sealer::{self, SealError};

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("directory has no existing manifest to verify against: {0}")]
    NoBaselineSeal(std::path::PathBuf),
    #[error(transparent)]
    Reseal(#[from] SealError),
}

/// Outcome of verifying one tree: the scanned directories, each carrying
/// its `quick_diff` and `hash_diff`, plus whether any directory diverged.
#[derive(Debug)]
pub struct VerifyReport {
    pub dirs: Vec<Dir>,
    pub any_diverged: bool,
}

/// Verifies every directory under `root` matching `prefixes` (all, if
/// empty) in two passes: metadata-only, then content-hash. Never writes
/// `_seal.json`.
pub fn verify(root: &Path, prefixes: &[String]) -> Result<VerifyReport, VerifyError> {
    verify_before(root, prefixes, None)
}

/// As `verify`, but additionally skips directories whose loaded seal is
/// newer than `before` (`-b/--before`).
pub fn verify_before(
    root: &Path,
    prefixes: &[String],
    before: Option<DateTime<Utc>>,
) -> Result<VerifyReport, VerifyError> {
    let mut dirs = scan(root, true, prefixes, before)?;
    if !dirs.iter().any(|d| d.path == root) {
        return Err(VerifyError::NoBaselineSeal(root.to_path_buf()));
    }
    let mut any_diverged = false;

    for dir in &mut dirs {
        let baseline = dir
            .seal
            .as_ref()
            .ok_or_else(|| VerifyError::NoBaselineSeal(dir.path.clone()))?
            .clone();

        let metadata_only = sealer::compute_fresh_seal(&dir.path, false, None)?;
        let quick = diff(&baseline, &metadata_only, false);
        if !quick.identical {
            any_diverged = true;
        }
        dir.quick_diff = Some(quick);

        let hashed = sealer::compute_fresh_seal(&dir.path, true, None)?;
        let hash_diff = diff(&baseline, &hashed, true);
        if !hash_diff.identical {
            any_diverged = true;
        }
        dir.hash_diff = Some(hash_diff);
    }

    Ok(VerifyReport { dirs, any_diverged })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sealer::seal;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn unmodified_tree_verifies_identical_on_both_passes() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), b"hello").unwrap();
        seal(tmp.path()).unwrap();

        let report = verify(tmp.path(), &[]).unwrap();
        assert!(!report.any_diverged);
        let root_dir = report.dirs.iter().find(|d| d.path == tmp.path()).unwrap();
        assert!(root_dir.quick_diff.as_ref().unwrap().identical);
        assert!(root_dir.hash_diff.as_ref().unwrap().identical);
    }

    #[test]
    fn same_size_content_corruption_is_only_caught_by_hash_pass() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), b"hello").unwrap();
        seal(tmp.path()).unwrap();

        // Same length, so the metadata-only pass (size/mtime only, hash
        // forced to match) cannot see this; the hash pass must.
        fs::write(tmp.path().join("a.txt"), b"olleh").unwrap();

        let report = verify(tmp.path(), &[]).unwrap();
        let root_dir = report.dirs.iter().find(|d| d.path == tmp.path()).unwrap();
        assert!(!root_dir.hash_diff.as_ref().unwrap().identical);
        assert!(report.any_diverged);
    }

    #[test]
    fn missing_file_is_caught_by_metadata_pass() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), b"hello").unwrap();
        fs::write(tmp.path().join("b.txt"), b"world").unwrap();
        seal(tmp.path()).unwrap();

        fs::remove_file(tmp.path().join("b.txt")).unwrap();
        let report = verify(tmp.path(), &[]).unwrap();
        let root_dir = report.dirs.iter().find(|d| d.path == tmp.path()).unwrap();
        assert!(!root_dir.quick_diff.as_ref().unwrap().identical);
        assert!(report.any_diverged);
    }

    #[test]
    fn unsealed_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), b"hello").unwrap();
        let err = verify(tmp.path(), &[]).unwrap_err();
        assert!(matches!(err, VerifyError::NoBaselineSeal(_)));
    }

    #[test]
    fn nonexistent_root_is_a_scan_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("does-not-exist");
        let err = verify(&missing, &[]).unwrap_err();
        assert!(matches!(err, VerifyError::Scan(_)));
    }

    /// §7: `ManifestParseFailed` is "fatal during verify" — a corrupt
    /// manifest anywhere under the tree must abort the verify with an
    /// error, not be silently dropped from the report the way a genuinely
    /// missing manifest is treated during the sealer's history merge.
    #[test]
    fn corrupt_manifest_fails_verify_instead_of_being_silently_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), b"hello").unwrap();
        seal(tmp.path()).unwrap();

        fs::write(tmp.path().join(crate::seal_model::MANIFEST_FILENAME), b"not valid json").unwrap();

        let err = verify(tmp.path(), &[]).unwrap_err();
        assert!(matches!(err, VerifyError::Scan(crate::scan::ScanError::ManifestParseFailed { .. })));
    }
}
