//! Depth-first directory walk producing an ordered list of `Dir`, deepest
//! first, with optional prefix and `before`-timestamp filtering. Entries
//! are visited in sorted order for deterministic output.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::diff::Diff;
use crate::seal_model::{DirSeal, MANIFEST_FILENAME};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("manifest parse failed for {path}: {source}")]
    ManifestParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One directory encountered during a scan.
#[derive(Debug, Clone)]
pub struct Dir {
    pub path: PathBuf,
    pub depth: usize,
    pub seal: Option<DirSeal>,
    pub quick_diff: Option<Diff>,
    pub hash_diff: Option<Diff>,
}

impl Dir {
    fn new(path: PathBuf, depth: usize) -> Self {
        Self {
            path,
            depth,
            seal: None,
            quick_diff: None,
            hash_diff: None,
        }
    }
}

/// Walks `root`, yielding `Dir` entries ordered with deeper directories
/// before shallower ones (ties broken by path, ascending, for determinism).
///
/// - `load_seals`: when true, attaches each directory's existing
///   `_seal.json` if present.
/// - `prefixes`: when non-empty, only directories whose path relative to
///   `root` equals or is nested under one of these prefixes are kept. The
///   root itself (relative path `.`) always matches.
/// - `before`: when set, skips directories whose loaded seal's `sealed_at`
///   is strictly after this instant. Implies `load_seals`.
///
/// A directory with no `_seal.json` is silently skipped (§4.2), but a
/// directory whose `_seal.json` exists and fails to parse is surfaced as
/// `ScanError::ManifestParseFailed` rather than treated the same as
/// "missing" — callers that want corruption folded into "absent" (the
/// sealer's own history-merge step) use their own manifest loader instead
/// of going through this one (§7's `ManifestParseFailed` row: "fatal during
/// verify", and likewise for indexing, which must not silently drop
/// corrupt entries from the content-addressed index).
pub fn scan(
    root: &Path,
    load_seals: bool,
    prefixes: &[String],
    before: Option<DateTime<Utc>>,
) -> Result<Vec<Dir>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let load_seals = load_seals || before.is_some();
    let mut out = Vec::new();
    walk(root, root, 0, load_seals, prefixes, before, &mut out)?;

    out.sort_by(|a, b| b.depth.cmp(&a.depth).then_with(|| a.path.cmp(&b.path)));
    Ok(out)
}

fn relative_path(root: &Path, dir: &Path) -> String {
    let rel = dir.strip_prefix(root).unwrap_or(dir);
    if rel.as_os_str().is_empty() {
        ".".to_string()
    } else {
        rel.to_string_lossy().replace('\\', "/")
    }
}

fn matches_prefix(relative: &str, prefixes: &[String]) -> bool {
    if prefixes.is_empty() || relative == "." {
        return true;
    }
    prefixes
        .iter()
        .any(|p| relative == p || relative.starts_with(&format!("{p}/")))
}

fn walk(
    root: &Path,
    dir: &Path,
    depth: usize,
    load_seals: bool,
    prefixes: &[String],
    before: Option<DateTime<Utc>>,
    out: &mut Vec<Dir>,
) -> Result<(), ScanError> {
    // Traversal always descends so that a prefix nested several levels deep
    // is still reachable; only the output list is filtered by prefix.
    let relative = relative_path(root, dir);

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "read_dir failed, skipping directory");
            return Ok(());
        }
    };

    let mut children = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            tracing::warn!(path = %path.display(), "stat failed on directory entry, skipping");
            continue;
        };
        if meta.is_dir() {
            children.push(path);
        }
    }
    children.sort();

    for child in &children {
        walk(root, child, depth + 1, load_seals, prefixes, before, out)?;
    }

    if !matches_prefix(&relative, prefixes) {
        return Ok(());
    }

    let mut node = Dir::new(dir.to_path_buf(), depth);

    if load_seals {
        match load_manifest(dir)? {
            Some(seal) => {
                if let Some(cutoff) = before {
                    if seal.sealed_at > cutoff {
                        return Ok(());
                    }
                }
                node.seal = Some(seal);
            }
            None => return Ok(()),
        }
    }

    out.push(node);
    Ok(())
}

/// Loads `<dir>/_seal.json`. A missing file is `Ok(None)` (§4.2: the
/// directory is simply skipped); a file that exists but fails to parse is
/// `Err(ManifestParseFailed)` — this loader does not have a "treat corrupt
/// as absent" mode, since none of `scan`'s current callers want that (the
/// sealer's history merge uses its own, separate manifest loader for that
/// policy).
fn load_manifest(dir: &Path) -> Result<Option<DirSeal>, ScanError> {
    let path = dir.join(MANIFEST_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Ok(None),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ScanError::ManifestParseFailed { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn rejects_non_directory_root() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f.txt");
        fs::write(&file, "x").unwrap();
        let err = scan(&file, false, &[], None).unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory(_)));
    }

    #[test]
    fn deeper_directories_come_first() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b/c")).unwrap();

        let dirs = scan(tmp.path(), false, &[], None).unwrap();
        for pair in dirs.windows(2) {
            assert!(pair[0].depth >= pair[1].depth);
        }
        assert_eq!(dirs.last().unwrap().path, tmp.path());
    }

    #[test]
    fn prefix_filter_keeps_only_matching_subtrees() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("photos/vacation")).unwrap();
        fs::create_dir_all(tmp.path().join("videos")).unwrap();
        fs::create_dir_all(tmp.path().join("docs")).unwrap();

        let dirs = scan(tmp.path(), false, &["photos".to_string()], None).unwrap();
        let relatives: Vec<String> = dirs
            .iter()
            .map(|d| relative_path(tmp.path(), &d.path))
            .collect();

        assert!(relatives.contains(&".".to_string()));
        assert!(relatives.contains(&"photos".to_string()));
        assert!(relatives.contains(&"photos/vacation".to_string()));
        assert!(!relatives.iter().any(|r| r.starts_with("videos")));
        assert!(!relatives.iter().any(|r| r.starts_with("docs")));
    }

    #[test]
    fn missing_manifest_is_skipped_when_load_seals_true() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();

        let dirs = scan(tmp.path(), true, &[], None).unwrap();
        assert!(dirs.is_empty());
    }

    /// §7: `ManifestParseFailed` is "fatal during verify" — distinct from a
    /// missing manifest, which is silently skipped. `scan()` is the shared
    /// path used by both `verify` and `index`, so a corrupt manifest must
    /// surface as a hard error here rather than be swallowed.
    #[test]
    fn corrupt_manifest_is_a_hard_error_not_silently_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILENAME), b"not valid json").unwrap();

        let err = scan(tmp.path(), true, &[], None).unwrap_err();
        assert!(matches!(err, ScanError::ManifestParseFailed { .. }));
    }
}
