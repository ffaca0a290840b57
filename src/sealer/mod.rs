//! Bottom-up directory sealing: reads a directory's immediate children,
//! derives a fresh `DirSeal`, merges it with any prior manifest to retain
//! deletion/old-version history, and writes the result atomically.
//!
//! The manifest write stages to a temp file in the same directory then
//! promotes it with `fs::rename`, one manifest per directory. History merge
//! reuses the `diff` module for added/missing/changed classification.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::context::RunContext;
use crate::diff::diff;
use crate::scan::{scan, Dir, ScanError};
use crate::seal_model::{hash, to_pretty_json, DirSeal, FileEntry, IGNORED_FILENAMES, MANIFEST_FILENAME};

#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("failed to read directory {path}: {source}")]
    ReadDirFailed { path: PathBuf, source: io::Error },
    #[error("child directory has no manifest: {0}")]
    ChildSealMissing(PathBuf),
    #[error("manifest write failed for {path}: {source}")]
    ManifestWriteFailed { path: PathBuf, source: io::Error },
    #[error("manifest encode failed for {path}: {source}")]
    ManifestEncodeFailed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Kinds of non-regular, non-directory entries skipped during a seal,
/// tallied for reporting (not part of the correctness contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkippedKind {
    Symlink,
    Socket,
    Device,
    Fifo,
    Other,
}

/// Outcome of sealing a whole tree: how many directories were sealed, a
/// tally of skipped non-regular entries keyed by kind, and the directories
/// that failed fatally (logged, not propagated, so the rest of the walk
/// still runs — §4.3 "Failure semantics").
#[derive(Debug, Default, Clone)]
pub struct SealSummary {
    pub dirs_sealed: usize,
    pub skipped: BTreeMap<SkippedKind, u64>,
    pub failed: Vec<PathBuf>,
}

/// Seals every directory under `root`, bottom-up. Equivalent to scanning
/// without pre-loaded seals (so every directory is visited, deepest first)
/// and then sealing each one in turn.
pub fn seal(root: &Path) -> Result<SealSummary, SealError> {
    seal_with_context(root, None)
}

/// As `seal`, but reports per-directory progress to `ctx` and holds its
/// write latch for the duration of each manifest write, so a concurrent
/// shutdown request can only interrupt at a directory boundary (§5).
///
/// A fatal error sealing one directory (e.g. `ManifestWriteFailed`) is
/// logged and recorded in the returned summary's `failed` list; the walk of
/// the remaining directories continues rather than aborting (§4.3, §7).
pub fn seal_with_context(root: &Path, ctx: Option<&RunContext>) -> Result<SealSummary, SealError> {
    let dirs = scan(root, false, &[], None)?;
    if let Some(ctx) = ctx {
        ctx.set_total(dirs.len() as u64);
    }

    let mut summary = SealSummary::default();
    for dir in dirs {
        let result = if let Some(ctx) = ctx {
            let _write_guard = ctx.begin_write();
            seal_one(&dir, &mut summary)
        } else {
            seal_one(&dir, &mut summary)
        };

        match result {
            Ok(()) => summary.dirs_sealed += 1,
            Err(e) => {
                tracing::error!(path = %dir.path.display(), error = %e, "sealing directory failed, continuing with remaining directories");
                summary.failed.push(dir.path.clone());
            }
        }

        if let Some(ctx) = ctx {
            ctx.report_dir(dir.path.clone());
        }
    }
    Ok(summary)
}

fn seal_one(dir: &Dir, summary: &mut SealSummary) -> Result<(), SealError> {
    let fresh = compute_fresh_seal(&dir.path, true, Some(summary))?;

    let merged = match load_manifest(&dir.path) {
        Some(prior) => merge_history(prior, fresh),
        None => fresh,
    };

    write_manifest_atomically(&dir.path, &merged)?;
    Ok(())
}

/// Computes a directory's seal from its current filesystem state, without
/// merging prior history or writing anything to disk.
///
/// When `hash_files` is false, file content is not read and `sha256` is left
/// zeroed — used by the verifier's metadata-only pass, where a diff against
/// this seal runs with `check_hash=false` and therefore ignores the field.
/// Child directories always contribute their on-disk `_seal.json` hash,
/// which is cheap to read regardless of `hash_files`.
pub(crate) fn compute_fresh_seal(
    path: &Path,
    hash_files: bool,
    mut summary: Option<&mut SealSummary>,
) -> Result<DirSeal, SealError> {
    let meta = fs::symlink_metadata(path).map_err(|source| SealError::ReadDirFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| ".".to_string());
    let modified = modified_time(&meta);
    let sealed_at = Utc::now();

    let mut files = Vec::new();
    let entries = fs::read_dir(path).map_err(|source| SealError::ReadDirFailed {
        path: path.to_path_buf(),
        source,
    })?;

    let mut children: Vec<_> = entries.flatten().collect();
    children.sort_by_key(|e| e.file_name());

    for entry in children {
        let entry_name = entry.file_name().to_string_lossy().to_string();
        if IGNORED_FILENAMES.contains(&entry_name.as_str()) {
            continue;
        }
        let Ok(entry_meta) = entry.metadata() else {
            tracing::warn!(path = %entry.path().display(), "stat failed on entry, skipping");
            continue;
        };

        if entry_meta.is_dir() {
            let child_seal = load_manifest(&entry.path())
                .ok_or_else(|| SealError::ChildSealMissing(entry.path()))?;
            files.push(FileEntry {
                old_version: false,
                deleted: false,
                name: entry_name,
                is_dir: true,
                size: child_seal.total_size,
                sha256: child_seal.sha256,
                modified: child_seal.modified,
                sealed_at: child_seal.sealed_at,
            });
        } else if entry_meta.is_file() {
            let sha256 = if hash_files {
                match hash::hash_file(&entry.path()) {
                    Ok(h) => h,
                    Err(e) => {
                        tracing::warn!(path = %entry.path().display(), error = %e, "hashing failed, omitting entry");
                        continue;
                    }
                }
            } else {
                [0u8; 32]
            };
            files.push(FileEntry {
                old_version: false,
                deleted: false,
                name: entry_name,
                is_dir: false,
                size: entry_meta.len(),
                sha256,
                modified: modified_time(&entry_meta),
                sealed_at,
            });
        } else {
            let kind = classify_skip(&entry_meta);
            if let Some(summary) = summary.as_deref_mut() {
                *summary.skipped.entry(kind).or_insert(0) += 1;
            }
            tracing::debug!(path = %entry.path().display(), kind = ?kind, "skipping non-regular entry");
        }
    }

    let mut fresh = DirSeal {
        name,
        total_size: 0,
        sha256: [0u8; 32],
        modified,
        sealed_at,
        files,
    };
    fresh.finalize();
    Ok(fresh)
}

/// Merges a freshly computed seal with its prior on-disk version, carrying
/// forward deletion/old-version history for files that no longer exist or
/// that changed since the last seal.
fn merge_history(prior: DirSeal, mut fresh: DirSeal) -> DirSeal {
    let d = diff(&prior, &fresh, true);

    for entry in prior.files.iter().filter(|e| !e.is_live()) {
        fresh.files.push(entry.clone());
    }
    for missing in d.files_missing {
        fresh.files.push(missing.into_deleted());
    }
    for changed in d.files_changed {
        fresh.files.push(changed.want.into_old_version());
    }

    fresh.finalize();
    fresh
}

fn classify_skip(meta: &fs::Metadata) -> SkippedKind {
    use std::os::unix::fs::FileTypeExt;
    let ft = meta.file_type();
    if ft.is_symlink() {
        SkippedKind::Symlink
    } else if ft.is_socket() {
        SkippedKind::Socket
    } else if ft.is_block_device() || ft.is_char_device() {
        SkippedKind::Device
    } else if ft.is_fifo() {
        SkippedKind::Fifo
    } else {
        SkippedKind::Other
    }
}

fn modified_time(meta: &fs::Metadata) -> DateTime<Utc> {
    DateTime::from_timestamp(meta.mtime(), 0).unwrap_or_else(Utc::now)
}

pub(crate) fn load_manifest(dir: &Path) -> Option<DirSeal> {
    let path = dir.join(MANIFEST_FILENAME);
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(seal) => Some(seal),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "manifest parse failed during merge, treating as absent");
            None
        }
    }
}

/// Writes `seal` to `<dir>/_seal.json` by staging to a temp file in the
/// same directory, then renaming into place — crash-safe unlike the
/// original tool's create-and-write.
fn write_manifest_atomically(dir: &Path, seal: &DirSeal) -> Result<(), SealError> {
    let json = to_pretty_json(seal).map_err(|source| SealError::ManifestEncodeFailed {
        path: dir.join(MANIFEST_FILENAME),
        source,
    })?;

    let mut staged = tempfile::Builder::new()
        .prefix(".seal-")
        .tempfile_in(dir)
        .map_err(|source| SealError::ManifestWriteFailed {
            path: dir.join(MANIFEST_FILENAME),
            source,
        })?;

    use std::io::Write;
    staged
        .write_all(json.as_bytes())
        .and_then(|_| staged.flush())
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|source| SealError::ManifestWriteFailed {
            path: dir.join(MANIFEST_FILENAME),
            source,
        })?;

    staged
        .persist(dir.join(MANIFEST_FILENAME))
        .map_err(|e| SealError::ManifestWriteFailed {
            path: dir.join(MANIFEST_FILENAME),
            source: e.error,
        })?;

    Ok(())
}
