//! Pluggable content-addressed storage: a shared `StorageBackend` trait
//! implemented by three concrete embedded-database backends.
//!
//! Modeled as a trait object rather than a tagged variant, matching the
//! small, focused traits used elsewhere in this crate.

pub mod redb_backend;
pub mod sled_backend;
pub mod sqlite_backend;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::scan::Dir;
use crate::seal_model::{DirSeal, FileEntry, Sha256Bytes};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("backend I/O failed: {0}")]
    BackendIoFailed(String),
    #[error("stored seal is corrupt: both or neither of dir/file are set at path {0}")]
    CorruptStoredSeal(String),
    #[error("unknown storage backend kind: {0}")]
    UnknownBackend(String),
}

/// A monotonic counter of storage writes, shared across backend instances
/// for benchmarking. Not part of the correctness contract.
pub static PUT_OPS: AtomicU64 = AtomicU64::new(0);

pub fn put_ops() -> u64 {
    PUT_OPS.load(Ordering::Relaxed)
}

fn record_put() {
    PUT_OPS.fetch_add(1, Ordering::Relaxed);
}

/// Unit of content-addressed storage: exactly one of `dir`/`file` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredSeal {
    pub path: String,
    pub dir: Option<DirSeal>,
    pub file: Option<FileEntry>,
}

impl StoredSeal {
    pub fn hash(&self) -> Sha256Bytes {
        match (&self.dir, &self.file) {
            (Some(d), None) => d.sha256,
            (None, Some(f)) => f.sha256,
            _ => unreachable!("StoredSeal invariant: dir XOR file"),
        }
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        match (&self.dir, &self.file) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(StorageError::CorruptStoredSeal(self.path.clone())),
        }
    }
}

/// Shared capability set implemented by every concrete storage backend.
pub trait StorageBackend {
    fn add_dir(&mut self, dir: &Dir, base_path: &Path) -> Result<(), StorageError>;
    fn load_after_hash(&mut self, hash: &[u8], count: usize) -> Result<Vec<StoredSeal>, StorageError>;
    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
    fn close(self: Box<Self>) -> Result<(), StorageError>;
}

/// Builds the list of `StoredSeal`s implied by `add_dir`'s contract for one
/// directory: the dir's own seal plus one entry per live non-directory
/// file, each keyed by hash and by path.
pub fn stored_seals_for_dir(dir: &Dir, base_path: &Path) -> Result<Vec<(String, StoredSeal)>, StorageError> {
    let seal = dir
        .seal
        .as_ref()
        .ok_or_else(|| StorageError::BackendIoFailed(format!("{} has no seal to index", dir.path.display())))?;

    let relative = dir
        .path
        .strip_prefix(base_path)
        .unwrap_or(&dir.path)
        .to_string_lossy()
        .replace('\\', "/");
    let relative = if relative.is_empty() { ".".to_string() } else { relative };

    let mut out = Vec::new();
    out.push((
        relative.clone(),
        StoredSeal {
            path: relative.clone(),
            dir: Some(seal.clone()),
            file: None,
        },
    ));

    for file in seal.files.iter().filter(|f| f.is_live() && !f.is_dir) {
        let path = if relative == "." {
            file.name.clone()
        } else {
            format!("{relative}/{}", file.name)
        };
        out.push((
            path.clone(),
            StoredSeal {
                path,
                dir: None,
                file: Some(file.clone()),
            },
        ));
    }

    Ok(out)
}

/// Selects a backend implementation by its opaque identifier: `"sled"`,
/// `"redb"`, or `"sqlite"`.
pub fn open(kind: &str, path: &Path) -> Result<Box<dyn StorageBackend>, StorageError> {
    match kind {
        "sled" => Ok(Box::new(sled_backend::SledBackend::open(path)?)),
        "redb" => Ok(Box::new(redb_backend::RedbBackend::open(path)?)),
        "sqlite" => Ok(Box::new(sqlite_backend::SqliteBackend::open(path)?)),
        other => Err(StorageError::UnknownBackend(other.to_string())),
    }
}
