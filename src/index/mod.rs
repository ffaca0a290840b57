//! Drives a `StorageBackend` to persist a scan's directories and to
//! rematerialize them into an in-memory index keyed by hash and by path.
//! Loading pages through `load_after_hash` until a short batch signals
//! the end.

use std::collections::HashMap;
use std::path::Path;

use crate::scan::Dir;
use crate::seal_model::Sha256Bytes;
use crate::storage::{StorageBackend, StorageError, StoredSeal};

const BATCH: usize = 10_000;

/// In-memory materialization of a storage backend.
#[derive(Debug, Default)]
pub struct LoadedIndex {
    pub dirs: Vec<Dir>,
    pub by_hash: HashMap<Sha256Bytes, StoredSeal>,
    pub by_path: HashMap<String, StoredSeal>,
}

/// Persists every directory in `scan_output` to `backend`, then flushes and
/// closes it.
pub fn index(scan_output: &[Dir], base_path: &Path, mut backend: Box<dyn StorageBackend>) -> Result<(), StorageError> {
    for dir in scan_output {
        backend.add_dir(dir, base_path)?;
    }
    backend.flush()?;
    backend.close()
}

/// Rematerializes a backend's full contents into a `LoadedIndex` by
/// repeatedly paging through `load_after_hash` until a short batch signals
/// the end.
pub fn load(backend: &mut dyn StorageBackend) -> Result<LoadedIndex, StorageError> {
    let mut loaded = LoadedIndex::default();
    let mut last_hash: Vec<u8> = Vec::new();

    loop {
        let batch = backend.load_after_hash(&last_hash, BATCH)?;
        let batch_len = batch.len();

        for stored in batch {
            stored.validate()?;
            let hash = stored.hash();

            if let Some(dir_seal) = &stored.dir {
                loaded.dirs.push(Dir {
                    path: stored.path.clone().into(),
                    depth: 0,
                    seal: Some(dir_seal.clone()),
                    quick_diff: None,
                    hash_diff: None,
                });
            }

            last_hash = hash.to_vec();
            loaded.by_hash.insert(hash, stored.clone());
            loaded.by_path.insert(stored.path.clone(), stored);
        }

        if batch_len < BATCH {
            break;
        }
    }

    Ok(loaded)
}
