//! Log-structured (LSM-style) embedded KV storage backend with batched
//! writes and ordered scans, keyed the same batched-write, prefix-keyed
//! way the other backends in this module are.

use std::path::Path;

use sled::{Batch, Db};

use super::{record_put, stored_seals_for_dir, StorageBackend, StorageError, StoredSeal};
use crate::scan::Dir;

const HASH_PREFIX: &[u8] = b"hashes/";
const PATH_PREFIX: &[u8] = b"paths/";

pub struct SledBackend {
    db: Db,
}

impl SledBackend {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(to_storage_error)?;
        Ok(Self { db })
    }
}

fn hash_key(hash: &[u8]) -> Vec<u8> {
    [HASH_PREFIX, hash].concat()
}

fn path_key(path: &str) -> Vec<u8> {
    [PATH_PREFIX, path.as_bytes()].concat()
}

impl StorageBackend for SledBackend {
    fn add_dir(&mut self, dir: &Dir, base_path: &Path) -> Result<(), StorageError> {
        let entries = stored_seals_for_dir(dir, base_path)?;
        let mut batch = Batch::default();
        for (_path, seal) in &entries {
            let hash = seal.hash();
            let json = serde_json::to_vec(seal).map_err(|e| StorageError::BackendIoFailed(e.to_string()))?;
            batch.insert(hash_key(&hash), json);
            batch.insert(path_key(&seal.path), hash.to_vec());
            record_put();
        }
        self.db.apply_batch(batch).map_err(to_storage_error)?;
        Ok(())
    }

    fn load_after_hash(&mut self, hash: &[u8], count: usize) -> Result<Vec<StoredSeal>, StorageError> {
        let lower = hash_key(hash);

        let mut out = Vec::new();
        for item in self.db.range(lower..) {
            let (key, value) = item.map_err(to_storage_error)?;
            if !key.starts_with(HASH_PREFIX) {
                break;
            }
            // `range` includes a key equal to the cursor; only keys strictly
            // greater than `hash` satisfy the contract, so skip an exact
            // match rather than assuming one exists.
            if !hash.is_empty() && &key[HASH_PREFIX.len()..] == hash {
                continue;
            }
            let seal: StoredSeal =
                serde_json::from_slice(&value).map_err(|e| StorageError::BackendIoFailed(e.to_string()))?;
            out.push(seal);
            if out.len() >= count {
                break;
            }
        }
        Ok(out)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_error)?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_error)?;
        Ok(())
    }
}

fn to_storage_error(e: sled::Error) -> StorageError {
    StorageError::BackendIoFailed(e.to_string())
}
