//! Single-file B-tree storage backend, single-writer transactional, via
//! `redb`'s `TableDefinition` / `begin_write` / `open_table` / `commit`.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{record_put, stored_seals_for_dir, StorageBackend, StorageError, StoredSeal};
use crate::scan::Dir;

const HASHES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("hashes");
const PATHS: TableDefinition<&str, &[u8]> = TableDefinition::new("paths");

pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = Database::create(path).map_err(|e| StorageError::BackendIoFailed(e.to_string()))?;
        {
            let write_txn = db.begin_write().map_err(to_storage_error)?;
            {
                let _ = write_txn.open_table(HASHES).map_err(to_storage_error)?;
                let _ = write_txn.open_table(PATHS).map_err(to_storage_error)?;
            }
            write_txn.commit().map_err(to_storage_error)?;
        }
        Ok(Self { db })
    }
}

impl StorageBackend for RedbBackend {
    fn add_dir(&mut self, dir: &Dir, base_path: &Path) -> Result<(), StorageError> {
        let entries = stored_seals_for_dir(dir, base_path)?;
        let write_txn = self.db.begin_write().map_err(to_storage_error)?;
        {
            let mut hashes = write_txn.open_table(HASHES).map_err(to_storage_error)?;
            let mut paths = write_txn.open_table(PATHS).map_err(to_storage_error)?;
            for (_path, seal) in &entries {
                let hash = seal.hash();
                let json =
                    serde_json::to_vec(seal).map_err(|e| StorageError::BackendIoFailed(e.to_string()))?;
                hashes.insert(hash.as_slice(), json.as_slice()).map_err(to_storage_error)?;
                paths.insert(seal.path.as_str(), hash.as_slice()).map_err(to_storage_error)?;
                record_put();
            }
        }
        write_txn.commit().map_err(to_storage_error)?;
        Ok(())
    }

    fn load_after_hash(&mut self, hash: &[u8], count: usize) -> Result<Vec<StoredSeal>, StorageError> {
        let read_txn = self.db.begin_read().map_err(to_storage_error)?;
        let table = read_txn.open_table(HASHES).map_err(to_storage_error)?;

        let mut out = Vec::new();
        for item in table.iter().map_err(to_storage_error)? {
            let (key, value) = item.map_err(to_storage_error)?;
            let key_bytes = key.value();
            if !hash.is_empty() && key_bytes <= hash {
                continue;
            }
            let seal: StoredSeal =
                serde_json::from_slice(value.value()).map_err(|e| StorageError::BackendIoFailed(e.to_string()))?;
            out.push(seal);
            if out.len() >= count {
                break;
            }
        }
        Ok(out)
    }

    fn close(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}

fn to_storage_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::BackendIoFailed(e.to_string())
}
