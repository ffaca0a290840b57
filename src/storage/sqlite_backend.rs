//! Relational storage backend: a single SQLite database file with table
//! `seals(hash TEXT PRIMARY KEY, path TEXT, json BLOB)` and an index on
//! `path`, via `rusqlite` with the bundled SQLite build.

use std::path::Path;

use rusqlite::{params, Connection};

use super::{record_put, stored_seals_for_dir, StorageBackend, StorageError, StoredSeal};
use crate::scan::Dir;
use crate::seal_model::codec;

pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(to_storage_error)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS seals (
                hash TEXT PRIMARY KEY,
                path TEXT NOT NULL,
                json BLOB NOT NULL
            );
            CREATE INDEX IF NOT EXISTS seals_path_idx ON seals(path);",
        )
        .map_err(to_storage_error)?;
        Ok(Self { conn })
    }
}

impl StorageBackend for SqliteBackend {
    fn add_dir(&mut self, dir: &Dir, base_path: &Path) -> Result<(), StorageError> {
        let entries = stored_seals_for_dir(dir, base_path)?;
        let tx = self.conn.transaction().map_err(to_storage_error)?;
        for (_path, seal) in &entries {
            let hash = codec::encode(&seal.hash());
            let json = serde_json::to_vec(seal)
                .map_err(|e| StorageError::BackendIoFailed(e.to_string()))?;
            tx.execute(
                "INSERT INTO seals (hash, path, json) VALUES (?1, ?2, ?3)
                 ON CONFLICT(hash) DO UPDATE SET path = excluded.path, json = excluded.json",
                params![hash, seal.path, json],
            )
            .map_err(to_storage_error)?;
            record_put();
        }
        tx.commit().map_err(to_storage_error)?;
        Ok(())
    }

    fn load_after_hash(&mut self, hash: &[u8], count: usize) -> Result<Vec<StoredSeal>, StorageError> {
        // Base64 of a fixed-length (32-byte) input is itself fixed-length,
        // so lexical TEXT ordering over `hash` matches byte ordering of the
        // underlying digest.
        let cursor = if hash.is_empty() {
            String::new()
        } else {
            codec::encode(hash.try_into().map_err(|_| {
                StorageError::BackendIoFailed("load_after_hash requires a 32-byte hash cursor".into())
            })?)
        };

        let mut stmt = self
            .conn
            .prepare("SELECT json FROM seals WHERE hash > ?1 ORDER BY hash ASC LIMIT ?2")
            .map_err(to_storage_error)?;
        let rows = stmt
            .query_map(params![cursor, count as i64], |row| {
                let json: Vec<u8> = row.get(0)?;
                Ok(json)
            })
            .map_err(to_storage_error)?;

        let mut out = Vec::new();
        for row in rows {
            let json = row.map_err(to_storage_error)?;
            let seal: StoredSeal =
                serde_json::from_slice(&json).map_err(|e| StorageError::BackendIoFailed(e.to_string()))?;
            out.push(seal);
        }
        Ok(out)
    }

    fn close(self: Box<Self>) -> Result<(), StorageError> {
        self.conn.close().map_err(|(_, e)| to_storage_error(e))
    }
}

fn to_storage_error(e: rusqlite::Error) -> StorageError {
    StorageError::BackendIoFailed(e.to_string())
}
