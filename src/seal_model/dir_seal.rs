use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::codec::{self, Sha256Bytes};
use super::file_entry::FileEntry;

/// Manifest for one directory — the in-memory (and on-disk, via serde) form
/// of `_seal.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirSeal {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "TotalSize")]
    pub total_size: u64,
    #[serde(rename = "SHA256", with = "codec")]
    pub sha256: Sha256Bytes,
    #[serde(rename = "Modified", with = "codec::rfc3339")]
    pub modified: DateTime<Utc>,
    #[serde(rename = "Sealed", with = "codec::rfc3339")]
    pub sealed_at: DateTime<Utc>,
    #[serde(rename = "Files")]
    pub files: Vec<FileEntry>,
}

impl DirSeal {
    /// Sorts `files` ascending by name, byte-wise. Stable and idempotent.
    pub fn sort_files(&mut self) {
        self.files.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    }

    /// Recomputes `total_size` as the sum of `size` over live entries.
    pub fn recompute_total_size(&mut self) {
        self.total_size = self.files.iter().filter(|f| f.is_live()).map(|f| f.size).sum();
    }

    /// Derives the directory hash: feeds big-endian 8-byte size then
    /// 32-byte sha256 for every live entry, in sorted order, into a single
    /// SHA-256.
    ///
    /// Assumes `files` is already sorted; callers must `sort_files()` first.
    pub fn derive_hash(&self) -> Sha256Bytes {
        let mut hasher = Sha256::new();
        for entry in self.files.iter().filter(|f| f.is_live()) {
            hasher.update(entry.size.to_be_bytes());
            hasher.update(entry.sha256);
        }
        hasher.finalize().into()
    }

    /// Sorts files, recomputes `total_size`, and assigns `sha256` from the
    /// derivation above. Call this as the final step before serializing.
    pub fn finalize(&mut self) {
        self.sort_files();
        self.recompute_total_size();
        self.sha256 = self.derive_hash();
    }
}

/// Serializes `seal` as tab-indented pretty JSON, matching the original
/// tool's human-diffable on-disk format.
pub fn to_pretty_json(seal: &DirSeal) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    seal.serialize(&mut ser)?;
    Ok(String::from_utf8(buf).expect("json output is always valid utf8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, size: u64, sha: u8) -> FileEntry {
        FileEntry {
            old_version: false,
            deleted: false,
            name: name.to_string(),
            is_dir: false,
            size,
            sha256: [sha; 32],
            modified: Utc::now(),
            sealed_at: Utc::now(),
        }
    }

    fn empty_seal(name: &str) -> DirSeal {
        DirSeal {
            name: name.to_string(),
            total_size: 0,
            sha256: [0u8; 32],
            modified: Utc::now(),
            sealed_at: Utc::now(),
            files: Vec::new(),
        }
    }

    #[test]
    fn finalize_sorts_sums_and_hashes() {
        let mut seal = empty_seal("testdir");
        seal.files = vec![entry("b.txt", 10, 2), entry("a.txt", 5, 1)];
        seal.finalize();

        assert_eq!(seal.files[0].name, "a.txt");
        assert_eq!(seal.files[1].name, "b.txt");
        assert_eq!(seal.total_size, 15);
        assert_eq!(seal.sha256, seal.derive_hash());
    }

    #[test]
    fn historical_entries_excluded_from_size_and_hash() {
        let mut seal = empty_seal("testdir");
        let live = entry("a.txt", 5, 1);
        let dead = entry("b.txt", 10, 2).into_deleted();
        seal.files = vec![live.clone(), dead];
        seal.finalize();

        assert_eq!(seal.total_size, 5);

        let mut hasher = Sha256::new();
        hasher.update(live.size.to_be_bytes());
        hasher.update(live.sha256);
        let expected: Sha256Bytes = hasher.finalize().into();
        assert_eq!(seal.sha256, expected);
    }

    #[test]
    fn hash_is_deterministic_and_idempotent() {
        let mut seal = empty_seal("testdir");
        seal.files = vec![entry("a.txt", 5, 1), entry("b.txt", 10, 2)];
        seal.finalize();
        let first = seal.sha256;
        seal.finalize();
        assert_eq!(seal.sha256, first);
    }

    #[test]
    fn pretty_json_uses_tab_indent() {
        let mut seal = empty_seal("testdir");
        seal.files = vec![entry("a.txt", 5, 1)];
        seal.finalize();
        let json = to_pretty_json(&seal).unwrap();
        assert!(json.contains("\n\t\"TotalSize\""));
    }

    #[test]
    fn roundtrips_through_json() {
        let mut seal = empty_seal("testdir");
        seal.files = vec![entry("a.txt", 5, 1)];
        seal.finalize();
        let json = to_pretty_json(&seal).unwrap();
        let back: DirSeal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, seal);
    }
}
