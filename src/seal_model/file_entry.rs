use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::codec::{self, Sha256Bytes};

/// One entry inside a sealed directory — either a file or a subdirectory.
///
/// `deleted` and `old_version` are never both true; an entry with either set
/// is "historical" and is excluded from hashing and from `total_size`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "OldVersion", default, skip_serializing_if = "is_false")]
    pub old_version: bool,
    #[serde(rename = "Deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "IsDir", default, skip_serializing_if = "is_false")]
    pub is_dir: bool,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "SHA256", with = "codec")]
    pub sha256: Sha256Bytes,
    #[serde(rename = "Modified", with = "codec::rfc3339")]
    pub modified: DateTime<Utc>,
    #[serde(rename = "Sealed", with = "codec::rfc3339")]
    pub sealed_at: DateTime<Utc>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl FileEntry {
    /// A live entry contributes to its parent's aggregate size and hash.
    pub fn is_live(&self) -> bool {
        !self.deleted && !self.old_version
    }

    /// Marks this entry as carried-forward history: the file that used to
    /// be live at `name` but is no longer present on disk.
    pub fn into_deleted(mut self) -> Self {
        self.deleted = true;
        self.old_version = false;
        self
    }

    /// Marks this entry as a superseded version of a file that is still
    /// live under the same name, but with different content/metadata.
    pub fn into_old_version(mut self) -> Self {
        self.old_version = true;
        self.deleted = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileEntry {
        FileEntry {
            old_version: false,
            deleted: false,
            name: "a.txt".to_string(),
            is_dir: false,
            size: 2656,
            sha256: [1u8; 32],
            modified: Utc::now(),
            sealed_at: Utc::now(),
        }
    }

    #[test]
    fn history_flags_omitted_when_false() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(!json.contains("OldVersion"));
        assert!(!json.contains("Deleted"));
    }

    #[test]
    fn history_flags_present_when_true() {
        let entry = sample().into_deleted();
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"Deleted\":true"));
        assert!(!entry.is_live());
    }

    #[test]
    fn roundtrips_through_json() {
        let entry = sample();
        let json = serde_json::to_string(&entry).unwrap();
        let back: FileEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn deleted_and_old_version_are_mutually_exclusive_by_construction() {
        let entry = sample().into_old_version().into_deleted();
        assert!(entry.deleted);
        assert!(!entry.old_version);
    }
}
