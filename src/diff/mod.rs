//! Structural diff between two `DirSeal`s: a BTreeMap-by-name join that
//! classifies files as added, missing, or changed, with hash comparison
//! forced to match whenever `check_hash` is false.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::seal_model::{DirSeal, FileEntry};

/// Per-file difference record when a file exists on both sides but differs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDiff {
    pub want: FileEntry,
    pub have: FileEntry,
    pub is_dir_matches: bool,
    pub size_matches: bool,
    pub modified_matches: bool,
    pub sha256_matches: bool,
}

impl FileDiff {
    fn all_match(&self) -> bool {
        self.is_dir_matches && self.size_matches && self.modified_matches && self.sha256_matches
    }
}

/// Structural diff between a `want` (baseline) and `have` (current) seal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diff {
    pub identical: bool,
    pub hash_checked: bool,
    pub name_matches: bool,
    pub total_size_matches: bool,
    pub modified_matches: bool,
    pub sha256_matches: bool,
    pub files_added: Vec<FileEntry>,
    pub files_missing: Vec<FileEntry>,
    pub files_changed: Vec<FileDiff>,
}

/// Compares `want` against `have`. When `check_hash` is false, per-file
/// `sha256_matches` is forced to true (content is assumed unchanged).
pub fn diff(want: &DirSeal, have: &DirSeal, check_hash: bool) -> Diff {
    let want_live: BTreeMap<&str, &FileEntry> = want
        .files
        .iter()
        .filter(|f| f.is_live())
        .map(|f| (f.name.as_str(), f))
        .collect();
    let have_live: BTreeMap<&str, &FileEntry> = have
        .files
        .iter()
        .filter(|f| f.is_live())
        .map(|f| (f.name.as_str(), f))
        .collect();

    let mut files_added = Vec::new();
    let mut files_missing = Vec::new();
    let mut files_changed = Vec::new();

    for (name, want_entry) in &want_live {
        match have_live.get(name) {
            None => files_missing.push((*want_entry).clone()),
            Some(have_entry) => {
                let sha256_matches = if check_hash {
                    want_entry.sha256 == have_entry.sha256
                } else {
                    true
                };
                let file_diff = FileDiff {
                    want: (*want_entry).clone(),
                    have: (*have_entry).clone(),
                    is_dir_matches: want_entry.is_dir == have_entry.is_dir,
                    size_matches: want_entry.size == have_entry.size,
                    modified_matches: want_entry.modified == have_entry.modified,
                    sha256_matches,
                };
                if !file_diff.all_match() {
                    files_changed.push(file_diff);
                }
            }
        }
    }

    for (name, have_entry) in &have_live {
        if !want_live.contains_key(name) {
            files_added.push((*have_entry).clone());
        }
    }

    let name_matches = want.name == have.name;
    let total_size_matches = want.total_size == have.total_size;
    let modified_matches = want.modified == have.modified;
    let sha256_matches = if check_hash {
        want.sha256 == have.sha256
    } else {
        true
    };

    let identical = name_matches
        && total_size_matches
        && modified_matches
        && sha256_matches
        && files_added.is_empty()
        && files_missing.is_empty()
        && files_changed.is_empty();

    Diff {
        identical,
        hash_checked: check_hash,
        name_matches,
        total_size_matches,
        modified_matches,
        sha256_matches,
        files_added,
        files_missing,
        files_changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

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

    fn seal(name: &str, files: Vec<FileEntry>) -> DirSeal {
        let mut s = DirSeal {
            name: name.to_string(),
            total_size: 0,
            sha256: [0u8; 32],
            modified: Utc::now(),
            sealed_at: Utc::now(),
            files,
        };
        s.finalize();
        s
    }

    #[test]
    fn identical_seals_produce_identical_diff() {
        let s = seal("d", vec![entry("a.txt", 5, 1)]);
        let d = diff(&s, &s, true);
        assert!(d.identical);
        assert!(d.files_added.is_empty());
        assert!(d.files_missing.is_empty());
        assert!(d.files_changed.is_empty());
    }

    #[test]
    fn added_and_missing_files_detected() {
        let want = seal("d", vec![entry("a.txt", 5, 1), entry("gone.txt", 1, 9)]);
        let have = seal("d", vec![entry("a.txt", 5, 1), entry("new.txt", 2, 8)]);
        let d = diff(&want, &have, true);
        assert!(!d.identical);
        assert_eq!(d.files_added.len(), 1);
        assert_eq!(d.files_added[0].name, "new.txt");
        assert_eq!(d.files_missing.len(), 1);
        assert_eq!(d.files_missing[0].name, "gone.txt");
    }

    #[test]
    fn changed_hash_detected_when_check_hash_true() {
        let want = seal("d", vec![entry("a.txt", 5, 1)]);
        let have = seal("d", vec![entry("a.txt", 5, 9)]);
        let d = diff(&want, &have, true);
        assert_eq!(d.files_changed.len(), 1);
        assert!(!d.files_changed[0].sha256_matches);
    }

    #[test]
    fn hash_mismatch_ignored_when_check_hash_false() {
        let want = seal("d", vec![entry("a.txt", 5, 1)]);
        let have = seal("d", vec![entry("a.txt", 5, 9)]);
        let d = diff(&want, &have, false);
        assert!(d.files_changed.is_empty());
        assert!(d.identical);
    }

    #[test]
    fn historical_entries_excluded_from_join() {
        let want = seal("d", vec![entry("a.txt", 5, 1).into_deleted()]);
        let have = seal("d", vec![]);
        let d = diff(&want, &have, true);
        assert!(d.files_missing.is_empty());
    }

    #[test]
    fn diff_is_idempotent() {
        let s = seal("d", vec![entry("a.txt", 5, 1)]);
        assert!(diff(&s, &s, true).identical);
    }

    #[test]
    fn symmetric_identical_result() {
        let a = seal("d", vec![entry("a.txt", 5, 1)]);
        let b = seal("d", vec![entry("a.txt", 5, 1)]);
        assert_eq!(diff(&a, &b, true).identical, diff(&b, &a, true).identical);
    }
}
