//! In-memory representation of a directory seal, its sorting/hashing
//! discipline, and the on-disk manifest serialization (`_seal.json`).

pub mod codec;
pub mod dir_seal;
pub mod file_entry;
pub mod hash;

pub use codec::Sha256Bytes;
pub use dir_seal::{to_pretty_json, DirSeal};
pub use file_entry::FileEntry;

/// Filename of the sidecar manifest placed in every sealed directory.
pub const MANIFEST_FILENAME: &str = "_seal.json";

/// Non-manifest files that are never treated as sealed children.
pub const IGNORED_FILENAMES: &[&str] = &[MANIFEST_FILENAME, ".DS_Store"];
