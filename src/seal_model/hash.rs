//! File-content SHA-256 hashing: a buffered read loop returning raw bytes
//! rather than a hex string, since the wire format here is base64 (see
//! `seal_model::codec`).

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use super::codec::Sha256Bytes;

const BUFFER_SIZE: usize = 8192;

/// Hashes the contents of a regular file in fixed-size chunks.
pub fn hash_file(path: &Path) -> io::Result<Sha256Bytes> {
    let mut file = File::open(path)?;
    hash_reader(&mut file)
}

pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<Sha256Bytes> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn hashes_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let hash = hash_file(file.path()).unwrap();
        let expected: Sha256Bytes = Sha256::new().finalize().into();
        assert_eq!(hash, expected);
    }

    #[test]
    fn hashes_known_content() {
        let mut file = NamedTempFile::new().unwrap();
        use std::io::Write;
        file.write_all(b"hello world").unwrap();
        let hash = hash_file(file.path()).unwrap();

        let mut hasher = Sha256::new();
        hasher.update(b"hello world");
        let expected: Sha256Bytes = hasher.finalize().into();
        assert_eq!(hash, expected);
    }
}
