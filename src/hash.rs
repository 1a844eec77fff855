//! Artifact content hashing.
//!
//! Payloads and containers are identified by SHA-256 content hashes; the
//! manifests embed them and the engine verifies them at install time.

use crate::error::{ErrorExt, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Hashes a file, returning its size and hex-encoded SHA-256.
///
/// Reads in 8KB chunks so large payloads never load fully into memory.
pub fn sha256_file(path: &Path) -> Result<(u64, String)> {
    let mut file = File::open(path).fs_context("opening file for hashing", path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];
    let mut size = 0u64;

    loop {
        let n = file
            .read(&mut buffer)
            .fs_context("reading file for hash calculation", path)?;
        if n == 0 {
            break;
        }
        size += n as u64;
        hasher.update(&buffer[..n]);
    }

    Ok((size, hex::encode(hasher.finalize())))
}

/// Hashes a byte slice, returning its hex-encoded SHA-256.
pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_and_slice_hashes_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let data = b"deterministic bytes";
        std::fs::File::create(&path)
            .unwrap()
            .write_all(data)
            .unwrap();

        let (size, hash) = sha256_file(&path).unwrap();
        assert_eq!(data.len() as u64, size);
        assert_eq!(sha256_bytes(data), hash);
        assert_eq!(64, hash.len());
    }
}
