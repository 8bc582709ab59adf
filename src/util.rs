use anyhow::{Context, Result};
use sha2::Digest;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Streaming sha256 of a file; artifacts can be multi-gigabyte so the content
/// is never held in memory at once.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("open {} for hashing", path.display()))?;
    let mut hasher = sha2::Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buffer)
            .with_context(|| format!("read {} while hashing", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn now_epoch_ms() -> Result<u128> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before epoch")?;
    Ok(now.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_file_matches_in_memory_digest() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("blob.bin");
        let content = b"paired-end reads".repeat(10_000);
        std::fs::write(&path, &content).expect("write blob");

        let from_file = sha256_file(&path).expect("hash file");
        assert_eq!(from_file, sha256_hex(&content));
    }

    #[test]
    fn sha256_file_missing_path_errors() {
        let dir = tempfile::tempdir().expect("create temp dir");
        assert!(sha256_file(&dir.path().join("absent")).is_err());
    }
}
