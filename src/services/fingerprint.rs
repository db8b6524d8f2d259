//! Content fingerprinting
//!
//! A fingerprint identifies file content independent of path or mtime, so
//! renamed copies of the same video land on the same value. Hashing whole
//! multi-gigabyte files on every scan is too slow, so the fingerprint is a
//! SHA-256 over the file size plus a head and tail sample:
//!
//!   sha256(size_as_decimal || first 64 KiB || last 64 KiB)
//!
//! Files small enough that the samples overlap are hashed in full. The
//! policy is part of the catalog contract: changing it orphans stored
//! fingerprints, so it stays fixed.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Bytes sampled from each end of the file
const SAMPLE_SIZE: u64 = 64 * 1024;

/// Compute the content fingerprint of a file.
///
/// Blocking; callers on the async runtime run this under spawn_blocking.
pub fn compute_fingerprint(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    let mut hasher = Sha256::new();
    hasher.update(size.to_string().as_bytes());

    if size <= SAMPLE_SIZE * 2 {
        let mut contents = Vec::with_capacity(size as usize);
        file.read_to_end(&mut contents)?;
        hasher.update(&contents);
    } else {
        let mut sample = vec![0u8; SAMPLE_SIZE as usize];
        file.read_exact(&mut sample)?;
        hasher.update(&sample);

        file.seek(SeekFrom::End(-(SAMPLE_SIZE as i64)))?;
        file.read_exact(&mut sample)?;
        hasher.update(&sample);
    }

    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}
