//! Streaming file hashing for install fingerprints
//!
//! Supports SHA256, SHA512 and BLAKE3.

use std::io::Read;
use std::path::Path;

/// Chunk size for reading files during hashing (1MB)
const CHUNK_SIZE: usize = 1024 * 1024;

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    Blake3,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
            Self::Blake3 => "BLAKE3",
        }
    }

    /// Parse a configuration value such as `"sha256"` or `"BLAKE3"`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Some(Self::Sha256),
            "sha512" | "sha-512" => Some(Self::Sha512),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }
}

/// Hash a file's content, returning the lowercase hex digest.
pub fn hash_file(file: &Path, algorithm: HashAlgorithm) -> std::io::Result<String> {
    let mut f = std::fs::File::open(file)?;
    match algorithm {
        HashAlgorithm::Sha256 => hash_digest::<sha2::Sha256>(&mut f),
        HashAlgorithm::Sha512 => hash_digest::<sha2::Sha512>(&mut f),
        HashAlgorithm::Blake3 => hash_blake3(&mut f),
    }
}

/// Compute hash using sha2 crate (SHA256/SHA512)
fn hash_digest<D: sha2::Digest>(reader: &mut impl Read) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute BLAKE3 hash (separate implementation due to different API)
fn hash_blake3(reader: &mut impl Read) -> std::io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
