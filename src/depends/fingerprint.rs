//! Content fingerprints for installed files.
//!
//! Purely diagnostic: a file that cannot be hashed is logged and skipped,
//! installation carries on.

use crate::core::output;
use crate::helpers::internal::hash::{HashAlgorithm, hash_file};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub path: PathBuf,
    pub algorithm: HashAlgorithm,
    pub digest: String,
}

#[derive(Debug, Clone, Copy)]
pub struct FingerprintRecorder {
    algorithm: HashAlgorithm,
}

impl Default for FingerprintRecorder {
    fn default() -> Self {
        Self::new(HashAlgorithm::Sha256)
    }
}

impl FingerprintRecorder {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn record(&self, path: &Path) -> Option<Fingerprint> {
        match hash_file(path, self.algorithm) {
            Ok(digest) => {
                output::detail(&format!(
                    "{} {} {}",
                    self.algorithm.name().to_lowercase(),
                    &digest[..digest.len().min(16)],
                    path.display()
                ));
                Some(Fingerprint {
                    path: path.to_path_buf(),
                    algorithm: self.algorithm,
                    digest,
                })
            }
            Err(e) => {
                output::warning(&format!("cannot fingerprint {}: {}", path.display(), e));
                None
            }
        }
    }
}
