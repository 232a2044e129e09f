//! Content hashing for exact-duplicate detection.

use std::fs;
use std::path::Path;

use crate::Result;

/// Computes stable BLAKE3 content digests for files and byte slices
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl ContentHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash a byte slice into a hex digest
    pub fn hash_bytes(&self, bytes: &[u8]) -> String {
        hex::encode(blake3::hash(bytes).as_bytes())
    }

    /// Hash a file's full content into a hex digest.
    ///
    /// Propagates read failures; callers skip the file and record a warning
    /// rather than treating this as fatal.
    pub fn hash_file(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path)?;
        Ok(self.hash_bytes(&bytes))
    }
}
