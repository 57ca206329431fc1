//! Configuration hashing for change detection.
//!
//! Hashes are computed over the canonical JSON form of a resolved stack, so
//! any change to a resolved value changes the hash.

use sha2::{Digest, Sha256};

use crate::error::ProviderError;

use super::types::DesiredStack;

/// Hasher for resolved stack configurations.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the hash of a resolved stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn hash_stack(&self, stack: &DesiredStack) -> Result<String, ProviderError> {
        // Object keys are sorted by serde_json's default map, which makes this canonical.
        let bytes = serde_json::to_vec(stack).map_err(|e| {
            ProviderError::serialization(format!("Failed to serialize stack '{}': {e}", stack.name))
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// First 8 characters of a hash, for display.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes in constant time.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
