//! Adaptive password hashing (bcrypt).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest and highest work factors bcrypt accepts.
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashingError {
    #[error("hash cost {0} outside {MIN_COST}..={MAX_COST}")]
    InvalidCost(u32),

    #[error("hashing failed: {0}")]
    Algorithm(String),

    /// The stored digest is not a parseable bcrypt hash.
    #[error("malformed password digest: {0}")]
    MalformedDigest(String),

    #[error("hashing worker failed: {0}")]
    Worker(String),
}

/// A one-way password digest.
///
/// `Debug` is redacted so digests never end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    /// Wrap a digest read back from storage.
    pub fn from_stored(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordDigest(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, HashingError> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(HashingError::InvalidCost(cost));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn hash(&self, plaintext: &str) -> Result<PasswordDigest, HashingError> {
        bcrypt::hash(plaintext, self.cost)
            .map(PasswordDigest)
            .map_err(|e| HashingError::Algorithm(e.to_string()))
    }

    /// Check `plaintext` against `digest`.
    ///
    /// A wrong password is `Ok(false)`; only an unreadable digest is an error.
    /// bcrypt compares the derived hashes in constant time.
    pub fn verify(&self, digest: &PasswordDigest, plaintext: &str) -> Result<bool, HashingError> {
        bcrypt::verify(plaintext, digest.as_str())
            .map_err(|e| HashingError::MalformedDigest(e.to_string()))
    }

    /// [`hash`](Self::hash) on the blocking pool so slow work factors do not
    /// stall the async executor.
    pub async fn hash_offloaded(&self, plaintext: String) -> Result<PasswordDigest, HashingError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| HashingError::Worker(e.to_string()))?
    }

    pub async fn verify_offloaded(
        &self,
        digest: PasswordDigest,
        plaintext: String,
    ) -> Result<bool, HashingError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.verify(&digest, &plaintext))
            .await
            .map_err(|e| HashingError::Worker(e.to_string()))?
    }
}
