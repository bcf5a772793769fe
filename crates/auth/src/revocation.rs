//! Revocation record for session tokens.
//!
//! Only `(token id, natural expiry)` pairs are kept. An entry is useless once
//! its token would have expired anyway, so stores purge those and stay bounded
//! by the number of live revoked tokens.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use thiserror::Error;

use warden_core::TokenId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RevocationError {
    #[error("revocation storage error: {0}")]
    Storage(String),
}

pub trait RevocationStore: Send + Sync + core::fmt::Debug {
    /// Record `id` as revoked until `expires_at`.
    ///
    /// Must be visible to every `is_revoked` call that starts after this returns.
    fn revoke(
        &self,
        id: TokenId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RevocationError>;

    fn is_revoked(&self, id: &TokenId) -> Result<bool, RevocationError>;

    /// Drop entries whose token has expired. Returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, RevocationError>;
}

#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    entries: RwLock<HashMap<TokenId, DateTime<Utc>>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RevocationStore for InMemoryRevocationStore {
    fn revoke(
        &self,
        id: TokenId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RevocationError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RevocationError::Storage("lock poisoned".to_string()))?;

        entries.retain(|_, exp| *exp > now);
        if expires_at > now {
            entries.insert(id, expires_at);
        }
        Ok(())
    }

    fn is_revoked(&self, id: &TokenId) -> Result<bool, RevocationError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RevocationError::Storage("lock poisoned".to_string()))?;
        Ok(entries.contains_key(id))
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, RevocationError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RevocationError::Storage("lock poisoned".to_string()))?;
        let before = entries.len();
        entries.retain(|_, exp| *exp > now);
        Ok(before - entries.len())
    }
}
