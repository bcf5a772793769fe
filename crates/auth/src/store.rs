//! Persistence contract for accounts and the records they own.
//!
//! The engine behind it is external; `warden-infra` ships an in-memory one.

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use warden_core::UserId;

use crate::deadline::Deadline;
use crate::error::AuthError;
use crate::{ProjectMembership, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// A record owned by the target account could not be written. The whole
    /// change was rolled back.
    #[error("dependent record write failed: {0}")]
    DependentWrite(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Active-state flip for one account and everything it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub user_id: UserId,
    pub deactivate: bool,
    /// Timestamp applied to records that are not already deactivated.
    pub at: DateTime<Utc>,
}

impl StateChange {
    /// The `deactivated_at` a record should carry after this change.
    pub fn apply_to(&self, current: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        if self.deactivate {
            Some(current.unwrap_or(self.at))
        } else {
            None
        }
    }
}

/// Outcome of a committed [`StateChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChangeReceipt {
    pub user_id: UserId,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub dependents_updated: usize,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new account. `DuplicateKey` if the username is taken.
    async fn create(&self, user: User) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<User, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<User, StoreError>;

    /// Replace an existing account. `NotFound` if absent.
    async fn update(&self, user: &User) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<User>, StoreError>;

    async fn list_memberships(&self, user_id: UserId) -> Result<Vec<ProjectMembership>, StoreError>;

    /// Apply `change` to the account and all of its memberships atomically.
    ///
    /// Readers observe either none or all of the writes. `NotFound` if the
    /// account is absent; `DependentWrite` if a membership write failed, in
    /// which case nothing was changed.
    async fn apply_state_change(&self, change: &StateChange) -> Result<StateChangeReceipt, StoreError>;
}

/// Run a store call under `deadline` and fold both failure layers into `AuthError`.
pub(crate) async fn store_call<T, F>(deadline: Deadline, op: &'static str, fut: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    Ok(deadline.run(op, fut).await??)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn deactivation_keeps_the_first_timestamp() {
        let now = Utc::now();
        let earlier = now - Duration::days(3);
        let change = StateChange {
            user_id: UserId::new(),
            deactivate: true,
            at: now,
        };

        assert_eq!(change.apply_to(None), Some(now));
        assert_eq!(change.apply_to(Some(earlier)), Some(earlier));
    }

    #[test]
    fn reactivation_clears_the_timestamp() {
        let change = StateChange {
            user_id: UserId::new(),
            deactivate: false,
            at: Utc::now(),
        };
        assert_eq!(change.apply_to(Some(Utc::now())), None);
    }
}
