//! Per-account mutation locks.
//!
//! Mutations of one account (state flips, profile and password updates) take
//! that account's lock, so they apply one at a time. Accounts never share a
//! lock, so work on different accounts does not wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use warden_core::UserId;

use crate::deadline::Deadline;
use crate::error::AuthError;

/// Held while mutating one account; released on drop.
pub type AccountGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct AccountLocks {
    inner: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: UserId, deadline: Deadline) -> Result<AccountGuard, AuthError> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only referenced by the map have no holder or waiter.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(id).or_default().clone()
        };
        deadline.run("account_lock", lock.lock_owned()).await
    }

    /// Number of accounts with a holder or waiter (plus not-yet-pruned entries).
    pub fn tracked(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_account_waits_for_the_holder() {
        let locks = AccountLocks::new();
        let id = UserId::new();

        let _held = locks.acquire(id, Deadline::none()).await.unwrap();
        let err = locks
            .acquire(id, Deadline::within(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Timeout("account_lock"));
    }

    #[tokio::test]
    async fn different_accounts_do_not_contend() {
        let locks = AccountLocks::new();

        let _a = locks.acquire(UserId::new(), Deadline::none()).await.unwrap();
        let b = locks
            .acquire(UserId::new(), Deadline::within(Duration::from_millis(20)))
            .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = AccountLocks::new();
        for _ in 0..10 {
            let guard = locks.acquire(UserId::new(), Deadline::none()).await.unwrap();
            drop(guard);
        }
        let _last = locks.acquire(UserId::new(), Deadline::none()).await.unwrap();
        assert_eq!(locks.tracked(), 1);
    }
}
