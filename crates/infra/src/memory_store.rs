//! In-memory `UserStore` for tests and dev.
//!
//! All tables sit behind one `RwLock`, so a state change holds the write lock
//! for the account row and every membership row at once. Readers never see a
//! half-applied change. Dependent writes are recorded in an undo log and
//! replayed backwards if one of them fails.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use warden_auth::{
    ProjectMembership, StateChange, StateChangeReceipt, StoreError, User, UserStore,
};
use warden_core::{ProjectId, UserId};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    usernames: HashMap<String, UserId>,
    memberships: HashMap<UserId, Vec<ProjectMembership>>,
}

#[derive(Debug, Default)]
struct Faults {
    /// Fail a state change once this many dependent writes have landed.
    dependent_write_after: Option<usize>,
    latency: Option<Duration>,
    unavailable: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    tables: RwLock<Tables>,
    faults: Mutex<Faults>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a membership to an existing account. It starts in the owner's
    /// current activation state.
    pub fn add_membership(
        &self,
        project_id: ProjectId,
        user_id: UserId,
        role: impl Into<String>,
    ) -> Result<ProjectMembership, StoreError> {
        let mut tables = self.write()?;
        let owner = tables.users.get(&user_id).ok_or(StoreError::NotFound)?;
        let membership = ProjectMembership {
            project_id,
            user_id,
            role: role.into(),
            deactivated_at: owner.deactivated_at,
        };
        tables
            .memberships
            .entry(user_id)
            .or_default()
            .push(membership.clone());
        Ok(membership)
    }

    /// Make the next state change fail after `writes` dependent records were
    /// written. `0` fails right after the account row. One-shot.
    pub fn fail_next_state_change_after(&self, writes: usize) {
        self.faults().dependent_write_after = Some(writes);
    }

    /// Delay every call by `latency` before it touches the tables.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.faults().latency = latency;
    }

    /// Make every call fail with `Unavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults().unavailable = unavailable;
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, op: &'static str) -> Result<(), StoreError> {
        let (latency, unavailable) = {
            let faults = self.faults();
            (faults.latency, faults.unavailable)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if unavailable {
            tracing::debug!(op, "store marked unavailable");
            return Err(StoreError::Unavailable(format!("{op}: store offline")));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: User) -> Result<User, StoreError> {
        self.enter("create").await?;
        let mut tables = self.write()?;

        if tables.usernames.contains_key(&user.username) {
            return Err(StoreError::DuplicateKey(format!("username '{}'", user.username)));
        }
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::DuplicateKey(format!("id {}", user.id)));
        }

        tables.usernames.insert(user.username.clone(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<User, StoreError> {
        self.enter("find_by_id").await?;
        self.read()?.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.enter("find_by_username").await?;
        let tables = self.read()?;
        tables
            .usernames
            .get(username)
            .and_then(|id| tables.users.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        self.enter("update").await?;
        let mut tables = self.write()?;

        let existing = tables.users.get(&user.id).ok_or(StoreError::NotFound)?;
        if existing.username != user.username {
            if tables.usernames.contains_key(&user.username) {
                return Err(StoreError::DuplicateKey(format!("username '{}'", user.username)));
            }
            let old = existing.username.clone();
            tables.usernames.remove(&old);
            tables.usernames.insert(user.username.clone(), user.id);
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        self.enter("list").await?;
        let mut users: Vec<User> = self.read()?.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn list_memberships(&self, user_id: UserId) -> Result<Vec<ProjectMembership>, StoreError> {
        self.enter("list_memberships").await?;
        Ok(self
            .read()?
            .memberships
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn apply_state_change(&self, change: &StateChange) -> Result<StateChangeReceipt, StoreError> {
        self.enter("apply_state_change").await?;
        let fail_after = self.faults().dependent_write_after.take();

        let mut tables = self.write()?;
        let Tables {
            users, memberships, ..
        } = &mut *tables;

        let user = users.get_mut(&change.user_id).ok_or(StoreError::NotFound)?;
        let previous = (user.deactivated_at, user.updated_at);
        user.deactivated_at = change.apply_to(user.deactivated_at);
        user.updated_at = Some(change.at);
        let deactivated_at = user.deactivated_at;

        let owned = memberships.entry(change.user_id).or_default();
        let mut undo: Vec<(usize, Option<DateTime<Utc>>)> = Vec::with_capacity(owned.len());
        let mut failure = None;

        for idx in 0..=owned.len() {
            if fail_after == Some(idx) {
                failure = Some(format!("injected fault after {idx} membership writes"));
                break;
            }
            if let Some(membership) = owned.get_mut(idx) {
                undo.push((idx, membership.deactivated_at));
                membership.deactivated_at = deactivated_at;
            }
        }

        if let Some(reason) = failure {
            for (idx, prior) in undo.into_iter().rev() {
                owned[idx].deactivated_at = prior;
            }
            user.deactivated_at = previous.0;
            user.updated_at = previous.1;
            tracing::warn!(user_id = %change.user_id, %reason, "state change rolled back");
            return Err(StoreError::DependentWrite(reason));
        }

        Ok(StateChangeReceipt {
            user_id: change.user_id,
            deactivated_at,
            dependents_updated: undo.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use warden_auth::{PasswordDigest, Role};

    use super::*;

    fn user(username: &str) -> User {
        User {
            id: UserId::new(),
            username: username.to_string(),
            name: None,
            password: PasswordDigest::from_stored("digest"),
            role: Role::User,
            email: None,
            created_at: Utc::now(),
            updated_at: None,
            deactivated_at: None,
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let store = InMemoryUserStore::new();
        store.create(user("bob")).await.unwrap();

        let err = store.create(user("bob")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lookups_by_id_and_username_agree() {
        let store = InMemoryUserStore::new();
        let created = store.create(user("carol")).await.unwrap();

        assert_eq!(store.find_by_id(created.id).await.unwrap(), created);
        assert_eq!(store.find_by_username("carol").await.unwrap(), created);
        assert_eq!(store.find_by_username("nobody").await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn state_change_covers_every_membership() {
        let store = InMemoryUserStore::new();
        let created = store.create(user("dave")).await.unwrap();
        for _ in 0..3 {
            store.add_membership(ProjectId::new(), created.id, "member").unwrap();
        }

        let at = Utc::now();
        let receipt = store
            .apply_state_change(&StateChange {
                user_id: created.id,
                deactivate: true,
                at,
            })
            .await
            .unwrap();

        assert_eq!(receipt.dependents_updated, 3);
        assert_eq!(receipt.deactivated_at, Some(at));
        let memberships = store.list_memberships(created.id).await.unwrap();
        assert!(memberships.iter().all(|m| m.deactivated_at == Some(at)));
    }

    #[tokio::test]
    async fn injected_fault_rolls_back_every_write() {
        let store = InMemoryUserStore::new();
        let created = store.create(user("erin")).await.unwrap();
        for _ in 0..3 {
            store.add_membership(ProjectId::new(), created.id, "member").unwrap();
        }
        store.fail_next_state_change_after(2);

        let err = store
            .apply_state_change(&StateChange {
                user_id: created.id,
                deactivate: true,
                at: Utc::now(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::DependentWrite(_)));
        assert!(store.find_by_id(created.id).await.unwrap().is_active());
        let memberships = store.list_memberships(created.id).await.unwrap();
        assert!(memberships.iter().all(|m| m.deactivated_at.is_none()));
    }

    #[tokio::test]
    async fn missing_account_is_not_found() {
        let store = InMemoryUserStore::new();
        let err = store
            .apply_state_change(&StateChange {
                user_id: UserId::new(),
                deactivate: true,
                at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryUserStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.list().await, Err(StoreError::Unavailable(_))));

        store.set_unavailable(false);
        assert!(store.list().await.unwrap().is_empty());
    }
}
