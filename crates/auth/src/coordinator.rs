//! Account activation state, applied across the account and everything it owns.
//!
//! The consistency mechanism lives behind [`UserStore::apply_state_change`];
//! callers only ever see the [`StateTransactionCoordinator`] trait, so the
//! engine can switch between native transactions and an intent/undo scheme
//! without touching them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use warden_core::{Clock, UserId};

use crate::authorize::AuthorizationGuard;
use crate::deadline::Deadline;
use crate::error::{AuthError, AuthResult};
use crate::locks::AccountLocks;
use crate::store::{StateChange, StateChangeReceipt, UserStore, store_call};
use crate::{PrincipalContext, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StateChangeRequest {
    pub target: UserId,
    pub deactivate: bool,
}

impl StateChangeRequest {
    pub fn deactivate(target: UserId) -> Self {
        Self {
            target,
            deactivate: true,
        }
    }

    pub fn reactivate(target: UserId) -> Self {
        Self {
            target,
            deactivate: false,
        }
    }
}

#[async_trait]
pub trait StateTransactionCoordinator: Send + Sync {
    /// Flip `req.target` (and its dependent records) active or inactive.
    ///
    /// `UserNotFound` if the target is absent; `DependentUpdateFailed` if a
    /// dependent record could not be written, in which case nothing changed
    /// and the call may be retried.
    async fn update_state(
        &self,
        actor: &PrincipalContext,
        req: StateChangeRequest,
        deadline: Deadline,
    ) -> AuthResult<StateChangeReceipt>;
}

/// Coordinator backed by the store's atomic `apply_state_change`.
pub struct StoreStateCoordinator {
    store: Arc<dyn UserStore>,
    guard: Arc<AuthorizationGuard>,
    locks: Arc<AccountLocks>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for StoreStateCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoreStateCoordinator")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl StoreStateCoordinator {
    pub fn new(
        store: Arc<dyn UserStore>,
        guard: Arc<AuthorizationGuard>,
        locks: Arc<AccountLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            guard,
            locks,
            clock,
        }
    }
}

#[async_trait]
impl StateTransactionCoordinator for StoreStateCoordinator {
    #[tracing::instrument(
        skip_all,
        fields(actor = %actor.principal_id(), target = %req.target, deactivate = req.deactivate)
    )]
    async fn update_state(
        &self,
        actor: &PrincipalContext,
        req: StateChangeRequest,
        deadline: Deadline,
    ) -> AuthResult<StateChangeReceipt> {
        self.guard.require_fresh_role(actor, Role::Admin, deadline).await?;

        if req.deactivate && req.target == actor.principal_id() {
            return Err(AuthError::invalid_request("an admin cannot deactivate their own account"));
        }

        let _lock = self.locks.acquire(req.target, deadline).await?;

        let change = StateChange {
            user_id: req.target,
            deactivate: req.deactivate,
            at: self.clock.now(),
        };
        let receipt = store_call(
            deadline,
            "store.apply_state_change",
            self.store.apply_state_change(&change),
        )
        .await
        .inspect_err(|e| {
            tracing::warn!(kind = %e.kind(), retryable = e.is_retryable(), "state change failed");
        })?;

        tracing::info!(
            dependents = receipt.dependents_updated,
            deactivated_at = ?receipt.deactivated_at,
            "account state changed"
        );
        Ok(receipt)
    }
}
