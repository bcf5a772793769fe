//! Role gate for operations.
//!
//! Two strengths:
//! - [`AuthorizationGuard::require_role`] trusts the role cached in the
//!   caller's token. Fine for reads and other non-privileged checks.
//! - [`AuthorizationGuard::require_fresh_role`] re-reads the caller from the
//!   store. Every privileged mutation goes through this, so a demoted or
//!   deactivated admin loses access as soon as the store says so, whatever
//!   their token claims.

use std::sync::Arc;

use crate::deadline::Deadline;
use crate::error::AuthError;
use crate::store::{StoreError, UserStore};
use crate::{PrincipalContext, Role, User};

pub struct AuthorizationGuard {
    store: Arc<dyn UserStore>,
}

impl core::fmt::Debug for AuthorizationGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthorizationGuard").finish_non_exhaustive()
    }
}

impl AuthorizationGuard {
    /// The guard only ever reads from `store`.
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Check against the caller's cached claims. No IO.
    pub fn require_role(&self, actor: &PrincipalContext, required: Role) -> Result<(), AuthError> {
        if actor.cached_role().satisfies(required) {
            Ok(())
        } else {
            tracing::warn!(
                actor = %actor.principal_id(),
                required = %required,
                "authorization denied (cached role)"
            );
            Err(AuthError::Unauthorized)
        }
    }

    /// Check against the caller's live record and return it.
    pub async fn require_fresh_role(
        &self,
        actor: &PrincipalContext,
        required: Role,
        deadline: Deadline,
    ) -> Result<User, AuthError> {
        let id = actor.principal_id();
        let current = match deadline.run("store.find_by_id", self.store.find_by_id(id)).await? {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                tracing::warn!(actor = %id, "authorization denied: actor no longer exists");
                return Err(AuthError::Unauthorized);
            }
            Err(e) => return Err(e.into()),
        };

        if !current.is_active() {
            tracing::warn!(actor = %id, "authorization denied: actor is deactivated");
            return Err(AuthError::Unauthorized);
        }
        if !current.role.satisfies(required) {
            tracing::warn!(
                actor = %id,
                required = %required,
                current = %current.role,
                cached = %actor.cached_role(),
                "authorization denied"
            );
            return Err(AuthError::Unauthorized);
        }

        Ok(current)
    }
}
