use warden_core::UserId;

use crate::{Role, SessionClaims};

/// The authenticated caller of an operation, as derived from token claims.
///
/// `role` is the role at token issuance. It is good enough for cheap,
/// non-privileged checks and for identity; privileged mutations re-read the
/// live role through the authorization guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: UserId,
    username: String,
    role: Role,
}

impl PrincipalContext {
    pub fn new(principal_id: UserId, username: impl Into<String>, role: Role) -> Self {
        Self {
            principal_id,
            username: username.into(),
            role,
        }
    }

    pub fn principal_id(&self) -> UserId {
        self.principal_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Role as cached in the session token.
    pub fn cached_role(&self) -> Role {
        self.role
    }
}

impl From<&SessionClaims> for PrincipalContext {
    fn from(claims: &SessionClaims) -> Self {
        Self::new(claims.sub, claims.username.clone(), claims.role)
    }
}
