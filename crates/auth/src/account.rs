//! Account lifecycle: provisioning, profile updates, login/logout, passwords.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use warden_core::{Clock, UserId};

use crate::authorize::AuthorizationGuard;
use crate::config::{AuthConfig, ConfigError};
use crate::deadline::Deadline;
use crate::error::{AuthError, AuthResult};
use crate::locks::AccountLocks;
use crate::password::PasswordHasher;
use crate::policy::{PasswordPolicy, PolicyViolation};
use crate::sanitize::Sanitizer;
use crate::store::{StoreError, UserStore, store_call};
use crate::token::TokenService;
use crate::user::validate_email;
use crate::{AccountView, PrincipalContext, Role, User};

// ─────────────────────────────────────────────────────────────────────────────
// Requests / responses
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Deserialize)]
pub struct CreateUserRequest {
    pub role: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl core::fmt::Debug for CreateUserRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CreateUserRequest")
            .field("role", &self.role)
            .field("username", &self.username)
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Self-service profile update. Absent fields are left unchanged.
#[derive(Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    /// Ignored: the target is always the caller.
    #[serde(default)]
    pub id: Option<UserId>,
    #[serde(default)]
    pub name: Option<String>,
    /// `Some("")` clears the email.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl core::fmt::Debug for UpdateUserRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UpdateUserRequest")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    #[serde(rename = "type")]
    pub token_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordChange {
    /// The caller changes their own password.
    SelfService,
    /// An admin resets another account's password.
    AdminReset { username: String },
}

#[derive(Clone)]
pub struct PasswordChangeRequest {
    pub mode: PasswordChange,
    pub new_password: String,
}

impl core::fmt::Debug for PasswordChangeRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PasswordChangeRequest")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Collaborators shared with the rest of the subsystem.
pub struct AccountDeps {
    pub store: Arc<dyn UserStore>,
    pub tokens: Arc<TokenService>,
    pub guard: Arc<AuthorizationGuard>,
    pub sanitizer: Arc<dyn Sanitizer>,
    pub clock: Arc<dyn Clock>,
    pub locks: Arc<AccountLocks>,
}

pub struct AccountService {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    policy: PasswordPolicy,
    tokens: Arc<TokenService>,
    guard: Arc<AuthorizationGuard>,
    sanitizer: Arc<dyn Sanitizer>,
    clock: Arc<dyn Clock>,
    locks: Arc<AccountLocks>,
    reveal_unknown_users: bool,
}

impl core::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccountService")
            .field("hasher", &self.hasher)
            .field("policy", &self.policy)
            .field("reveal_unknown_users", &self.reveal_unknown_users)
            .finish_non_exhaustive()
    }
}

impl AccountService {
    pub fn new(config: &AuthConfig, deps: AccountDeps) -> Result<Self, ConfigError> {
        Ok(Self {
            store: deps.store,
            hasher: PasswordHasher::new(config.hashing.cost)?,
            policy: PasswordPolicy::new(config.password.clone()),
            tokens: deps.tokens,
            guard: deps.guard,
            sanitizer: deps.sanitizer,
            clock: deps.clock,
            locks: deps.locks,
            reveal_unknown_users: config.reveal_unknown_users,
        })
    }

    /// Provision an account. Admin only, checked against the live store.
    #[tracing::instrument(skip_all, fields(actor = %actor.principal_id()))]
    pub async fn create_user(
        &self,
        actor: &PrincipalContext,
        req: CreateUserRequest,
        deadline: Deadline,
    ) -> AuthResult<AccountView> {
        self.guard.require_fresh_role(actor, Role::Admin, deadline).await?;

        if req.role.trim().is_empty() {
            return Err(AuthError::invalid_request("role is required"));
        }
        let role: Role = req.role.parse()?;

        let username = self.sanitizer.sanitize(&req.username);
        if username.is_empty() {
            return Err(AuthError::invalid_request("username is required"));
        }
        self.check_new_password(&req.password)?;

        let email = non_empty(req.email);
        if let Some(email) = &email {
            validate_email(email).map_err(|_| AuthError::InvalidEmail)?;
        }
        let name = non_empty(req.name.map(|n| self.sanitizer.sanitize(&n)));

        // Cheap early exit; the store still enforces uniqueness on insert.
        match store_call(deadline, "store.find_by_username", self.store.find_by_username(&username)).await {
            Ok(_) => {
                tracing::warn!(%username, "account already exists");
                return Err(AuthError::UserExists);
            }
            Err(AuthError::UserNotFound) => {}
            Err(e) => return Err(e),
        }

        let password = self.hasher.hash_offloaded(req.password).await?;
        let user = User {
            id: UserId::new(),
            username,
            name,
            password,
            role,
            email,
            created_at: self.clock.now(),
            updated_at: None,
            deactivated_at: None,
        };

        let created = store_call(deadline, "store.create", self.store.create(user)).await?;
        tracing::info!(user_id = %created.id, username = %created.username, role = %created.role, "account created");
        Ok(created.view())
    }

    /// Update the caller's own profile. Any id in the payload is ignored.
    #[tracing::instrument(skip_all, fields(actor = %actor.principal_id()))]
    pub async fn update_user(
        &self,
        actor: &PrincipalContext,
        req: UpdateUserRequest,
        deadline: Deadline,
    ) -> AuthResult<AccountView> {
        let id = actor.principal_id();
        if req.id.is_some_and(|claimed| claimed != id) {
            tracing::debug!(claimed = ?req.id, "ignoring target id in update payload");
        }

        let email = match req.email {
            Some(email) if email.trim().is_empty() => Some(None),
            Some(email) => {
                let email = email.trim().to_string();
                validate_email(&email).map_err(|_| AuthError::InvalidEmail)?;
                Some(Some(email))
            }
            None => None,
        };
        let name = req.name.map(|n| non_empty(Some(self.sanitizer.sanitize(&n))));
        let password = match req.password {
            Some(password) => {
                self.check_new_password(&password)?;
                Some(self.hasher.hash_offloaded(password).await?)
            }
            None => None,
        };

        let _lock = self.locks.acquire(id, deadline).await?;
        let mut user = store_call(deadline, "store.find_by_id", self.store.find_by_id(id)).await?;
        if !user.is_active() {
            return Err(AuthError::UserDeactivated);
        }

        if let Some(name) = name {
            user.name = name;
        }
        if let Some(email) = email {
            user.email = email;
        }
        if let Some(password) = password {
            user.password = password;
        }
        user.updated_at = Some(self.clock.now());

        store_call(deadline, "store.update", self.store.update(&user)).await?;
        tracing::info!(user_id = %id, "account updated");
        Ok(user.view())
    }

    pub async fn get_user(&self, id: UserId, deadline: Deadline) -> AuthResult<AccountView> {
        let user = store_call(deadline, "store.find_by_id", self.store.find_by_id(id)).await?;
        Ok(user.view())
    }

    pub async fn list_users(&self, deadline: Deadline) -> AuthResult<Vec<AccountView>> {
        let users = store_call(deadline, "store.list", self.store.list()).await?;
        Ok(users.iter().map(AccountView::from).collect())
    }

    /// Verify credentials and issue a session token.
    #[tracing::instrument(skip_all)]
    pub async fn login(&self, req: LoginRequest, deadline: Deadline) -> AuthResult<LoginResponse> {
        let username = self.sanitizer.sanitize(&req.username);
        if username.is_empty() || req.password.is_empty() {
            return Err(AuthError::invalid_request("username and password are required"));
        }

        let user = match deadline
            .run("store.find_by_username", self.store.find_by_username(&username))
            .await?
        {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                tracing::warn!(%username, "login for unknown user");
                return Err(if self.reveal_unknown_users {
                    AuthError::UserNotFound
                } else {
                    AuthError::InvalidCredentials
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !user.is_active() {
            tracing::warn!(user_id = %user.id, "login for deactivated user");
            return Err(AuthError::UserDeactivated);
        }

        let matched = self
            .hasher
            .verify_offloaded(user.password.clone(), req.password)
            .await?;
        if !matched {
            tracing::warn!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self.tokens.issue(&user)?;
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok(LoginResponse {
            access_token: issued.token,
            expires_in: issued.ttl.as_secs(),
            token_type: "Bearer".to_string(),
        })
    }

    /// End a session. Accepts a raw token or an `Authorization` header value.
    pub fn logout(&self, token: &str) -> AuthResult<()> {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            return Err(AuthError::Unauthorized);
        }
        self.tokens.revoke(token)?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.principal_id(), mode = ?req.mode))]
    pub async fn update_password(
        &self,
        actor: &PrincipalContext,
        req: PasswordChangeRequest,
        deadline: Deadline,
    ) -> AuthResult<()> {
        self.check_new_password(&req.new_password)?;

        let (target, self_service) = match &req.mode {
            PasswordChange::SelfService => (actor.principal_id(), true),
            PasswordChange::AdminReset { username } => {
                let username = self.sanitizer.sanitize(username);
                if username.is_empty() {
                    return Err(AuthError::invalid_request("target username is required"));
                }
                self.guard.require_fresh_role(actor, Role::Admin, deadline).await?;
                let target = store_call(
                    deadline,
                    "store.find_by_username",
                    self.store.find_by_username(&username),
                )
                .await?;
                (target.id, false)
            }
        };

        let digest = self.hasher.hash_offloaded(req.new_password).await?;

        let _lock = self.locks.acquire(target, deadline).await?;
        let mut user = store_call(deadline, "store.find_by_id", self.store.find_by_id(target)).await?;
        if self_service && !user.is_active() {
            return Err(AuthError::UserDeactivated);
        }
        user.password = digest;
        user.updated_at = Some(self.clock.now());
        store_call(deadline, "store.update", self.store.update(&user)).await?;

        tracing::info!(user_id = %target, self_service, "password updated");
        Ok(())
    }

    pub async fn change_own_password(
        &self,
        actor: &PrincipalContext,
        new_password: impl Into<String>,
        deadline: Deadline,
    ) -> AuthResult<()> {
        let req = PasswordChangeRequest {
            mode: PasswordChange::SelfService,
            new_password: new_password.into(),
        };
        self.update_password(actor, req, deadline).await
    }

    pub async fn reset_password(
        &self,
        actor: &PrincipalContext,
        username: impl Into<String>,
        new_password: impl Into<String>,
        deadline: Deadline,
    ) -> AuthResult<()> {
        let req = PasswordChangeRequest {
            mode: PasswordChange::AdminReset {
                username: username.into(),
            },
            new_password: new_password.into(),
        };
        self.update_password(actor, req, deadline).await
    }

    /// Seed an admin account at start-up. Returns `None` if the username is
    /// already taken.
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        password: &str,
        deadline: Deadline,
    ) -> AuthResult<Option<AccountView>> {
        let username = self.sanitizer.sanitize(username);
        if username.is_empty() {
            return Err(AuthError::invalid_request("admin username is required"));
        }
        self.check_new_password(password)?;

        match store_call(deadline, "store.find_by_username", self.store.find_by_username(&username)).await {
            Ok(_) => {
                tracing::info!(%username, "bootstrap admin already present");
                return Ok(None);
            }
            Err(AuthError::UserNotFound) => {}
            Err(e) => return Err(e),
        }

        let user = User {
            id: UserId::new(),
            username,
            name: None,
            password: self.hasher.hash_offloaded(password.to_string()).await?,
            role: Role::Admin,
            email: None,
            created_at: self.clock.now(),
            updated_at: None,
            deactivated_at: None,
        };

        match store_call(deadline, "store.create", self.store.create(user)).await {
            Ok(created) => {
                tracing::info!(user_id = %created.id, username = %created.username, "bootstrap admin created");
                Ok(Some(created.view()))
            }
            Err(AuthError::UserExists) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn check_new_password(&self, password: &str) -> AuthResult<()> {
        match self.policy.validate(password) {
            Ok(()) => Ok(()),
            Err(PolicyViolation::Empty) => Err(AuthError::invalid_request("password is required")),
            Err(violation) => {
                tracing::debug!(rule = violation.rule(), "password rejected by policy");
                Err(AuthError::StrictPasswordPolicyViolation(violation))
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
