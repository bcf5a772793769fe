//! Wires every component from one [`AuthConfig`], a store, and a clock.

use std::sync::Arc;

use warden_core::Clock;

use crate::account::{AccountDeps, AccountService};
use crate::authorize::AuthorizationGuard;
use crate::config::{AuthConfig, ConfigError};
use crate::coordinator::{StateTransactionCoordinator, StoreStateCoordinator};
use crate::deadline::Deadline;
use crate::error::AuthResult;
use crate::locks::AccountLocks;
use crate::revocation::{InMemoryRevocationStore, RevocationStore};
use crate::sanitize::{Sanitizer, StrictSanitizer};
use crate::store::UserStore;
use crate::token::TokenService;
use crate::AccountView;

/// The assembled subsystem. Cheap to clone; all parts are shared.
#[derive(Clone)]
pub struct AuthServices {
    pub accounts: Arc<AccountService>,
    pub tokens: Arc<TokenService>,
    pub guard: Arc<AuthorizationGuard>,
    pub coordinator: Arc<dyn StateTransactionCoordinator>,
    config: Arc<AuthConfig>,
}

impl core::fmt::Debug for AuthServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthServices")
            .field("accounts", &self.accounts)
            .field("tokens", &self.tokens)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuthServices {
    /// Build with the in-memory revocation store and the default sanitizer.
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn UserStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        Self::with_parts(
            config,
            store,
            clock,
            Arc::new(InMemoryRevocationStore::new()),
            Arc::new(StrictSanitizer),
        )
    }

    pub fn with_parts(
        config: AuthConfig,
        store: Arc<dyn UserStore>,
        clock: Arc<dyn Clock>,
        revocations: Arc<dyn RevocationStore>,
        sanitizer: Arc<dyn Sanitizer>,
    ) -> Result<Self, ConfigError> {
        let tokens = Arc::new(TokenService::new(&config.token, clock.clone(), revocations)?);
        let guard = Arc::new(AuthorizationGuard::new(store.clone()));
        let locks = Arc::new(AccountLocks::new());

        let accounts = Arc::new(AccountService::new(
            &config,
            AccountDeps {
                store: store.clone(),
                tokens: tokens.clone(),
                guard: guard.clone(),
                sanitizer,
                clock: clock.clone(),
                locks: locks.clone(),
            },
        )?);
        let coordinator = Arc::new(StoreStateCoordinator::new(store, guard.clone(), locks, clock));

        tracing::info!(
            policy = ?config.password.mode,
            cost = config.hashing.cost,
            token_ttl_secs = config.token.ttl_secs,
            "auth services ready"
        );

        Ok(Self {
            accounts,
            tokens,
            guard,
            coordinator,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Seed the configured admin account, if any. Safe to run on every start.
    pub async fn bootstrap(&self, deadline: Deadline) -> AuthResult<Option<AccountView>> {
        match &self.config.bootstrap {
            Some(admin) => {
                self.accounts
                    .bootstrap_admin(&admin.username, &admin.password, deadline)
                    .await
            }
            None => {
                tracing::debug!("no bootstrap admin configured");
                Ok(None)
            }
        }
    }
}
