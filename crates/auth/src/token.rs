//! Session tokens: issue, validate, revoke.
//!
//! Per token: `Issued -> Valid -> {Expired, Revoked}`. Expiry is purely a
//! function of the injected clock; revocation is recorded in the
//! [`RevocationStore`] this service owns.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use warden_core::{Clock, TokenId};

use crate::claims::{ClaimsError, SessionClaims, validate_claims};
use crate::config::{ConfigError, MAX_TOKEN_TTL_SECS, TokenConfig};
use crate::revocation::{RevocationError, RevocationStore};
use crate::{PrincipalContext, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Bad encoding, bad signature, or an impossible time window.
    #[error("malformed token")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("token has been revoked")]
    Revoked,

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error(transparent)]
    Revocation(#[from] RevocationError),
}

/// A freshly signed session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: TokenId,
    pub expires_at: DateTime<Utc>,
    pub ttl: Duration,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    revocations: Arc<dyn RevocationStore>,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .field("revocations", &self.revocations)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(
        config: &TokenConfig,
        clock: Arc<dyn Clock>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Result<Self, ConfigError> {
        if config.secret.is_empty() {
            return Err(ConfigError::Invalid {
                var: "token.secret",
                reason: "must not be empty".to_string(),
            });
        }
        let ttl = config.ttl();
        let representable = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| clock.now().checked_add_signed(ttl))
            .is_some();
        if ttl.is_zero() || config.ttl_secs > MAX_TOKEN_TTL_SECS || !representable {
            return Err(ConfigError::Invalid {
                var: "token.ttl_secs",
                reason: format!("unusable token lifetime {ttl:?}"),
            });
        }

        // Expiry is checked against the injected clock, not the system time.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl,
            clock,
            revocations,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: &User) -> Result<IssuedToken, TokenError> {
        let issued_at = self.clock.now().trunc_subsecs(0);
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Signing("expiry out of range".to_string()))?;

        let claims = SessionClaims {
            sub: user.id,
            jti: TokenId::new(),
            username: user.username.clone(),
            role: user.role,
            issued_at,
            expires_at,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        tracing::debug!(user_id = %user.id, token_id = %claims.jti, "session token issued");

        Ok(IssuedToken {
            token,
            token_id: claims.jti,
            expires_at: claims.expires_at,
            ttl: self.ttl,
        })
    }

    pub fn validate(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let claims = self.decode(token)?;

        validate_claims(&claims, self.clock.now()).map_err(|e| match e {
            ClaimsError::Expired => TokenError::Expired,
            ClaimsError::NotYetValid | ClaimsError::InvalidTimeWindow => TokenError::Malformed,
        })?;

        if self.revocations.is_revoked(&claims.jti)? {
            return Err(TokenError::Revoked);
        }

        Ok(claims)
    }

    /// Validate and project the claims into a caller context.
    pub fn resolve_principal(&self, token: &str) -> Result<PrincipalContext, TokenError> {
        let claims = self.validate(token)?;
        Ok(PrincipalContext::from(&claims))
    }

    /// Revoke a token. Revoking twice, or revoking an expired token, is a no-op.
    pub fn revoke(&self, token: &str) -> Result<(), TokenError> {
        let claims = self.decode(token)?;
        let now = self.clock.now();

        if now >= claims.expires_at {
            tracing::debug!(token_id = %claims.jti, "revoke of expired token ignored");
            return Ok(());
        }

        self.revocations.revoke(claims.jti, claims.expires_at, now)?;
        tracing::info!(user_id = %claims.sub, token_id = %claims.jti, "session token revoked");
        Ok(())
    }

    fn decode(&self, token: &str) -> Result<SessionClaims, TokenError> {
        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                TokenError::Malformed
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use warden_core::{ManualClock, UserId};

    use super::*;
    use crate::Role;
    use crate::password::PasswordDigest;
    use crate::revocation::InMemoryRevocationStore;

    struct Fixture {
        clock: Arc<ManualClock>,
        revocations: Arc<InMemoryRevocationStore>,
        tokens: TokenService,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let revocations = Arc::new(InMemoryRevocationStore::new());
        let config = TokenConfig {
            secret: "test-secret".to_string(),
            ttl_secs: 600,
        };
        let tokens = TokenService::new(&config, clock.clone(), revocations.clone()).unwrap();
        Fixture {
            clock,
            revocations,
            tokens,
        }
    }

    fn user() -> User {
        User {
            id: UserId::new(),
            username: "alice".to_string(),
            name: None,
            password: PasswordDigest::from_stored("x"),
            role: Role::Admin,
            email: None,
            created_at: Utc::now(),
            updated_at: None,
            deactivated_at: None,
        }
    }

    #[test]
    fn issued_token_validates_with_subject_and_role() {
        let f = fixture();
        let user = user();
        let issued = f.tokens.issue(&user).unwrap();

        let claims = f.tokens.validate(&issued.token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.jti, issued.token_id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.expires_at, issued.expires_at);
        assert_eq!(issued.ttl, Duration::from_secs(600));
    }

    #[test]
    fn token_expires_by_clock_alone() {
        let f = fixture();
        let issued = f.tokens.issue(&user()).unwrap();

        f.clock.advance(ChronoDuration::seconds(599));
        assert!(f.tokens.validate(&issued.token).is_ok());

        f.clock.advance(ChronoDuration::seconds(1));
        assert_eq!(f.tokens.validate(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn tampered_token_is_malformed() {
        let f = fixture();
        let issued = f.tokens.issue(&user()).unwrap();

        let mut parts: Vec<String> = issued.token.split('.').map(str::to_string).collect();
        parts[1] = parts[1].chars().rev().collect();
        let tampered = parts.join(".");

        assert_eq!(f.tokens.validate(&tampered), Err(TokenError::Malformed));
        assert_eq!(f.tokens.validate("not-a-token"), Err(TokenError::Malformed));
    }

    #[test]
    fn token_signed_with_another_secret_is_malformed() {
        let f = fixture();
        let other = TokenService::new(
            &TokenConfig {
                secret: "other-secret".to_string(),
                ttl_secs: 600,
            },
            f.clock.clone(),
            Arc::new(InMemoryRevocationStore::new()),
        )
        .unwrap();

        let foreign = other.issue(&user()).unwrap();
        assert_eq!(f.tokens.validate(&foreign.token), Err(TokenError::Malformed));
    }

    #[test]
    fn revoked_token_is_rejected_before_expiry() {
        let f = fixture();
        let issued = f.tokens.issue(&user()).unwrap();

        f.tokens.revoke(&issued.token).unwrap();
        assert_eq!(f.tokens.validate(&issued.token), Err(TokenError::Revoked));
        assert!(f.clock.now() < issued.expires_at);
    }

    #[test]
    fn revoke_is_idempotent_and_ignores_expired_tokens() {
        let f = fixture();
        let issued = f.tokens.issue(&user()).unwrap();

        f.tokens.revoke(&issued.token).unwrap();
        f.tokens.revoke(&issued.token).unwrap();
        assert_eq!(f.revocations.len(), 1);

        let stale = f.tokens.issue(&user()).unwrap();
        f.clock.advance(ChronoDuration::minutes(11));
        f.tokens.revoke(&stale.token).unwrap();
        assert_eq!(f.tokens.validate(&stale.token), Err(TokenError::Expired));
    }

    #[test]
    fn revocation_storage_stays_bounded() {
        let f = fixture();
        for _ in 0..5 {
            let issued = f.tokens.issue(&user()).unwrap();
            f.tokens.revoke(&issued.token).unwrap();
        }
        assert_eq!(f.revocations.len(), 5);

        f.clock.advance(ChronoDuration::minutes(11));
        let fresh = f.tokens.issue(&user()).unwrap();
        f.tokens.revoke(&fresh.token).unwrap();
        assert_eq!(f.revocations.len(), 1);
    }

    #[test]
    fn revocation_is_visible_to_every_later_validation() {
        let f = fixture();
        let tokens = Arc::new(f.tokens);
        let issued: Vec<IssuedToken> = (0..8).map(|_| tokens.issue(&user()).unwrap()).collect();

        let handles: Vec<_> = issued
            .iter()
            .cloned()
            .map(|t| {
                let tokens = tokens.clone();
                std::thread::spawn(move || {
                    tokens.revoke(&t.token).unwrap();
                    tokens.validate(&t.token)
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Err(TokenError::Revoked));
        }
        for t in &issued {
            assert_eq!(tokens.validate(&t.token), Err(TokenError::Revoked));
        }
    }

    #[test]
    fn principal_is_built_from_claims() {
        let f = fixture();
        let user = user();
        let issued = f.tokens.issue(&user).unwrap();

        let principal = f.tokens.resolve_principal(&issued.token).unwrap();
        assert_eq!(principal.principal_id(), user.id);
        assert_eq!(principal.username(), "alice");
        assert_eq!(principal.cached_role(), Role::Admin);
    }

    #[test]
    fn zero_ttl_is_a_config_error() {
        let err = TokenService::new(
            &TokenConfig {
                secret: "s".to_string(),
                ttl_secs: 0,
            },
            Arc::new(ManualClock::default()),
            Arc::new(InMemoryRevocationStore::new()),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "token.ttl_secs", .. }));
    }

    #[test]
    fn oversized_ttl_is_a_config_error() {
        for ttl_secs in [MAX_TOKEN_TTL_SECS + 1, 9_000_000_000_000] {
            let err = TokenService::new(
                &TokenConfig {
                    secret: "s".to_string(),
                    ttl_secs,
                },
                Arc::new(ManualClock::default()),
                Arc::new(InMemoryRevocationStore::new()),
            )
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { var: "token.ttl_secs", .. }));
        }
    }

    #[test]
    fn expiry_past_the_calendar_is_a_signing_error() {
        let f = fixture();
        let end = DateTime::<Utc>::MAX_UTC - ChronoDuration::seconds(60);

        let err = TokenService::new(
            &TokenConfig {
                secret: "s".to_string(),
                ttl_secs: 600,
            },
            Arc::new(ManualClock::new(end)),
            Arc::new(InMemoryRevocationStore::new()),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "token.ttl_secs", .. }));

        f.clock.set(end);
        assert!(matches!(f.tokens.issue(&user()), Err(TokenError::Signing(_))));
    }
}
