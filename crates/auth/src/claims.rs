use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::{TokenId, UserId};

use crate::Role;

/// Claims carried inside a session token.
///
/// Times travel as unix seconds (`iat`/`exp`) so any JWT library can read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject / account identifier.
    pub sub: UserId,

    /// Token identifier, the key used for revocation.
    pub jti: TokenId,

    pub username: String,

    /// Role at issuance. Not trusted for privileged decisions.
    pub role: Role,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Check the claims' time window against `now`.
///
/// Signature verification happens before this, in the token service.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), ClaimsError> {
    if claims.expires_at <= claims.issued_at {
        return Err(ClaimsError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(ClaimsError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(ClaimsError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, SubsecRound};

    use super::*;

    fn claims(issued_at: DateTime<Utc>, ttl: Duration) -> SessionClaims {
        SessionClaims {
            sub: UserId::new(),
            jti: TokenId::new(),
            username: "alice".to_string(),
            role: Role::User,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    #[test]
    fn window_is_half_open() {
        let now = Utc::now();
        let c = claims(now, Duration::minutes(10));

        assert_eq!(validate_claims(&c, now), Ok(()));
        assert_eq!(validate_claims(&c, now + Duration::minutes(10)), Err(ClaimsError::Expired));
        assert_eq!(validate_claims(&c, now - Duration::seconds(1)), Err(ClaimsError::NotYetValid));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let c = claims(now, Duration::zero());
        assert_eq!(validate_claims(&c, now), Err(ClaimsError::InvalidTimeWindow));
    }

    #[test]
    fn times_serialize_as_unix_seconds() {
        let now = Utc::now().trunc_subsecs(0);
        let c = claims(now, Duration::minutes(1));
        let json = serde_json::to_value(&c).unwrap();

        assert_eq!(json["iat"], now.timestamp());
        assert_eq!(json["exp"], now.timestamp() + 60);

        let back: SessionClaims = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }
}
