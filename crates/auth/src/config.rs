//! Process-wide configuration, passed explicitly into each component.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::password::{HashingError, MAX_COST, MIN_COST};

const DEV_JWT_SECRET: &str = "dev-secret";

/// Longest accepted session lifetime: one year.
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl From<HashingError> for ConfigError {
    fn from(value: HashingError) -> Self {
        ConfigError::Invalid {
            var: "hashing.cost",
            reason: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    Strict,
    #[default]
    Permissive,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub mode: PolicyMode,
    pub min_length: usize,
    pub max_length: Option<usize>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            mode: PolicyMode::Permissive,
            min_length: 8,
            max_length: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    /// bcrypt work factor.
    pub cost: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HS256 signing secret.
    pub secret: String,
    /// Session lifetime in seconds.
    pub ttl_secs: u64,
}

impl TokenConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: DEV_JWT_SECRET.to_string(),
            ttl_secs: 24 * 60 * 60,
        }
    }
}

impl core::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// Admin account seeded at start-up when present.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub password: PolicyConfig,
    pub hashing: HashingConfig,
    pub token: TokenConfig,
    /// Report unknown usernames as `UserNotFound` at login instead of
    /// `InvalidCredentials`. Off by default: it lets callers enumerate accounts.
    pub reveal_unknown_users: bool,
    pub bootstrap: Option<BootstrapAdmin>,
}

impl AuthConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AuthConfig::default();

        if let Some(strict) = lookup("STRICT_PASSWORD_POLICY") {
            config.password.mode = if parse_bool("STRICT_PASSWORD_POLICY", &strict)? {
                PolicyMode::Strict
            } else {
                PolicyMode::Permissive
            };
        }
        if let Some(min) = lookup("PASSWORD_MIN_LENGTH") {
            config.password.min_length = parse_num("PASSWORD_MIN_LENGTH", &min)?;
        }
        if let Some(cost) = lookup("PASSWORD_ENCRYPTION_COST") {
            let cost: u32 = parse_num("PASSWORD_ENCRYPTION_COST", &cost)?;
            if !(MIN_COST..=MAX_COST).contains(&cost) {
                return Err(ConfigError::Invalid {
                    var: "PASSWORD_ENCRYPTION_COST",
                    reason: format!("must be within {MIN_COST}..={MAX_COST}"),
                });
            }
            config.hashing.cost = cost;
        }
        match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => config.token.secret = secret,
            _ => tracing::warn!("JWT_SECRET not set; using insecure dev default"),
        }
        if let Some(minutes) = lookup("JWT_EXPIRY_MINUTES") {
            let minutes: u64 = parse_num("JWT_EXPIRY_MINUTES", &minutes)?;
            config.token.ttl_secs = minutes
                .checked_mul(60)
                .filter(|secs| (1..=MAX_TOKEN_TTL_SECS).contains(secs))
                .ok_or_else(|| ConfigError::Invalid {
                    var: "JWT_EXPIRY_MINUTES",
                    reason: format!("must be within 1..={}", MAX_TOKEN_TTL_SECS / 60),
                })?;
        }
        if let Some(reveal) = lookup("REVEAL_UNKNOWN_USERS") {
            config.reveal_unknown_users = parse_bool("REVEAL_UNKNOWN_USERS", &reveal)?;
        }
        if let (Some(username), Some(password)) = (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            config.bootstrap = Some(BootstrapAdmin { username, password });
        }

        Ok(config)
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got '{raw}'"),
        }),
    }
}

fn parse_num<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}
