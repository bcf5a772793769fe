//! Account records and their outward view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{DomainError, DomainResult, ProjectId, UserId};

use crate::Role;
use crate::password::PasswordDigest;

// ─────────────────────────────────────────────────────────────────────────────
// Stored records
// ─────────────────────────────────────────────────────────────────────────────

/// Persisted account.
///
/// # Invariants
/// - `username` is unique across the store (enforced at creation).
/// - `password` only ever holds a digest.
/// - `deactivated_at` set means soft-disabled; the record is never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub name: Option<String>,
    pub password: PasswordDigest,
    pub role: Role,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }

    pub fn view(&self) -> AccountView {
        AccountView::from(self)
    }
}

/// A project membership owned by an account.
///
/// Its `deactivated_at` tracks the owning account's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMembership {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: String,
    pub deactivated_at: Option<DateTime<Utc>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Views
// ─────────────────────────────────────────────────────────────────────────────

/// Account as returned to callers. Carries no password material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub id: UserId,
    pub username: String,
    pub name: Option<String>,
    pub role: Role,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl From<&User> for AccountView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
            role: user.role,
            email: user.email.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
            deactivated_at: user.deactivated_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

const MAX_EMAIL_LEN: usize = 254;

/// Basic structural email check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> DomainResult<()> {
    let invalid = || DomainError::validation("invalid email format");

    if email.is_empty() || email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty() || l.starts_with('-') || l.ends_with('-')) {
        return Err(invalid());
    }

    Ok(())
}
