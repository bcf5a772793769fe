//! `warden-auth`: identity and access control.
//!
//! Password hashing and policy, session tokens, the role gate, account
//! lifecycle, and atomic account state changes. Decoupled from transport and
//! from the persistence engine, which is reached only through [`UserStore`].

pub mod account;
pub mod authorize;
pub mod claims;
pub mod config;
pub mod coordinator;
pub mod deadline;
pub mod error;
pub mod locks;
pub mod password;
pub mod policy;
pub mod principal;
pub mod revocation;
pub mod roles;
pub mod sanitize;
pub mod services;
pub mod store;
pub mod token;
pub mod user;

pub use account::{
    AccountDeps, AccountService, CreateUserRequest, LoginRequest, LoginResponse, PasswordChange,
    PasswordChangeRequest, UpdateUserRequest,
};
pub use authorize::AuthorizationGuard;
pub use claims::{ClaimsError, SessionClaims, validate_claims};
pub use config::{AuthConfig, BootstrapAdmin, ConfigError, HashingConfig, PolicyConfig, PolicyMode, TokenConfig};
pub use coordinator::{StateChangeRequest, StateTransactionCoordinator, StoreStateCoordinator};
pub use deadline::Deadline;
pub use error::{AuthError, AuthResult, ErrorBody, ErrorKind};
pub use locks::{AccountGuard, AccountLocks};
pub use password::{HashingError, PasswordDigest, PasswordHasher};
pub use policy::{PasswordPolicy, PolicyViolation};
pub use principal::PrincipalContext;
pub use revocation::{InMemoryRevocationStore, RevocationError, RevocationStore};
pub use roles::Role;
pub use sanitize::{Sanitizer, StrictSanitizer};
pub use services::AuthServices;
pub use store::{StateChange, StateChangeReceipt, StoreError, UserStore};
pub use token::{IssuedToken, TokenError, TokenService};
pub use user::{AccountView, ProjectMembership, User, validate_email};
