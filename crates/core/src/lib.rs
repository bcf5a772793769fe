//! `warden-core`: identity primitives shared by the auth layer.
//!
//! This crate has no IO: ids, the domain error model, and the injected clock.

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{ProjectId, TokenId, UserId};
