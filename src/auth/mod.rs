//! Caller identity: roles, actors, and identity tokens.

pub mod caller;
pub mod jwt;

pub use caller::{Actor, Caller, Role};
pub use jwt::{IdentityError, IdentityVerifier, VerifiedIdentity};
