//! Request middleware.

pub mod auth;

pub use auth::{optional_caller, require_caller, AuthState};
