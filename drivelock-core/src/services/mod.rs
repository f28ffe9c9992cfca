//! Service layer for the account-security logic
//!
//! This module contains the security state store, the single owner of the persisted
//! login-attempt, lockout and password-history documents.

pub mod security;

pub use security::{AccountSecurity, LockStatus, SecurityConfig, SecurityStore};
