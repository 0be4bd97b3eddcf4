//! Auth (Credential Core) Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Services and the credential facade
//! - `infra/` - Database implementations
//!
//! ## Features
//! - Login/registration with email + password, uniform result codes
//! - Server-side bearer sessions with integrity tags and sliding renewal
//! - Single-use typed action tokens (activation, password reset)
//! - IP-scoped attempt throttling with time-windowed lockout
//!
//! ## Security Model
//! - Passwords hashed with Argon2id; stale digests upgraded on verify
//! - Sessions bound to the issuing address and keyed to the site secret
//! - Unknown account and wrong password are indistinguishable to callers
//! - Expected denials are values, never panics; system faults are kept
//!   out of the attempt ledger

pub mod access;
pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod notify;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::service::{ClientContext, CredentialService, Identity, RegisterInput};
pub use error::{AuthError, AuthResult, Outcome};
pub use infra::memory::MemoryAuthRepository;
pub use infra::postgres::PgAuthRepository;

// Re-export kernel error classification for unified handling
pub use kernel::error::ErrorClass;

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::account::Account;
    pub use crate::domain::entity::action_token::{ActionToken, TokenKind};
    pub use crate::domain::entity::attempt::Attempt;
    pub use crate::domain::entity::session::Session;
    pub use crate::domain::value_object::email::EmailAddress;
    pub use crate::domain::value_object::password::{
        CredentialDigest, PasswordPolicy, RawPassword, StrengthValidator,
    };
}

pub mod store {
    pub use crate::infra::postgres::PgAuthRepository as AuthStore;
}
