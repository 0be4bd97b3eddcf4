//! Account Entity
//!
//! The account row as the credential core sees it. The wider user profile
//! is owned by the application's user store; the core only reads and
//! writes the credential-relevant fields.

use chrono::{DateTime, Utc};
use kernel::id::AccountId;

use crate::domain::value_object::{email::EmailAddress, password::CredentialDigest};

/// Account entity
#[derive(Debug, Clone)]
pub struct Account {
    /// Internal UUID identifier
    pub account_id: AccountId,
    /// Email address (unique across active and inactive accounts)
    pub email: EmailAddress,
    /// Hashed password
    pub password_hash: CredentialDigest,
    /// Whether the account has been activated
    pub active: bool,
    /// Role id, consumed read-only by the access directory
    pub role_id: i16,
    /// Group id, consumed read-only by the access directory
    pub group_id: i16,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account
    ///
    /// Timestamps are supplied by the caller so entity construction stays
    /// deterministic under test.
    pub fn new(
        email: EmailAddress,
        password_hash: CredentialDigest,
        active: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id: AccountId::new(),
            email,
            password_hash,
            active,
            role_id: 0,
            group_id: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the account active
    pub fn activate(&mut self, now: DateTime<Utc>) {
        self.active = true;
        self.updated_at = now;
    }

    /// Replace the stored password digest
    pub fn set_password(&mut self, digest: CredentialDigest, now: DateTime<Utc>) {
        self.password_hash = digest;
        self.updated_at = now;
    }

    /// Replace the email address
    pub fn set_email(&mut self, email: EmailAddress, now: DateTime<Utc>) {
        self.email = email;
        self.updated_at = now;
    }
}
