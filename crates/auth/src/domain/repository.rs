//! Repository Traits
//!
//! Interfaces for data persistence. Implementations are in the
//! infrastructure layer; each call is assumed transactional on its own.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use kernel::id::{AccountId, TokenId};

use crate::domain::entity::{
    account::Account,
    action_token::{ActionToken, TokenKind},
    attempt::Attempt,
    session::Session,
};
use crate::domain::value_object::{email::EmailAddress, password::CredentialDigest};
use crate::error::AuthResult;

/// Account repository trait
#[trait_variant::make(AccountRepository: Send)]
pub trait LocalAccountRepository {
    /// Create a new account; fails with `EmailTaken` on a duplicate email
    async fn create(&self, account: &Account) -> AuthResult<()>;

    /// Find account by ID
    async fn find_by_id(&self, uid: &AccountId) -> AuthResult<Option<Account>>;

    /// Find account by email
    async fn find_by_email(&self, email: &EmailAddress) -> AuthResult<Option<Account>>;

    /// Check if an email is taken, counting inactive accounts
    async fn email_exists(&self, email: &EmailAddress) -> AuthResult<bool>;

    /// Replace the stored password digest
    async fn update_password(&self, uid: &AccountId, digest: &CredentialDigest) -> AuthResult<()>;

    /// Replace the stored email address
    async fn update_email(&self, uid: &AccountId, email: &EmailAddress) -> AuthResult<()>;

    /// Mark the account active
    async fn set_active(&self, uid: &AccountId) -> AuthResult<()>;

    /// Delete the account row
    async fn delete(&self, uid: &AccountId) -> AuthResult<()>;
}

/// Session repository trait
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    /// Persist a new session
    async fn insert(&self, session: &Session) -> AuthResult<()>;

    /// Find a session by its bearer token
    async fn find_by_hash(&self, hash: &str) -> AuthResult<Option<Session>>;

    /// Delete one session; returns rows affected (idempotent)
    async fn delete_by_hash(&self, hash: &str) -> AuthResult<u64>;

    /// Delete all sessions for an account; returns rows affected
    async fn delete_for_account(&self, uid: &AccountId) -> AuthResult<u64>;

    /// Delete all sessions past expiry
    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// Action token repository trait
#[trait_variant::make(TokenRepository: Send)]
pub trait LocalTokenRepository {
    /// Persist a new token; the storage layer enforces uniqueness on
    /// `(uid, kind)` and fails with `TokenPending` on conflict
    async fn insert(&self, token: &ActionToken) -> AuthResult<()>;

    /// Find the token for an `(account, kind)` pair, expired or not
    async fn find_for_account(
        &self,
        uid: &AccountId,
        kind: TokenKind,
    ) -> AuthResult<Option<ActionToken>>;

    /// Find a token by its value and kind
    async fn find_by_token(&self, token: &str, kind: TokenKind)
    -> AuthResult<Option<ActionToken>>;

    /// Delete one token by id; returns rows affected (idempotent)
    async fn delete_by_id(&self, id: &TokenId) -> AuthResult<u64>;

    /// Delete all tokens for an account; returns rows affected
    async fn delete_for_account(&self, uid: &AccountId) -> AuthResult<u64>;

    /// Delete all tokens past expiry
    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// Attempt repository trait
#[trait_variant::make(AttemptRepository: Send)]
pub trait LocalAttemptRepository {
    /// Append a record; no uniqueness constraint
    async fn insert(&self, attempt: &Attempt) -> AuthResult<()>;

    /// Count records for an address (expired records included; purge first)
    async fn count_for_ip(&self, ip: IpAddr) -> AuthResult<u32>;

    /// Delete expired records, for one address or all of them
    async fn delete_expired(&self, now: DateTime<Utc>, ip: Option<IpAddr>) -> AuthResult<u64>;
}

/// Read-only role/group entries for the access directory
#[trait_variant::make(DirectoryRepository: Send)]
pub trait LocalDirectoryRepository {
    /// Active role entries as `(id, name)` pairs
    async fn role_entries(&self) -> AuthResult<Vec<(i16, String)>>;

    /// Active group entries as `(id, name)` pairs
    async fn group_entries(&self) -> AuthResult<Vec<(i16, String)>>;
}
