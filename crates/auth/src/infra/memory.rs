//! In-Memory Repository Implementation
//!
//! A `Mutex`-guarded map-backed implementation of every repository trait.
//! Backs the application-flow tests and embedded/demo deployments; it
//! enforces the same uniqueness rules as the Postgres schema (unique
//! account email, unique `(uid, kind)` token pair).

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use kernel::id::{AccountId, TokenId};
use uuid::Uuid;

use crate::domain::entity::{
    account::Account,
    action_token::{ActionToken, TokenKind},
    attempt::Attempt,
    session::Session,
};
use crate::domain::repository::{
    AccountRepository, AttemptRepository, DirectoryRepository, SessionRepository, TokenRepository,
};
use crate::domain::value_object::{email::EmailAddress, password::CredentialDigest};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    sessions: HashMap<String, Session>,
    tokens: Vec<ActionToken>,
    attempts: Vec<Attempt>,
    roles: Vec<(i16, String)>,
    groups: Vec<(i16, String)>,
}

/// In-memory auth repository
#[derive(Default)]
pub struct MemoryAuthRepository {
    state: Mutex<State>,
}

impl MemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed directory entries (roles)
    pub fn set_roles(&self, roles: Vec<(i16, String)>) {
        self.lock().roles = roles;
    }

    /// Seed directory entries (groups)
    pub fn set_groups(&self, groups: Vec<(i16, String)>) {
        self.lock().groups = groups;
    }

    /// Number of stored attempt records (for tests)
    pub fn attempt_count(&self) -> usize {
        self.lock().attempts.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory repository lock poisoned")
    }
}

impl AccountRepository for MemoryAuthRepository {
    async fn create(&self, account: &Account) -> AuthResult<()> {
        let mut state = self.lock();
        if state
            .accounts
            .values()
            .any(|a| a.email.as_str() == account.email.as_str())
        {
            return Err(AuthError::EmailTaken);
        }
        state
            .accounts
            .insert(*account.account_id.as_uuid(), account.clone());
        Ok(())
    }

    async fn find_by_id(&self, uid: &AccountId) -> AuthResult<Option<Account>> {
        Ok(self.lock().accounts.get(uid.as_uuid()).cloned())
    }

    async fn find_by_email(&self, email: &EmailAddress) -> AuthResult<Option<Account>> {
        Ok(self
            .lock()
            .accounts
            .values()
            .find(|a| a.email.as_str() == email.as_str())
            .cloned())
    }

    async fn email_exists(&self, email: &EmailAddress) -> AuthResult<bool> {
        Ok(self
            .lock()
            .accounts
            .values()
            .any(|a| a.email.as_str() == email.as_str()))
    }

    async fn update_password(&self, uid: &AccountId, digest: &CredentialDigest) -> AuthResult<()> {
        if let Some(account) = self.lock().accounts.get_mut(uid.as_uuid()) {
            account.password_hash = digest.clone();
        }
        Ok(())
    }

    async fn update_email(&self, uid: &AccountId, email: &EmailAddress) -> AuthResult<()> {
        let mut state = self.lock();
        if state
            .accounts
            .values()
            .any(|a| a.email.as_str() == email.as_str() && a.account_id != *uid)
        {
            return Err(AuthError::EmailTaken);
        }
        if let Some(account) = state.accounts.get_mut(uid.as_uuid()) {
            account.email = email.clone();
        }
        Ok(())
    }

    async fn set_active(&self, uid: &AccountId) -> AuthResult<()> {
        if let Some(account) = self.lock().accounts.get_mut(uid.as_uuid()) {
            account.active = true;
        }
        Ok(())
    }

    async fn delete(&self, uid: &AccountId) -> AuthResult<()> {
        self.lock().accounts.remove(uid.as_uuid());
        Ok(())
    }
}

impl SessionRepository for MemoryAuthRepository {
    async fn insert(&self, session: &Session) -> AuthResult<()> {
        self.lock()
            .sessions
            .insert(session.hash.clone(), session.clone());
        Ok(())
    }

    async fn find_by_hash(&self, hash: &str) -> AuthResult<Option<Session>> {
        Ok(self.lock().sessions.get(hash).cloned())
    }

    async fn delete_by_hash(&self, hash: &str) -> AuthResult<u64> {
        Ok(self.lock().sessions.remove(hash).map_or(0, |_| 1))
    }

    async fn delete_for_account(&self, uid: &AccountId) -> AuthResult<u64> {
        let mut state = self.lock();
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.uid != *uid);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.lock();
        let before = state.sessions.len();
        state.sessions.retain(|_, s| !s.is_expired(now));
        Ok((before - state.sessions.len()) as u64)
    }
}

impl TokenRepository for MemoryAuthRepository {
    async fn insert(&self, token: &ActionToken) -> AuthResult<()> {
        let mut state = self.lock();
        if state
            .tokens
            .iter()
            .any(|t| t.uid == token.uid && t.kind == token.kind)
        {
            return Err(AuthError::TokenPending);
        }
        state.tokens.push(token.clone());
        Ok(())
    }

    async fn find_for_account(
        &self,
        uid: &AccountId,
        kind: TokenKind,
    ) -> AuthResult<Option<ActionToken>> {
        Ok(self
            .lock()
            .tokens
            .iter()
            .find(|t| t.uid == *uid && t.kind == kind)
            .cloned())
    }

    async fn find_by_token(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> AuthResult<Option<ActionToken>> {
        Ok(self
            .lock()
            .tokens
            .iter()
            .find(|t| t.token == token && t.kind == kind)
            .cloned())
    }

    async fn delete_by_id(&self, id: &TokenId) -> AuthResult<u64> {
        let mut state = self.lock();
        let before = state.tokens.len();
        state.tokens.retain(|t| t.id != *id);
        Ok((before - state.tokens.len()) as u64)
    }

    async fn delete_for_account(&self, uid: &AccountId) -> AuthResult<u64> {
        let mut state = self.lock();
        let before = state.tokens.len();
        state.tokens.retain(|t| t.uid != *uid);
        Ok((before - state.tokens.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.lock();
        let before = state.tokens.len();
        state.tokens.retain(|t| !t.is_expired(now));
        Ok((before - state.tokens.len()) as u64)
    }
}

impl AttemptRepository for MemoryAuthRepository {
    async fn insert(&self, attempt: &Attempt) -> AuthResult<()> {
        self.lock().attempts.push(attempt.clone());
        Ok(())
    }

    async fn count_for_ip(&self, ip: IpAddr) -> AuthResult<u32> {
        Ok(self.lock().attempts.iter().filter(|a| a.ip == ip).count() as u32)
    }

    async fn delete_expired(&self, now: DateTime<Utc>, ip: Option<IpAddr>) -> AuthResult<u64> {
        let mut state = self.lock();
        let before = state.attempts.len();
        state
            .attempts
            .retain(|a| !a.is_expired(now) || ip.is_some_and(|ip| a.ip != ip));
        Ok((before - state.attempts.len()) as u64)
    }
}

impl DirectoryRepository for MemoryAuthRepository {
    async fn role_entries(&self) -> AuthResult<Vec<(i16, String)>> {
        Ok(self.lock().roles.clone())
    }

    async fn group_entries(&self) -> AuthResult<Vec<(i16, String)>> {
        Ok(self.lock().groups.clone())
    }
}
