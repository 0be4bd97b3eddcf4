//! Action Token Store
//!
//! Issues and consumes single-use, typed, expiring tokens for the
//! activation and reset flows, with duplicate-request suppression.

use std::sync::Arc;

use kernel::id::{AccountId, TokenId};
use platform::clock::Clock;
use platform::token::{ACTION_TOKEN_LENGTH, TokenSource, alphanumeric_token};

use crate::application::config::AuthConfig;
use crate::domain::entity::action_token::{ActionToken, TokenKind};
use crate::domain::repository::TokenRepository;
use crate::error::{AuthError, AuthResult};

/// Action token service
pub struct ActionTokens<T>
where
    T: TokenRepository,
{
    repo: Arc<T>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
    source: Arc<dyn TokenSource>,
}

impl<T> ActionTokens<T>
where
    T: TokenRepository,
{
    pub fn new(
        repo: Arc<T>,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
        source: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            repo,
            config,
            clock,
            source,
        }
    }

    /// Issue a fresh token for an `(account, kind)` pair
    ///
    /// Fails with `TokenPending` while a live token exists for the pair;
    /// a stale (expired) token is superseded. The storage layer's unique
    /// constraint on the pair closes the check-then-insert race: a
    /// concurrent insert surfaces as `TokenPending` too.
    pub async fn issue(&self, uid: &AccountId, kind: TokenKind) -> AuthResult<ActionToken> {
        let now = self.clock.now();

        if let Some(existing) = self.repo.find_for_account(uid, kind).await? {
            if !existing.is_expired(now) {
                return Err(AuthError::TokenPending);
            }
            self.repo.delete_by_id(&existing.id).await?;
        }

        let token = ActionToken {
            id: TokenId::new(),
            uid: *uid,
            token: alphanumeric_token(self.source.as_ref(), ACTION_TOKEN_LENGTH),
            kind,
            expire_at: now + self.config.token_ttl(),
        };

        self.repo.insert(&token).await?;

        tracing::debug!(uid = %uid, kind = %kind, "Action token issued");

        Ok(token)
    }

    /// Look up a token by value and kind
    ///
    /// An expired record is deleted on discovery. A found token is NOT
    /// deleted here: the caller revokes it after completing the associated
    /// action, so a failure mid-action does not burn the token.
    pub async fn consume(&self, token: &str, kind: TokenKind) -> AuthResult<ActionToken> {
        if token.len() != ACTION_TOKEN_LENGTH {
            return Err(AuthError::TokenInvalid);
        }

        let record = self
            .repo
            .find_by_token(token, kind)
            .await?
            .ok_or(AuthError::TokenInvalid)?;

        if record.is_expired(self.clock.now()) {
            self.repo.delete_by_id(&record.id).await?;
            return Err(AuthError::TokenExpired);
        }

        Ok(record)
    }

    /// Delete a token by id; idempotent
    pub async fn revoke(&self, id: &TokenId) -> AuthResult<()> {
        self.repo.delete_by_id(id).await?;
        Ok(())
    }

    /// Delete every token belonging to an account
    pub async fn revoke_for_account(&self, uid: &AccountId) -> AuthResult<u64> {
        self.repo.delete_for_account(uid).await
    }

    /// Maintenance sweep deleting all tokens past expiry
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        self.repo.delete_expired(self.clock.now()).await
    }
}
