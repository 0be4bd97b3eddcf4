//! Session Vault
//!
//! Bearer-token session issuance, validation, sliding renewal and
//! revocation. Tokens are fixed-length unpredictable strings; a keyed
//! integrity tag stored with each row detects tampering or forgery
//! independent of how the token traveled.

use std::net::IpAddr;
use std::sync::Arc;

use base64::Engine;
use hmac::{Hmac, Mac};
use kernel::id::AccountId;
use platform::clock::Clock;
use platform::crypto::constant_time_eq;
use platform::token::{SESSION_HASH_LENGTH, TokenSource, session_hash};
use sha2::Sha256;

use crate::application::config::AuthConfig;
use crate::domain::entity::session::Session;
use crate::domain::repository::SessionRepository;
use crate::error::{AuthError, AuthResult};

/// Result of a successful validation
#[derive(Debug, Clone)]
pub struct SessionCheck {
    /// The live session; after a renewal this carries the replacement token
    pub session: Session,
    /// True when sliding renewal rotated the token; the caller must
    /// propagate `session.hash` to the transport layer
    pub renewed: bool,
}

/// Session vault service
pub struct SessionVault<S>
where
    S: SessionRepository,
{
    repo: Arc<S>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
    source: Arc<dyn TokenSource>,
}

impl<S> SessionVault<S>
where
    S: SessionRepository,
{
    pub fn new(
        repo: Arc<S>,
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

    /// Create a session for an account
    ///
    /// When concurrent sessions are disallowed, every other session of the
    /// account is evicted first.
    pub async fn create(
        &self,
        uid: &AccountId,
        remember: bool,
        ip: IpAddr,
        user_agent: Option<String>,
    ) -> AuthResult<Session> {
        if !self.config.allow_concurrent_sessions {
            self.repo.delete_for_account(uid).await?;
        }

        let now = self.clock.now();
        let hash = session_hash(self.source.as_ref());
        let session = Session {
            integrity_tag: self.integrity_tag(&hash),
            hash,
            uid: *uid,
            expire_at: now + self.config.session_ttl(remember),
            bound_ip: ip,
            user_agent,
            created_at: now,
        };

        self.repo.insert(&session).await?;

        tracing::info!(uid = %uid, remembered = remember, "Session created");

        Ok(session)
    }

    /// Validate a presented token from a caller address
    ///
    /// Failure order: token shape, record lookup, expiry (record deleted on
    /// discovery), address binding (record kept - a moved address is a
    /// transport anomaly, not a compromise), integrity tag. On success a
    /// session inside the renewal window is deleted and replaced by a fresh
    /// short-lived one.
    pub async fn validate(&self, token: &str, caller_ip: IpAddr) -> AuthResult<SessionCheck> {
        if token.len() != SESSION_HASH_LENGTH {
            return Err(AuthError::SessionInvalid);
        }

        let session = self
            .repo
            .find_by_hash(token)
            .await?
            .ok_or(AuthError::SessionInvalid)?;

        let now = self.clock.now();

        if session.is_expired(now) {
            self.repo.delete_by_hash(token).await?;
            return Err(AuthError::SessionExpired);
        }

        if session.bound_ip != caller_ip {
            return Err(AuthError::SessionIpMismatch);
        }

        let expected = self.integrity_tag(&session.hash);
        if !constant_time_eq(expected.as_bytes(), session.integrity_tag.as_bytes()) {
            return Err(AuthError::SessionTampered);
        }

        if session.remaining(now) < self.config.renew_window() {
            // Sliding renewal: the replacement is always a short-lived
            // session, whatever the original remember flag was.
            self.repo.delete_by_hash(token).await?;
            let renewed = self
                .create(&session.uid, false, caller_ip, session.user_agent.clone())
                .await?;

            tracing::debug!(uid = %session.uid, "Session renewed");

            return Ok(SessionCheck {
                session: renewed,
                renewed: true,
            });
        }

        Ok(SessionCheck {
            session,
            renewed: false,
        })
    }

    /// Delete one session; idempotent, tolerates malformed tokens
    pub async fn destroy(&self, token: &str) -> AuthResult<()> {
        if token.len() != SESSION_HASH_LENGTH {
            return Ok(());
        }
        self.repo.delete_by_hash(token).await?;
        Ok(())
    }

    /// Delete every session of an account; returns the count removed
    pub async fn destroy_all_for_account(&self, uid: &AccountId) -> AuthResult<u64> {
        let deleted = self.repo.delete_for_account(uid).await?;
        tracing::info!(uid = %uid, deleted = deleted, "All sessions destroyed");
        Ok(deleted)
    }

    /// Maintenance sweep deleting all sessions past expiry
    pub async fn purge_expired(&self) -> AuthResult<u64> {
        self.repo.delete_expired(self.clock.now()).await
    }

    /// Keyed digest binding a token to the site secret
    fn integrity_tag(&self, hash: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.config.site_secret)
            .expect("HMAC can take key of any size");
        mac.update(hash.as_bytes());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}
