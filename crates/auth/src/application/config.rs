//! Application Configuration
//!
//! One immutable configuration struct passed to each component at
//! construction; there is no ambient/global lookup.

use std::time::Duration;

use platform::password::HashingCost;
use platform::rate_limit::MitigationPolicy;
use platform::token::{OsTokenSource, TokenSource};

use crate::domain::value_object::password::PasswordPolicy;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Site secret keying session integrity tags (32 bytes)
    pub site_secret: [u8; 32],
    /// Session TTL with "Remember Me" (30 days)
    pub session_ttl_remembered: Duration,
    /// Session TTL without "Remember Me" (30 minutes)
    pub session_ttl_short: Duration,
    /// Remaining lifetime below which validation rotates the token
    pub session_renew_window: Duration,
    /// Whether an account may hold several sessions at once
    pub allow_concurrent_sessions: bool,
    /// Action token TTL (10 minutes)
    pub token_ttl: Duration,
    /// Attempt throttling policy
    pub mitigation: MitigationPolicy,
    /// Password policy for newly set passwords
    pub password_policy: PasswordPolicy,
    /// Work factor for newly computed digests
    pub hashing_cost: HashingCost,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            site_secret: [0u8; 32],
            session_ttl_remembered: Duration::from_secs(30 * 24 * 3600),
            session_ttl_short: Duration::from_secs(30 * 60),
            session_renew_window: Duration::from_secs(5 * 60),
            allow_concurrent_sessions: false,
            token_ttl: Duration::from_secs(10 * 60),
            mitigation: MitigationPolicy::default(),
            password_policy: PasswordPolicy::default(),
            hashing_cost: HashingCost::default(),
        }
    }
}

impl AuthConfig {
    /// Create config with a random site secret (for development)
    pub fn with_random_secret() -> Self {
        let mut secret = [0u8; 32];
        OsTokenSource.fill_bytes(&mut secret);
        Self {
            site_secret: secret,
            ..Default::default()
        }
    }

    /// Session TTL for the given remember flag
    pub fn session_ttl(&self, remember: bool) -> chrono::Duration {
        let ttl = if remember {
            self.session_ttl_remembered
        } else {
            self.session_ttl_short
        };
        chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(30))
    }

    /// Renewal window as a chrono duration
    pub fn renew_window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.session_renew_window)
            .unwrap_or_else(|_| chrono::Duration::minutes(5))
    }

    /// Action token TTL as a chrono duration
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.token_ttl)
            .unwrap_or_else(|_| chrono::Duration::minutes(10))
    }
}
