//! Session Entity
//!
//! A bearer session: an unpredictable fixed-length token bound to the
//! address it was issued to, with a keyed integrity tag stored alongside
//! so a forged or tampered row is detectable independent of transport.

use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use kernel::id::AccountId;

/// Session entity
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque bearer token, 40 lowercase hex characters
    pub hash: String,
    /// Account this session belongs to
    pub uid: AccountId,
    /// Expiration instant
    pub expire_at: DateTime<Utc>,
    /// Address the session is bound to
    pub bound_ip: IpAddr,
    /// User agent at creation (for session-management display)
    pub user_agent: Option<String>,
    /// Keyed digest of `hash` under the site secret
    pub integrity_tag: String,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expire_at
    }

    /// Remaining lifetime, saturating at zero
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expire_at - now).max(Duration::zero())
    }
}
