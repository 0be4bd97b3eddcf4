//! Attempt Entity
//!
//! One recorded failed or suspicious action from an address. Records are
//! append-only; an address is locked when enough unexpired records have
//! accumulated.

use std::net::IpAddr;

use chrono::{DateTime, Utc};

/// Recorded attempt
#[derive(Debug, Clone)]
pub struct Attempt {
    /// Address the attempt originated from
    pub ip: IpAddr,
    /// When the record stops counting against the address
    pub expire_at: DateTime<Utc>,
    /// Freeform diagnostic reason, e.g. `login::INVALID_CREDENTIALS`
    pub note: String,
}

impl Attempt {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expire_at
    }
}
