//! Action Token Entity
//!
//! Single-use, typed, time-limited tokens authorizing one specific state
//! change (account activation, password reset). At most one live token
//! exists per `(account, kind)` pair at any time.

use chrono::{DateTime, Utc};
use kernel::id::{AccountId, TokenId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the token authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// Confirms ownership of the registered email address
    Activation,
    /// Authorizes a one-time password reset
    Reset,
}

impl TokenKind {
    /// Get string code for database storage
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Reset => "reset",
        }
    }

    /// Create from string code
    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "activation" => Some(Self::Activation),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Action token entity
#[derive(Debug, Clone)]
pub struct ActionToken {
    pub id: TokenId,
    /// Account the token was issued for
    pub uid: AccountId,
    /// The 20-character alphanumeric token itself
    pub token: String,
    pub kind: TokenKind,
    /// Expiration instant
    pub expire_at: DateTime<Utc>,
}

impl ActionToken {
    /// Check if the token has expired
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expire_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_roundtrip() {
        assert_eq!(TokenKind::from_code("activation"), Some(TokenKind::Activation));
        assert_eq!(TokenKind::from_code("reset"), Some(TokenKind::Reset));
        assert_eq!(TokenKind::from_code("other"), None);
        assert_eq!(TokenKind::Activation.code(), "activation");
        assert_eq!(TokenKind::Reset.code(), "reset");
    }
}
