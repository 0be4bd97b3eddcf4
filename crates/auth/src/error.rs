//! Auth Error Types
//!
//! One error enum covers every expected denial and every system fault the
//! credential core can produce. Expected denials are values, never panics:
//! each maps to a stable [`code`](AuthError::code) for the uniform result
//! shape and to a kernel [`ErrorClass`] for recovery behavior.

use kernel::error::ErrorClass;
use serde::Serialize;
use thiserror::Error;

use crate::notify::DispatchError;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Caller's address has hit the mitigation threshold
    #[error("Too many failed attempts from this address")]
    IpLocked,

    /// Email address is malformed
    #[error("Invalid email address")]
    EmailInvalid,

    /// Email address is already registered
    #[error("Email address already in use")]
    EmailTaken,

    /// Password fails shape or minimum-length policy
    #[error("Password does not meet the minimum requirements")]
    PasswordInvalid,

    /// Password scored below the configured strength floor
    #[error("Password is too weak")]
    PasswordWeak,

    /// Password and confirmation do not match
    #[error("Passwords do not match")]
    ConfirmationMismatch,

    /// Unknown account or wrong password; deliberately indistinguishable
    #[error("Invalid credentials")]
    CredentialsInvalid,

    /// No account for the given identifier
    #[error("Account not found")]
    AccountNotFound,

    /// Account exists but has not been activated
    #[error("Account is not activated")]
    AccountInactive,

    /// Activation was requested for an already-active account
    #[error("Account is already activated")]
    AccountAlreadyActive,

    /// New password is identical to the current one
    #[error("New password matches the current password")]
    PasswordReused,

    /// A live token already exists for this account and purpose
    #[error("A pending request of this kind already exists")]
    TokenPending,

    /// Token is malformed or no record exists
    #[error("Token not found")]
    TokenInvalid,

    /// Token record exists but is past expiry
    #[error("Token expired")]
    TokenExpired,

    /// Session token is malformed or no record exists
    #[error("Session not found or expired")]
    SessionInvalid,

    /// Session record exists but is past expiry
    #[error("Session not found or expired")]
    SessionExpired,

    /// Session presented from an address other than the one it is bound to
    #[error("Session address mismatch")]
    SessionIpMismatch,

    /// Stored integrity tag does not match the presented token
    #[error("Session integrity check failed")]
    SessionTampered,

    /// Outbound notification could not be delivered
    #[error("Notification dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// Database error
    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the kernel error class for this error
    pub fn class(&self) -> ErrorClass {
        use AuthError::*;
        match self {
            EmailInvalid | PasswordInvalid => ErrorClass::InputInvalid,
            IpLocked | EmailTaken | PasswordWeak | ConfirmationMismatch | AccountNotFound
            | AccountInactive | AccountAlreadyActive | PasswordReused | TokenPending => {
                ErrorClass::PolicyRejected
            }
            CredentialsInvalid | SessionIpMismatch | SessionTampered => ErrorClass::AuthFailed,
            TokenInvalid | TokenExpired | SessionInvalid | SessionExpired => {
                ErrorClass::NotFoundOrExpired
            }
            Dispatch(_) | Storage(_) | Internal(_) => ErrorClass::SystemError,
        }
    }

    /// Stable code for the uniform result shape
    ///
    /// Absent and expired tokens/sessions collapse to one code so the
    /// response does not leak whether a record ever existed.
    pub fn code(&self) -> &'static str {
        use AuthError::*;
        match self {
            IpLocked => "IP_LOCKED",
            EmailInvalid => "EMAIL_INVALID",
            EmailTaken => "EMAIL_TAKEN",
            PasswordInvalid => "PASSWORD_INVALID",
            PasswordWeak => "PASSWORD_WEAK",
            ConfirmationMismatch => "CONFIRMATION_MISMATCH",
            CredentialsInvalid => "INVALID_CREDENTIALS",
            AccountNotFound => "ACCOUNT_NOT_FOUND",
            AccountInactive => "ACCOUNT_INACTIVE",
            AccountAlreadyActive => "ALREADY_ACTIVE",
            PasswordReused => "PASSWORD_REUSED",
            TokenPending => "TOKEN_PENDING",
            TokenInvalid | TokenExpired => "TOKEN_INVALID",
            SessionInvalid | SessionExpired => "SESSION_INVALID",
            SessionIpMismatch => "SESSION_IP_MISMATCH",
            SessionTampered => "SESSION_TAMPERED",
            Dispatch(_) => "DISPATCH_FAILED",
            Storage(_) | Internal(_) => "SYSTEM_ERROR",
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            AuthError::Storage(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::Dispatch(e) => {
                tracing::error!(error = %e, "Auth dispatch error");
            }
            AuthError::SessionTampered => {
                tracing::warn!("Session integrity tag mismatch detected");
            }
            AuthError::SessionIpMismatch => {
                tracing::warn!("Session address mismatch detected");
            }
            AuthError::CredentialsInvalid => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::IpLocked => {
                tracing::warn!("Request from locked address");
            }
            _ => {
                tracing::debug!(error = %self, "Auth denial");
            }
        }
    }
}

/// Uniform result shape for application layers
///
/// Expected failures are never surfaced as faults; they become a
/// serializable outcome with a stable code.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub failed: bool,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Outcome {
    /// Successful outcome without a token payload
    pub fn ok() -> Self {
        Self {
            failed: false,
            code: "OK",
            token: None,
        }
    }

    /// Successful outcome carrying an issued token
    pub fn ok_with_token(token: impl Into<String>) -> Self {
        Self {
            failed: false,
            code: "OK",
            token: Some(token.into()),
        }
    }

    /// Failed outcome from an error
    pub fn denied(err: &AuthError) -> Self {
        Self {
            failed: true,
            code: err.code(),
            token: None,
        }
    }
}

impl From<&AuthResult<()>> for Outcome {
    fn from(result: &AuthResult<()>) -> Self {
        match result {
            Ok(()) => Outcome::ok(),
            Err(e) => Outcome::denied(e),
        }
    }
}
