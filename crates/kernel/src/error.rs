//! Error Class - Classification of denials and faults
//!
//! Defines the [`ErrorClass`] enum, the five-way classification every
//! public credential operation maps its failures onto. The class answers
//! two questions for the calling layer: can the user fix this, and should
//! the failure count against the caller's address.

use serde::Serialize;

/// Classification of a failed operation
///
/// Every denial the credential core returns belongs to exactly one class.
/// The class is coarser than the per-failure code; it drives recovery
/// behavior (retryability, throttling, logging) rather than messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorClass {
    /// Malformed input (email/password/token shape) - user-correctable
    InputInvalid,
    /// Input was well-formed but a policy rejected it (taken email, weak
    /// password, pending token, locked address, inactive account)
    PolicyRejected,
    /// A presented credential did not match
    AuthFailed,
    /// A token or session was absent or past expiry; both conditions are
    /// reported identically to avoid existence leakage
    NotFoundOrExpired,
    /// Storage, hashing or dispatch failure unrelated to user input
    SystemError,
}

impl ErrorClass {
    /// Stable string code for serialization/API
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InputInvalid => "input_invalid",
            Self::PolicyRejected => "policy_rejected",
            Self::AuthFailed => "auth_failed",
            Self::NotFoundOrExpired => "not_found_or_expired",
            Self::SystemError => "system_error",
        }
    }

    /// Whether the user can correct the failure by changing their input
    #[inline]
    pub const fn is_user_correctable(&self) -> bool {
        !matches!(self, Self::SystemError)
    }

    /// Whether the failure is a fault of the system rather than the caller
    ///
    /// System faults are logged by the calling layer and are never treated
    /// as evidence of malicious behavior.
    #[inline]
    pub const fn is_system_fault(&self) -> bool {
        matches!(self, Self::SystemError)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_codes_are_stable() {
        assert_eq!(ErrorClass::InputInvalid.code(), "input_invalid");
        assert_eq!(ErrorClass::PolicyRejected.code(), "policy_rejected");
        assert_eq!(ErrorClass::AuthFailed.code(), "auth_failed");
        assert_eq!(ErrorClass::NotFoundOrExpired.code(), "not_found_or_expired");
        assert_eq!(ErrorClass::SystemError.code(), "system_error");
    }

    #[test]
    fn test_only_system_faults_are_uncorrectable() {
        assert!(ErrorClass::InputInvalid.is_user_correctable());
        assert!(ErrorClass::PolicyRejected.is_user_correctable());
        assert!(ErrorClass::AuthFailed.is_user_correctable());
        assert!(ErrorClass::NotFoundOrExpired.is_user_correctable());
        assert!(!ErrorClass::SystemError.is_user_correctable());
        assert!(ErrorClass::SystemError.is_system_fault());
    }
}
