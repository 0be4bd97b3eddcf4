//! Password Value Objects
//!
//! Domain wrappers around `platform::password`. [`RawPassword`] applies the
//! configured policy (minimum length, optional strength-score floor) on top
//! of the platform's structural checks; [`CredentialDigest`] is the stored
//! form and carries the rehash-on-verify behavior.

use std::fmt;

use platform::password::{ClearTextPassword, HashedPassword, HashingCost, PasswordShapeError};
use thiserror::Error;

/// Pluggable password strength scorer (0 weakest ..= 4 strongest)
///
/// The scoring algorithm itself is an external collaborator; the core only
/// compares the score against the configured floor.
pub trait StrengthValidator: Send + Sync {
    fn score(&self, password: &str) -> u8;
}

/// Password policy applied at the domain boundary
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    /// Minimum length in Unicode code points
    pub min_length: usize,
    /// Minimum strength score; `None` disables strength scoring
    pub min_score: Option<u8>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            min_score: None,
        }
    }
}

/// Password policy rejection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordRejection {
    #[error("Password must be at least {min} characters")]
    TooShort { min: usize },

    #[error(transparent)]
    Shape(#[from] PasswordShapeError),

    #[error("Password is too weak (scored {score}, need {floor})")]
    TooWeak { score: u8, floor: u8 },
}

/// Raw password from user input, validated against the policy
///
/// Memory is automatically zeroized when dropped.
pub struct RawPassword(ClearTextPassword);

impl RawPassword {
    /// Validate a candidate password against the policy
    ///
    /// Checks run in a fixed order so rejections are deterministic:
    /// structural shape, minimum length, then the optional strength score.
    pub fn parse(
        raw: String,
        policy: &PasswordPolicy,
        validator: Option<&dyn StrengthValidator>,
    ) -> Result<Self, PasswordRejection> {
        let clear_text = ClearTextPassword::new(raw)?;

        if clear_text.char_count() < policy.min_length {
            return Err(PasswordRejection::TooShort {
                min: policy.min_length,
            });
        }

        if let (Some(floor), Some(validator)) = (policy.min_score, validator) {
            let score = validator.score(clear_text.as_str());
            if score < floor {
                return Err(PasswordRejection::TooWeak { score, floor });
            }
        }

        Ok(Self(clear_text))
    }

    pub(crate) fn inner(&self) -> &ClearTextPassword {
        &self.0
    }
}

impl fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPassword").field(&"[REDACTED]").finish()
    }
}

/// Result of a verification that may opportunistically upgrade the digest
#[derive(Debug)]
pub enum Verification {
    /// Password did not match
    Rejected,
    /// Password matched; the stored digest is at the configured cost
    Valid,
    /// Password matched and the stored digest is stale; the caller is
    /// responsible for persisting the replacement
    ValidNeedsUpgrade(CredentialDigest),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Verification::Rejected)
    }
}

/// Stored password digest (PHC string)
///
/// Safe to persist and to print in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialDigest(HashedPassword);

impl CredentialDigest {
    /// Hash a validated raw password at the given cost
    pub fn from_raw(raw: &RawPassword, cost: &HashingCost) -> Result<Self, String> {
        raw.inner()
            .hash(cost)
            .map(Self)
            .map_err(|e| e.to_string())
    }

    /// Create from PHC string (from database)
    pub fn from_phc_string(phc_string: impl Into<String>) -> Result<Self, String> {
        HashedPassword::from_phc_string(phc_string)
            .map(Self)
            .map_err(|e| e.to_string())
    }

    /// Get PHC string for database storage
    pub fn as_phc_string(&self) -> &str {
        self.0.as_phc_string()
    }

    /// Verify a raw password against this digest
    pub fn verify(&self, raw: &RawPassword) -> bool {
        self.0.verify(raw.inner())
    }

    /// Check if the digest was produced at a different work factor
    pub fn needs_rehash(&self, cost: &HashingCost) -> bool {
        self.0.needs_rehash(cost)
    }

    /// Verify and, on success, recompute a stale digest at `cost`
    ///
    /// The upgrade never changes the verification result; a failed rehash
    /// is reported as plain `Valid` and left for the next verification.
    pub fn verify_and_maybe_upgrade(&self, raw: &RawPassword, cost: &HashingCost) -> Verification {
        if !self.verify(raw) {
            return Verification::Rejected;
        }

        if self.needs_rehash(cost) {
            match Self::from_raw(raw, cost) {
                Ok(upgraded) => return Verification::ValidNeedsUpgrade(upgraded),
                Err(e) => {
                    tracing::warn!(error = %e, "Digest upgrade failed; keeping stale digest");
                }
            }
        }

        Verification::Valid
    }
}

impl fmt::Debug for CredentialDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialDigest")
            .field("hash", &"[HASH]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: HashingCost = HashingCost::minimal();

    fn policy(min_length: usize, min_score: Option<u8>) -> PasswordPolicy {
        PasswordPolicy {
            min_length,
            min_score,
        }
    }

    struct FixedScore(u8);

    impl StrengthValidator for FixedScore {
        fn score(&self, _password: &str) -> u8 {
            self.0
        }
    }

    #[test]
    fn test_min_length_policy() {
        let result = RawPassword::parse("short".to_string(), &policy(8, None), None);
        assert_eq!(result.unwrap_err(), PasswordRejection::TooShort { min: 8 });

        assert!(RawPassword::parse("long enough".to_string(), &policy(8, None), None).is_ok());
    }

    #[test]
    fn test_strength_floor() {
        let weak = FixedScore(1);
        let result = RawPassword::parse(
            "correct horse battery".to_string(),
            &policy(8, Some(3)),
            Some(&weak),
        );
        assert_eq!(
            result.unwrap_err(),
            PasswordRejection::TooWeak { score: 1, floor: 3 }
        );

        let strong = FixedScore(4);
        assert!(
            RawPassword::parse(
                "correct horse battery".to_string(),
                &policy(8, Some(3)),
                Some(&strong),
            )
            .is_ok()
        );
    }

    #[test]
    fn test_strength_skipped_without_floor() {
        let weak = FixedScore(0);
        assert!(
            RawPassword::parse("long enough".to_string(), &policy(8, None), Some(&weak)).is_ok()
        );
    }

    #[test]
    fn test_verify_and_maybe_upgrade() {
        let raw = RawPassword::parse("TestPassword123!".to_string(), &policy(8, None), None)
            .unwrap();
        let old_cost = TEST_COST;
        let digest = CredentialDigest::from_raw(&raw, &old_cost).unwrap();

        // Same cost: plain valid
        assert!(matches!(
            digest.verify_and_maybe_upgrade(&raw, &old_cost),
            Verification::Valid
        ));

        // Stronger configured cost: upgrade offered, original digest untouched
        let new_cost = HashingCost::new(old_cost.m_cost, old_cost.t_cost + 1, old_cost.p_cost);
        match digest.verify_and_maybe_upgrade(&raw, &new_cost) {
            Verification::ValidNeedsUpgrade(upgraded) => {
                assert!(!upgraded.needs_rehash(&new_cost));
                assert!(upgraded.verify(&raw));
                // The old digest value still verifies (caller re-reads)
                assert!(digest.verify(&raw));
            }
            other => panic!("expected upgrade, got {:?}", other),
        }

        // Wrong password: rejected regardless of staleness
        let wrong = RawPassword::parse("WrongPassword123!".to_string(), &policy(8, None), None)
            .unwrap();
        assert!(matches!(
            digest.verify_and_maybe_upgrade(&wrong, &new_cost),
            Verification::Rejected
        ));
    }

    #[test]
    fn test_debug_redaction() {
        let raw =
            RawPassword::parse("SecretPassword1!".to_string(), &policy(8, None), None).unwrap();
        let debug = format!("{:?}", raw);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("Secret"));
    }
}
