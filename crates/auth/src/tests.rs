//! Flow tests for the credential core
//!
//! Every public pipeline is exercised end to end against the in-memory
//! repository with a manually advanced clock, so expiry, renewal and
//! lockout behavior is deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use kernel::id::AccountId;
use platform::clock::{Clock, ManualClock};
use platform::password::HashingCost;
use platform::token::{OsTokenSource, SESSION_HASH_LENGTH, TokenSource};

use crate::access::{Directory, Selector};
use crate::application::attempts::AttemptLedger;
use crate::application::config::AuthConfig;
use crate::application::service::{ClientContext, CredentialService, RegisterInput};
use crate::application::sessions::SessionVault;
use crate::application::tokens::ActionTokens;
use crate::domain::entity::action_token::TokenKind;
use crate::domain::repository::{AccountRepository, DirectoryRepository, TokenRepository};
use crate::domain::value_object::email::EmailAddress;
use crate::domain::value_object::password::{PasswordPolicy, RawPassword, StrengthValidator};
use crate::error::AuthError;
use crate::infra::memory::MemoryAuthRepository;
use crate::notify::{DispatchError, MailComposer, MailDraft, Notifier};

// ============================================================================
// Test fixtures
// ============================================================================

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<MailDraft>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    fn fail_next_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Token carried by the most recent message (the composer puts the
    /// bare token in the body)
    fn last_token(&self) -> String {
        self.sent
            .lock()
            .unwrap()
            .last()
            .expect("no message dispatched")
            .body
            .clone()
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, _to: &EmailAddress, draft: &MailDraft) -> Result<(), DispatchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError("relay unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(draft.clone());
        Ok(())
    }
}

struct BareComposer;

impl MailComposer for BareComposer {
    fn compose(&self, kind: TokenKind, token: &str) -> MailDraft {
        MailDraft {
            subject: format!("{} request", kind),
            body: token.to_string(),
        }
    }
}

struct FixedScore(u8);

impl StrengthValidator for FixedScore {
    fn score(&self, _password: &str) -> u8 {
        self.0
    }
}

type MemService = CredentialService<
    MemoryAuthRepository,
    MemoryAuthRepository,
    MemoryAuthRepository,
    MemoryAuthRepository,
    RecordingNotifier,
>;

struct Harness {
    repo: Arc<MemoryAuthRepository>,
    clock: Arc<ManualClock>,
    notifier: Arc<RecordingNotifier>,
    service: MemService,
}

fn base_config() -> AuthConfig {
    AuthConfig {
        site_secret: [7u8; 32],
        hashing_cost: HashingCost::minimal(),
        ..Default::default()
    }
}

fn build(
    config: AuthConfig,
    repo: Arc<MemoryAuthRepository>,
    clock: Arc<ManualClock>,
) -> Harness {
    let config = Arc::new(config);
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let source: Arc<dyn TokenSource> = Arc::new(OsTokenSource);
    let notifier = Arc::new(RecordingNotifier::default());

    let sessions = SessionVault::new(
        repo.clone(),
        config.clone(),
        clock_dyn.clone(),
        source.clone(),
    );
    let tokens = ActionTokens::new(
        repo.clone(),
        config.clone(),
        clock_dyn.clone(),
        source.clone(),
    );
    let attempts = AttemptLedger::new(repo.clone(), config.mitigation, clock_dyn.clone());

    let service = CredentialService::new(
        repo.clone(),
        sessions,
        tokens,
        attempts,
        notifier.clone(),
        Arc::new(BareComposer),
        config,
        clock_dyn,
    );

    Harness {
        repo,
        clock,
        notifier,
        service,
    }
}

fn harness() -> Harness {
    harness_with(base_config())
}

fn harness_with(config: AuthConfig) -> Harness {
    build(
        config,
        Arc::new(MemoryAuthRepository::new()),
        Arc::new(ManualClock::new(Utc::now())),
    )
}

fn ctx(ip: &str) -> ClientContext {
    ClientContext::new(ip.parse().unwrap(), Some("flow-tests/1.0".to_string()))
}

fn input(email: &str, password: &str) -> RegisterInput {
    RegisterInput {
        email: email.to_string(),
        password: password.to_string(),
        confirm: password.to_string(),
        role_id: None,
        group_id: None,
    }
}

async fn register_active(h: &Harness, email: &str, password: &str) -> AccountId {
    h.service
        .register(input(email, password), false, &ctx("9.9.9.9"))
        .await
        .expect("registration failed")
        .uid
}

// ============================================================================
// Login and sessions
// ============================================================================

#[tokio::test]
async fn test_register_login_validate() {
    let h = harness();
    register_active(&h, "user@example.com", "correct horse battery").await;

    let session = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    assert_eq!(session.hash.len(), SESSION_HASH_LENGTH);

    let check = h
        .service
        .check_session(&session.hash, &ctx("1.2.3.4"))
        .await
        .unwrap();
    assert!(!check.renewed);
    assert_eq!(check.session.hash, session.hash);
}

#[tokio::test]
async fn test_unknown_account_and_wrong_password_are_indistinguishable() {
    let h = harness();
    register_active(&h, "user@example.com", "correct horse battery").await;

    let unknown = h
        .service
        .login(
            "ghost@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap_err();
    let wrong = h
        .service
        .login(
            "user@example.com",
            "not the password".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap_err();

    assert_eq!(unknown.code(), "INVALID_CREDENTIALS");
    assert_eq!(unknown.code(), wrong.code());
    // Both denials counted against the address
    assert_eq!(h.repo.attempt_count(), 2);
}

#[tokio::test]
async fn test_inactive_account_cannot_login() {
    let h = harness();
    h.service
        .register(
            input("new@example.com", "correct horse battery"),
            true,
            &ctx("9.9.9.9"),
        )
        .await
        .unwrap();

    let err = h
        .service
        .login(
            "new@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountInactive));
}

#[tokio::test]
async fn test_session_is_ip_bound() {
    let h = harness();
    register_active(&h, "user@example.com", "correct horse battery").await;
    let session = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    let err = h
        .service
        .check_session(&session.hash, &ctx("5.6.7.8"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::SessionIpMismatch));

    // The anomaly does not burn the session
    assert!(
        h.service
            .check_session(&session.hash, &ctx("1.2.3.4"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_expired_session_is_deleted_on_discovery() {
    let h = harness();
    register_active(&h, "user@example.com", "correct horse battery").await;
    let session = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(31));

    let first = h
        .service
        .check_session(&session.hash, &ctx("1.2.3.4"))
        .await
        .unwrap_err();
    assert!(matches!(first, AuthError::SessionExpired));

    // Record is gone now; a replay can no longer tell it ever existed
    let second = h
        .service
        .check_session(&session.hash, &ctx("1.2.3.4"))
        .await
        .unwrap_err();
    assert!(matches!(second, AuthError::SessionInvalid));
    assert_eq!(first.code(), second.code());
}

#[tokio::test]
async fn test_sliding_renewal_rotates_token() {
    let h = harness();
    register_active(&h, "user@example.com", "correct horse battery").await;
    let session = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    // Inside the renewal window (30 min TTL, 5 min window)
    h.clock.advance(Duration::minutes(26));

    let check = h
        .service
        .check_session(&session.hash, &ctx("1.2.3.4"))
        .await
        .unwrap();
    assert!(check.renewed);
    assert_ne!(check.session.hash, session.hash);

    // The old token is gone
    let err = h
        .service
        .check_session(&session.hash, &ctx("1.2.3.4"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::SessionInvalid));

    // The replacement is live
    assert!(
        h.service
            .check_session(&check.session.hash, &ctx("1.2.3.4"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_tampered_integrity_tag_is_rejected() {
    let repo = Arc::new(MemoryAuthRepository::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let h = build(base_config(), repo.clone(), clock.clone());
    register_active(&h, "user@example.com", "correct horse battery").await;
    let session = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    // Same storage, different site secret: every stored tag is foreign
    let other = build(
        AuthConfig {
            site_secret: [8u8; 32],
            ..base_config()
        },
        repo,
        clock,
    );

    let err = other
        .service
        .check_session(&session.hash, &ctx("1.2.3.4"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::SessionTampered));
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let h = harness();
    register_active(&h, "user@example.com", "correct horse battery").await;
    let session = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    assert!(h.service.logout(&session.hash).await.is_ok());
    assert!(h.service.logout(&session.hash).await.is_ok());
    // Malformed tokens are a silent no-op
    assert!(h.service.logout("short").await.is_ok());
}

#[tokio::test]
async fn test_logout_all_with_no_sessions_returns_zero() {
    let h = harness();
    let uid = register_active(&h, "user@example.com", "correct horse battery").await;
    assert_eq!(h.service.logout_all(&uid).await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_session_policy() {
    // Default: a fresh login evicts the previous session
    let h = harness();
    register_active(&h, "user@example.com", "correct horse battery").await;
    let first = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();
    let second = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    assert!(
        h.service
            .check_session(&first.hash, &ctx("1.2.3.4"))
            .await
            .is_err()
    );
    assert!(
        h.service
            .check_session(&second.hash, &ctx("1.2.3.4"))
            .await
            .is_ok()
    );

    // With concurrency allowed, both stay live
    let h = harness_with(AuthConfig {
        allow_concurrent_sessions: true,
        ..base_config()
    });
    register_active(&h, "user@example.com", "correct horse battery").await;
    let first = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();
    let second = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    assert!(
        h.service
            .check_session(&first.hash, &ctx("1.2.3.4"))
            .await
            .is_ok()
    );
    assert!(
        h.service
            .check_session(&second.hash, &ctx("1.2.3.4"))
            .await
            .is_ok()
    );
}

// ============================================================================
// Lockout
// ============================================================================

#[tokio::test]
async fn test_lockout_engages_at_threshold_and_expires() {
    let h = harness();
    register_active(&h, "user@example.com", "correct horse battery").await;

    for _ in 0..5 {
        let err = h
            .service
            .login(
                "user@example.com",
                "not the password".to_string(),
                false,
                &ctx("6.6.6.6"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CredentialsInvalid));
    }

    // Threshold reached; even the correct password is refused outright
    let err = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("6.6.6.6"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::IpLocked));

    // Lockout is address-scoped, not account-scoped
    assert!(
        h.service
            .login(
                "user@example.com",
                "correct horse battery".to_string(),
                false,
                &ctx("7.7.7.7"),
            )
            .await
            .is_ok()
    );

    // Past the mitigation window the records expire and the lock lifts
    h.clock.advance(Duration::minutes(31));
    assert!(
        h.service
            .login(
                "user@example.com",
                "correct horse battery".to_string(),
                false,
                &ctx("6.6.6.6"),
            )
            .await
            .is_ok()
    );
}

// ============================================================================
// Activation tokens
// ============================================================================

#[tokio::test]
async fn test_activation_flow() {
    let h = harness();
    h.service
        .register(
            input("new@example.com", "correct horse battery"),
            true,
            &ctx("9.9.9.9"),
        )
        .await
        .unwrap();

    let token = h.notifier.last_token();
    h.service.activate(&token, &ctx("9.9.9.9")).await.unwrap();

    assert!(
        h.service
            .login(
                "new@example.com",
                "correct horse battery".to_string(),
                false,
                &ctx("1.2.3.4"),
            )
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_activation_token_is_single_use() {
    let h = harness();
    h.service
        .register(
            input("new@example.com", "correct horse battery"),
            true,
            &ctx("9.9.9.9"),
        )
        .await
        .unwrap();

    let token = h.notifier.last_token();
    h.service.activate(&token, &ctx("9.9.9.9")).await.unwrap();

    let err = h
        .service
        .activate(&token, &ctx("9.9.9.9"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TOKEN_INVALID");
}

#[tokio::test]
async fn test_register_rolls_back_on_dispatch_failure() {
    let h = harness();
    h.notifier.fail_next_sends(true);

    let err = h
        .service
        .register(
            input("new@example.com", "correct horse battery"),
            true,
            &ctx("9.9.9.9"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DISPATCH_FAILED");

    // Neither an orphaned account nor a live token survives
    let email = EmailAddress::new("new@example.com").unwrap();
    assert!(!h.repo.email_exists(&email).await.unwrap());

    // Delivery faults are not evidence of abuse
    assert_eq!(h.repo.attempt_count(), 0);

    // The address is free to register again once dispatch recovers
    h.notifier.fail_next_sends(false);
    assert!(
        h.service
            .register(
                input("new@example.com", "correct horse battery"),
                true,
                &ctx("9.9.9.9"),
            )
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_resend_activation() {
    let h = harness();
    h.service
        .register(
            input("new@example.com", "correct horse battery"),
            true,
            &ctx("9.9.9.9"),
        )
        .await
        .unwrap();

    // A live token suppresses the duplicate
    let err = h
        .service
        .resend_activation("new@example.com", &ctx("9.9.9.9"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenPending));

    // After expiry a new one goes out
    h.clock.advance(Duration::minutes(11));
    h.service
        .resend_activation("new@example.com", &ctx("9.9.9.9"))
        .await
        .unwrap();
    assert_eq!(h.notifier.sent_count(), 2);

    let token = h.notifier.last_token();
    h.service.activate(&token, &ctx("9.9.9.9")).await.unwrap();

    let err = h
        .service
        .resend_activation("new@example.com", &ctx("9.9.9.9"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountAlreadyActive));
}

// ============================================================================
// Password reset
// ============================================================================

#[tokio::test]
async fn test_duplicate_reset_request_is_suppressed() {
    let h = harness();
    register_active(&h, "user@example.com", "correct horse battery").await;

    h.service
        .request_password_reset("user@example.com", &ctx("1.2.3.4"))
        .await
        .unwrap();

    let err = h
        .service
        .request_password_reset("user@example.com", &ctx("1.2.3.4"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TokenPending));

    // The stale token is superseded once it expires
    h.clock.advance(Duration::minutes(11));
    h.service
        .request_password_reset("user@example.com", &ctx("1.2.3.4"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reset_password_flow() {
    let h = harness();
    register_active(&h, "user@example.com", "correct horse battery").await;

    h.service
        .request_password_reset("user@example.com", &ctx("1.2.3.4"))
        .await
        .unwrap();
    let token = h.notifier.last_token();

    // Resetting to the current password is refused, token stays live
    let err = h
        .service
        .reset_password(
            &token,
            "correct horse battery".to_string(),
            "correct horse battery".to_string(),
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PasswordReused));

    h.service
        .reset_password(
            &token,
            "brand new passphrase".to_string(),
            "brand new passphrase".to_string(),
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    // Token burned on success
    let err = h
        .service
        .reset_password(
            &token,
            "another passphrase!".to_string(),
            "another passphrase!".to_string(),
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "TOKEN_INVALID");

    assert!(
        h.service
            .login(
                "user@example.com",
                "correct horse battery".to_string(),
                false,
                &ctx("1.2.3.4"),
            )
            .await
            .is_err()
    );
    assert!(
        h.service
            .login(
                "user@example.com",
                "brand new passphrase".to_string(),
                false,
                &ctx("1.2.3.4"),
            )
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_reset_for_unknown_email_records_attempt() {
    let h = harness();
    let err = h
        .service
        .request_password_reset("ghost@example.com", &ctx("1.2.3.4"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountNotFound));
    assert_eq!(h.repo.attempt_count(), 1);
}

// ============================================================================
// Credential changes
// ============================================================================

#[tokio::test]
async fn test_change_password_keeps_existing_sessions() {
    let h = harness();
    let uid = register_active(&h, "user@example.com", "correct horse battery").await;
    let session = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    h.service
        .change_password(
            &uid,
            "correct horse battery".to_string(),
            "brand new passphrase".to_string(),
            "brand new passphrase".to_string(),
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    // Deliberate: a password change does not invalidate open sessions
    assert!(
        h.service
            .check_session(&session.hash, &ctx("1.2.3.4"))
            .await
            .is_ok()
    );

    assert!(
        h.service
            .login(
                "user@example.com",
                "correct horse battery".to_string(),
                false,
                &ctx("1.2.3.4"),
            )
            .await
            .is_err()
    );
    assert!(
        h.service
            .login(
                "user@example.com",
                "brand new passphrase".to_string(),
                false,
                &ctx("1.2.3.4"),
            )
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_change_password_requires_current() {
    let h = harness();
    let uid = register_active(&h, "user@example.com", "correct horse battery").await;

    let err = h
        .service
        .change_password(
            &uid,
            "not the password".to_string(),
            "brand new passphrase".to_string(),
            "brand new passphrase".to_string(),
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CredentialsInvalid));

    let err = h
        .service
        .change_password(
            &uid,
            "correct horse battery".to_string(),
            "brand new passphrase".to_string(),
            "different confirm!!".to_string(),
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ConfirmationMismatch));
}

#[tokio::test]
async fn test_change_email() {
    let h = harness();
    let uid = register_active(&h, "user@example.com", "correct horse battery").await;
    register_active(&h, "taken@example.com", "another passphrase!").await;

    let err = h
        .service
        .change_email(
            &uid,
            "fresh@example.com",
            "not the password".to_string(),
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CredentialsInvalid));

    let err = h
        .service
        .change_email(
            &uid,
            "taken@example.com",
            "correct horse battery".to_string(),
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::EmailTaken));

    h.service
        .change_email(
            &uid,
            "fresh@example.com",
            "correct horse battery".to_string(),
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    assert!(
        h.service
            .login(
                "fresh@example.com",
                "correct horse battery".to_string(),
                false,
                &ctx("1.2.3.4"),
            )
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_delete_account_removes_everything() {
    let h = harness();
    let uid = register_active(&h, "user@example.com", "correct horse battery").await;
    let session = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();
    h.service
        .request_password_reset("user@example.com", &ctx("1.2.3.4"))
        .await
        .unwrap();

    h.service
        .delete_account(&uid, "correct horse battery".to_string(), &ctx("1.2.3.4"))
        .await
        .unwrap();

    let email = EmailAddress::new("user@example.com").unwrap();
    assert!(!h.repo.email_exists(&email).await.unwrap());
    assert!(
        h.service
            .check_session(&session.hash, &ctx("1.2.3.4"))
            .await
            .is_err()
    );
    assert!(
        h.repo
            .find_for_account(&uid, TokenKind::Reset)
            .await
            .unwrap()
            .is_none()
    );
}

// ============================================================================
// Rehash on verify
// ============================================================================

#[tokio::test]
async fn test_stale_digest_upgraded_on_login() {
    let repo = Arc::new(MemoryAuthRepository::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));

    let old_cost = HashingCost::minimal();
    let new_cost = HashingCost::new(old_cost.m_cost, old_cost.t_cost + 1, old_cost.p_cost);

    // Account created under the old work factor
    let old = build(base_config(), repo.clone(), clock.clone());
    register_active(&old, "user@example.com", "correct horse battery").await;

    let email = EmailAddress::new("user@example.com").unwrap();
    let stale = repo
        .find_by_email(&email)
        .await
        .unwrap()
        .unwrap()
        .password_hash;
    assert!(stale.needs_rehash(&new_cost));

    // Login through a service configured with the stronger factor
    let current = build(
        AuthConfig {
            hashing_cost: new_cost,
            ..base_config()
        },
        repo.clone(),
        clock,
    );
    current
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    // The persisted digest is now at the configured factor
    let upgraded = repo
        .find_by_email(&email)
        .await
        .unwrap()
        .unwrap()
        .password_hash;
    assert!(!upgraded.needs_rehash(&new_cost));
    assert_ne!(upgraded.as_phc_string(), stale.as_phc_string());

    // A stale cached copy of the old digest still verifies; re-reading
    // is the caller's job
    let raw = RawPassword::parse(
        "correct horse battery".to_string(),
        &PasswordPolicy::default(),
        None,
    )
    .unwrap();
    assert!(stale.verify(&raw));
}

// ============================================================================
// Password policy
// ============================================================================

#[tokio::test]
async fn test_strength_floor_applies_to_new_passwords_only() {
    let repo = Arc::new(MemoryAuthRepository::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));

    // Account predates the strength requirement
    let lax = build(base_config(), repo.clone(), clock.clone());
    register_active(&lax, "user@example.com", "weak but long enough").await;

    let mut config = base_config();
    config.password_policy.min_score = Some(3);
    let strict = build(config, repo, clock)
        .service
        .with_strength_validator(Arc::new(FixedScore(1)));

    // Existing credentials still log in
    assert!(
        strict
            .login(
                "user@example.com",
                "weak but long enough".to_string(),
                false,
                &ctx("1.2.3.4"),
            )
            .await
            .is_ok()
    );

    // But no new password may score below the floor
    let err = strict
        .register(
            input("other@example.com", "weak but long enough"),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PasswordWeak));
}

#[tokio::test]
async fn test_register_input_validation_order() {
    let h = harness();

    let mut bad_confirm = input("user@example.com", "correct horse battery");
    bad_confirm.confirm = "something else here".to_string();
    let err = h
        .service
        .register(bad_confirm, false, &ctx("9.9.9.9"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ConfirmationMismatch));

    let err = h
        .service
        .register(input("not-an-email", "correct horse battery"), false, &ctx("9.9.9.9"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::EmailInvalid));

    register_active(&h, "user@example.com", "correct horse battery").await;
    let err = h
        .service
        .register(input("user@example.com", "another passphrase!"), false, &ctx("9.9.9.9"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::EmailTaken));

    let err = h
        .service
        .register(input("short@example.com", "tiny"), false, &ctx("9.9.9.9"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PasswordInvalid));
}

// ============================================================================
// Identity and maintenance
// ============================================================================

#[tokio::test]
async fn test_identity_snapshot() {
    let h = harness();
    let uid = register_active(&h, "user@example.com", "correct horse battery").await;
    let session = h
        .service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();

    let identity = h
        .service
        .identity(&session.hash, &ctx("1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(identity.uid, uid);
    assert_eq!(identity.email.as_str(), "user@example.com");
    assert_eq!(identity.role_id, 0);
    assert_eq!(identity.group_id, 0);

    let err = h
        .service
        .identity(&"0".repeat(SESSION_HASH_LENGTH), &ctx("1.2.3.4"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::SessionInvalid));
}

#[tokio::test]
async fn test_role_directory_capability_check() {
    let h = harness();
    h.repo
        .set_roles(vec![(1, "member".to_string()), (3, "admin".to_string())]);

    let mut admin = input("admin@example.com", "correct horse battery");
    admin.role_id = Some(3);
    h.service
        .register(admin, false, &ctx("9.9.9.9"))
        .await
        .unwrap();

    let session = h
        .service
        .login(
            "admin@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();
    let identity = h
        .service
        .identity(&session.hash, &ctx("1.2.3.4"))
        .await
        .unwrap();

    let directory = Directory::from_entries(h.repo.role_entries().await.unwrap());
    assert!(directory.has_any(identity.role_id, &[Selector::Name("admin")]));
    assert!(directory.has_any(identity.role_id, &[Selector::Id(3)]));
    assert!(!directory.has_any(identity.role_id, &[Selector::Id(1)]));
}

#[tokio::test]
async fn test_purge_expired_sweep() {
    let h = harness();
    register_active(&h, "user@example.com", "correct horse battery").await;
    h.service
        .login(
            "user@example.com",
            "correct horse battery".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap();
    h.service
        .request_password_reset("user@example.com", &ctx("1.2.3.4"))
        .await
        .unwrap();
    h.service
        .login(
            "user@example.com",
            "not the password".to_string(),
            false,
            &ctx("1.2.3.4"),
        )
        .await
        .unwrap_err();

    // Everything is fresh; nothing to reclaim
    let report = h.service.purge_expired().await.unwrap();
    assert_eq!(report.sessions, 0);
    assert_eq!(report.tokens, 0);
    assert_eq!(report.attempts, 0);

    // Past every window, the sweep reclaims all three tables
    h.clock.advance(Duration::hours(2));
    let report = h.service.purge_expired().await.unwrap();
    assert_eq!(report.sessions, 1);
    assert_eq!(report.tokens, 1);
    assert_eq!(report.attempts, 1);
}
