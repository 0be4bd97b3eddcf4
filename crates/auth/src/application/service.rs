//! Credential Service
//!
//! The externally visible facade. Each public operation is a stateless,
//! short-circuiting pipeline: lockout check, input validation, existence
//! and active checks, credential verification, then the mutation - in that
//! order, so denials are deterministic. Rejections are recorded against
//! the caller's address; system faults are not.

use std::net::IpAddr;
use std::sync::Arc;

use kernel::id::AccountId;
use platform::clock::Clock;

use crate::application::attempts::AttemptLedger;
use crate::application::config::AuthConfig;
use crate::application::sessions::{SessionCheck, SessionVault};
use crate::application::tokens::ActionTokens;
use crate::domain::entity::account::Account;
use crate::domain::entity::action_token::TokenKind;
use crate::domain::entity::session::Session;
use crate::domain::repository::{
    AccountRepository, AttemptRepository, SessionRepository, TokenRepository,
};
use crate::domain::value_object::email::EmailAddress;
use crate::domain::value_object::password::{
    CredentialDigest, PasswordRejection, RawPassword, StrengthValidator, Verification,
};
use crate::error::{AuthError, AuthResult};
use crate::notify::{MailComposer, Notifier};

/// Caller identification at the core boundary
///
/// How the address and agent were extracted (headers, socket peer) is the
/// transport layer's concern.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub ip: IpAddr,
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn new(ip: IpAddr, user_agent: Option<String>) -> Self {
        Self { ip, user_agent }
    }
}

/// Registration input
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub confirm: String,
    /// Role id for the new account (defaults to 0)
    pub role_id: Option<i16>,
    /// Group id for the new account (defaults to 0)
    pub group_id: Option<i16>,
}

/// Registration output
#[derive(Debug)]
pub struct RegisterOutput {
    pub uid: AccountId,
    pub activation_required: bool,
}

/// Identity snapshot for one request
///
/// Returned by value; it lives exactly as long as the request holds it,
/// which is the whole of the per-request identity cache.
#[derive(Debug, Clone)]
pub struct Identity {
    pub uid: AccountId,
    pub email: EmailAddress,
    pub role_id: i16,
    pub group_id: i16,
    /// The validated session; carries the replacement token after renewal
    pub session: SessionCheck,
}

/// Counts removed by a maintenance sweep
#[derive(Debug, Clone, Copy)]
pub struct PurgeReport {
    pub attempts: u64,
    pub sessions: u64,
    pub tokens: u64,
}

/// Credential service facade
pub struct CredentialService<U, S, T, A, N>
where
    U: AccountRepository,
    S: SessionRepository,
    T: TokenRepository,
    A: AttemptRepository,
    N: Notifier,
{
    accounts: Arc<U>,
    sessions: SessionVault<S>,
    tokens: ActionTokens<T>,
    attempts: AttemptLedger<A>,
    notifier: Arc<N>,
    composer: Arc<dyn MailComposer>,
    strength: Option<Arc<dyn StrengthValidator>>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<U, S, T, A, N> CredentialService<U, S, T, A, N>
where
    U: AccountRepository,
    S: SessionRepository,
    T: TokenRepository,
    A: AttemptRepository,
    N: Notifier,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<U>,
        sessions: SessionVault<S>,
        tokens: ActionTokens<T>,
        attempts: AttemptLedger<A>,
        notifier: Arc<N>,
        composer: Arc<dyn MailComposer>,
        config: Arc<AuthConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            sessions,
            tokens,
            attempts,
            notifier,
            composer,
            strength: None,
            config,
            clock,
        }
    }

    /// Attach a pluggable strength scorer enforcing the configured floor
    pub fn with_strength_validator(mut self, validator: Arc<dyn StrengthValidator>) -> Self {
        self.strength = Some(validator);
        self
    }

    /// Direct access to the session vault (maintenance, force logout)
    pub fn sessions(&self) -> &SessionVault<S> {
        &self.sessions
    }

    // ========================================================================
    // Login / logout
    // ========================================================================

    /// Authenticate and open a session
    ///
    /// Unknown account and wrong password return the same code; the attempt
    /// ledger keeps the distinction in its diagnostic note.
    pub async fn login(
        &self,
        email: &str,
        password: String,
        remember: bool,
        ctx: &ClientContext,
    ) -> AuthResult<Session> {
        self.guard_ip(ctx).await?;

        let email = match EmailAddress::new(email) {
            Ok(email) => email,
            Err(_) => return Err(self.deny(ctx, "login", AuthError::EmailInvalid).await),
        };

        let password = match self.shape_password(password) {
            Ok(password) => password,
            Err(err) => return Err(self.deny(ctx, "login", err).await),
        };

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            return Err(
                self.deny_noting(
                    ctx,
                    "login",
                    "ACCOUNT_NOT_FOUND",
                    AuthError::CredentialsInvalid,
                )
                .await,
            );
        };

        match account
            .password_hash
            .verify_and_maybe_upgrade(&password, &self.config.hashing_cost)
        {
            Verification::Rejected => {
                return Err(self.deny(ctx, "login", AuthError::CredentialsInvalid).await);
            }
            Verification::Valid => {}
            Verification::ValidNeedsUpgrade(upgraded) => {
                // Opportunistic; a failed persist never blocks the login
                match self
                    .accounts
                    .update_password(&account.account_id, &upgraded)
                    .await
                {
                    Ok(()) => {
                        tracing::info!(uid = %account.account_id, "Password digest upgraded");
                    }
                    Err(err) => err.log(),
                }
            }
        }

        if !account.active {
            return Err(self.deny(ctx, "login", AuthError::AccountInactive).await);
        }

        let session = self
            .sessions
            .create(&account.account_id, remember, ctx.ip, ctx.user_agent.clone())
            .await?;

        tracing::info!(uid = %account.account_id, remembered = remember, "User logged in");

        Ok(session)
    }

    /// Destroy the presented session; idempotent
    pub async fn logout(&self, session_token: &str) -> AuthResult<()> {
        self.sessions.destroy(session_token).await
    }

    /// Destroy every session of an account; returns the count removed
    pub async fn logout_all(&self, uid: &AccountId) -> AuthResult<u64> {
        self.sessions.destroy_all_for_account(uid).await
    }

    // ========================================================================
    // Registration / activation
    // ========================================================================

    /// Create a new account
    ///
    /// With `require_activation`, the account starts inactive and an
    /// activation token is issued and dispatched; a delivery failure rolls
    /// the account and token back rather than leaving an orphaned,
    /// unverifiable account.
    pub async fn register(
        &self,
        input: RegisterInput,
        require_activation: bool,
        ctx: &ClientContext,
    ) -> AuthResult<RegisterOutput> {
        self.guard_ip(ctx).await?;

        if input.password != input.confirm {
            return Err(AuthError::ConfirmationMismatch);
        }

        let email = EmailAddress::new(input.email.as_str()).map_err(|_| AuthError::EmailInvalid)?;

        if self.accounts.email_exists(&email).await? {
            return Err(self.deny(ctx, "register", AuthError::EmailTaken).await);
        }

        let password = self.new_password(input.password)?;
        let digest = CredentialDigest::from_raw(&password, &self.config.hashing_cost)
            .map_err(AuthError::Internal)?;

        let mut account = Account::new(email, digest, !require_activation, self.clock.now());
        if let Some(role_id) = input.role_id {
            account.role_id = role_id;
        }
        if let Some(group_id) = input.group_id {
            account.group_id = group_id;
        }

        self.accounts.create(&account).await?;

        if require_activation {
            if let Err(err) = self
                .issue_and_dispatch(&account.account_id, &account.email, TokenKind::Activation)
                .await
            {
                // Compensating delete; the account must not outlive its
                // undeliverable activation token
                if let Err(cleanup) = self.accounts.delete(&account.account_id).await {
                    cleanup.log();
                }
                return Err(err);
            }
        }

        tracing::info!(
            uid = %account.account_id,
            activation_required = require_activation,
            "Account registered"
        );

        Ok(RegisterOutput {
            uid: account.account_id,
            activation_required: require_activation,
        })
    }

    /// Consume an activation token and mark the account active
    pub async fn activate(&self, token: &str, ctx: &ClientContext) -> AuthResult<()> {
        self.guard_ip(ctx).await?;

        let record = match self.tokens.consume(token, TokenKind::Activation).await {
            Ok(record) => record,
            Err(err) => return Err(self.deny(ctx, "activate", err).await),
        };

        self.accounts.set_active(&record.uid).await?;
        self.tokens.revoke(&record.id).await?;

        tracing::info!(uid = %record.uid, "Account activated");

        Ok(())
    }

    /// Issue a fresh activation token for a not-yet-active account
    pub async fn resend_activation(&self, email: &str, ctx: &ClientContext) -> AuthResult<()> {
        self.guard_ip(ctx).await?;

        let email = EmailAddress::new(email).map_err(|_| AuthError::EmailInvalid)?;

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            return Err(
                self.deny(ctx, "resend_activation", AuthError::AccountNotFound)
                    .await,
            );
        };

        if account.active {
            return Err(
                self.deny(ctx, "resend_activation", AuthError::AccountAlreadyActive)
                    .await,
            );
        }

        match self
            .issue_and_dispatch(&account.account_id, &account.email, TokenKind::Activation)
            .await
        {
            Ok(()) => Ok(()),
            Err(err) => Err(self.deny(ctx, "resend_activation", err).await),
        }
    }

    // ========================================================================
    // Password reset
    // ========================================================================

    /// Issue and dispatch a reset token for a registered email
    pub async fn request_password_reset(&self, email: &str, ctx: &ClientContext) -> AuthResult<()> {
        self.guard_ip(ctx).await?;

        let email = EmailAddress::new(email).map_err(|_| AuthError::EmailInvalid)?;

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            return Err(
                self.deny(ctx, "request_password_reset", AuthError::AccountNotFound)
                    .await,
            );
        };

        match self
            .issue_and_dispatch(&account.account_id, &account.email, TokenKind::Reset)
            .await
        {
            Ok(()) => {
                tracing::info!(uid = %account.account_id, "Password reset requested");
                Ok(())
            }
            Err(err) => Err(self.deny(ctx, "request_password_reset", err).await),
        }
    }

    /// Consume a reset token and set a new password
    ///
    /// Resetting to the current password is rejected. Existing sessions are
    /// left untouched, as with [`change_password`](Self::change_password).
    pub async fn reset_password(
        &self,
        token: &str,
        password: String,
        confirm: String,
        ctx: &ClientContext,
    ) -> AuthResult<()> {
        self.guard_ip(ctx).await?;

        if password != confirm {
            return Err(AuthError::ConfirmationMismatch);
        }

        let password = self.new_password(password)?;

        let record = match self.tokens.consume(token, TokenKind::Reset).await {
            Ok(record) => record,
            Err(err) => return Err(self.deny(ctx, "reset_password", err).await),
        };

        let Some(account) = self.accounts.find_by_id(&record.uid).await? else {
            // Orphaned token; burn it rather than leave it live
            if let Err(cleanup) = self.tokens.revoke(&record.id).await {
                cleanup.log();
            }
            return Err(AuthError::Internal(
                "reset token references a missing account".to_string(),
            ));
        };

        if account.password_hash.verify(&password) {
            return Err(
                self.deny(ctx, "reset_password", AuthError::PasswordReused)
                    .await,
            );
        }

        let digest = CredentialDigest::from_raw(&password, &self.config.hashing_cost)
            .map_err(AuthError::Internal)?;
        self.accounts
            .update_password(&account.account_id, &digest)
            .await?;
        self.tokens.revoke(&record.id).await?;

        tracing::info!(uid = %account.account_id, "Password reset");

        Ok(())
    }

    // ========================================================================
    // Credential changes
    // ========================================================================

    /// Change the password after re-authenticating with the current one
    ///
    /// Existing sessions stay valid; `logout_all` is the explicit remedy.
    pub async fn change_password(
        &self,
        uid: &AccountId,
        current: String,
        new: String,
        confirm: String,
        ctx: &ClientContext,
    ) -> AuthResult<()> {
        self.guard_ip(ctx).await?;

        let current = match self.shape_password(current) {
            Ok(current) => current,
            Err(err) => return Err(self.deny(ctx, "change_password", err).await),
        };

        if new != confirm {
            return Err(
                self.deny(ctx, "change_password", AuthError::ConfirmationMismatch)
                    .await,
            );
        }

        let new = match self.new_password(new) {
            Ok(new) => new,
            Err(err) => return Err(self.deny(ctx, "change_password", err).await),
        };

        let Some(account) = self.accounts.find_by_id(uid).await? else {
            return Err(
                self.deny(ctx, "change_password", AuthError::AccountNotFound)
                    .await,
            );
        };

        if !account.password_hash.verify(&current) {
            return Err(
                self.deny(ctx, "change_password", AuthError::CredentialsInvalid)
                    .await,
            );
        }

        let digest = CredentialDigest::from_raw(&new, &self.config.hashing_cost)
            .map_err(AuthError::Internal)?;
        self.accounts.update_password(uid, &digest).await?;

        tracing::info!(uid = %uid, "Password changed");

        Ok(())
    }

    /// Change the email address after re-authenticating
    pub async fn change_email(
        &self,
        uid: &AccountId,
        new_email: &str,
        password: String,
        ctx: &ClientContext,
    ) -> AuthResult<()> {
        self.guard_ip(ctx).await?;

        let password = match self.shape_password(password) {
            Ok(password) => password,
            Err(err) => return Err(self.deny(ctx, "change_email", err).await),
        };

        let Some(account) = self.accounts.find_by_id(uid).await? else {
            return Err(
                self.deny_noting(
                    ctx,
                    "change_email",
                    "ACCOUNT_NOT_FOUND",
                    AuthError::CredentialsInvalid,
                )
                .await,
            );
        };

        if !account.password_hash.verify(&password) {
            return Err(
                self.deny(ctx, "change_email", AuthError::CredentialsInvalid)
                    .await,
            );
        }

        let email = EmailAddress::new(new_email).map_err(|_| AuthError::EmailInvalid)?;

        if self.accounts.email_exists(&email).await? {
            return Err(self.deny(ctx, "change_email", AuthError::EmailTaken).await);
        }

        self.accounts.update_email(uid, &email).await?;

        tracing::info!(uid = %uid, "Email changed");

        Ok(())
    }

    /// Delete an account after re-authenticating
    ///
    /// Removes the account row, all of its sessions and all of its action
    /// tokens.
    pub async fn delete_account(
        &self,
        uid: &AccountId,
        password: String,
        ctx: &ClientContext,
    ) -> AuthResult<()> {
        self.guard_ip(ctx).await?;

        let password = match self.shape_password(password) {
            Ok(password) => password,
            Err(err) => return Err(self.deny(ctx, "delete_account", err).await),
        };

        let Some(account) = self.accounts.find_by_id(uid).await? else {
            return Err(
                self.deny_noting(
                    ctx,
                    "delete_account",
                    "ACCOUNT_NOT_FOUND",
                    AuthError::CredentialsInvalid,
                )
                .await,
            );
        };

        if !account.password_hash.verify(&password) {
            return Err(
                self.deny(ctx, "delete_account", AuthError::CredentialsInvalid)
                    .await,
            );
        }

        self.sessions.destroy_all_for_account(uid).await?;
        self.tokens.revoke_for_account(uid).await?;
        self.accounts.delete(uid).await?;

        tracing::info!(uid = %uid, "Account deleted");

        Ok(())
    }

    // ========================================================================
    // Session checks / maintenance
    // ========================================================================

    /// Validate a presented session token
    pub async fn check_session(
        &self,
        session_token: &str,
        ctx: &ClientContext,
    ) -> AuthResult<SessionCheck> {
        self.guard_ip(ctx).await?;
        self.sessions.validate(session_token, ctx.ip).await
    }

    /// Validate a session and resolve the caller's identity
    ///
    /// The returned snapshot is the per-request identity cache; it is a
    /// value, so "clearing" it is dropping it.
    pub async fn identity(&self, session_token: &str, ctx: &ClientContext) -> AuthResult<Identity> {
        let check = self.check_session(session_token, ctx).await?;

        let account = self
            .accounts
            .find_by_id(&check.session.uid)
            .await?
            .ok_or(AuthError::SessionInvalid)?;

        Ok(Identity {
            uid: account.account_id,
            email: account.email,
            role_id: account.role_id,
            group_id: account.group_id,
            session: check,
        })
    }

    /// Daily maintenance: reclaim expired attempts, sessions and tokens
    pub async fn purge_expired(&self) -> AuthResult<PurgeReport> {
        let report = PurgeReport {
            attempts: self.attempts.purge_expired(None).await?,
            sessions: self.sessions.purge_expired().await?,
            tokens: self.tokens.purge_expired().await?,
        };

        tracing::info!(
            attempts = report.attempts,
            sessions = report.sessions,
            tokens = report.tokens,
            "Expired records purged"
        );

        Ok(report)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Reject outright when the caller's address is locked
    async fn guard_ip(&self, ctx: &ClientContext) -> AuthResult<()> {
        if self.attempts.is_locked(ctx.ip).await? {
            return Err(AuthError::IpLocked);
        }
        Ok(())
    }

    /// Record a denial against the caller's address and hand the error back
    ///
    /// System faults are not evidence of malicious behavior and are never
    /// recorded. A failed record itself is logged and swallowed.
    async fn deny(&self, ctx: &ClientContext, op: &str, err: AuthError) -> AuthError {
        let note = err.code();
        self.deny_noting(ctx, op, note, err).await
    }

    async fn deny_noting(
        &self,
        ctx: &ClientContext,
        op: &str,
        note: &str,
        err: AuthError,
    ) -> AuthError {
        err.log();
        if !err.class().is_system_fault() {
            if let Err(record_err) = self.attempts.record(ctx.ip, format!("{op}::{note}")).await {
                record_err.log();
            }
        }
        err
    }

    /// Structural + length validation for a presented (existing) password
    fn shape_password(&self, raw: String) -> AuthResult<RawPassword> {
        RawPassword::parse(raw, &self.config.password_policy, None)
            .map_err(|_| AuthError::PasswordInvalid)
    }

    /// Full policy, including the strength floor, for a password being set
    fn new_password(&self, raw: String) -> AuthResult<RawPassword> {
        RawPassword::parse(raw, &self.config.password_policy, self.strength.as_deref()).map_err(
            |err| match err {
                PasswordRejection::TooWeak { .. } => AuthError::PasswordWeak,
                _ => AuthError::PasswordInvalid,
            },
        )
    }

    /// Issue a token and dispatch its message, rolling the token back on
    /// delivery failure
    async fn issue_and_dispatch(
        &self,
        uid: &AccountId,
        email: &EmailAddress,
        kind: TokenKind,
    ) -> AuthResult<()> {
        let token = self.tokens.issue(uid, kind).await?;
        let draft = self.composer.compose(kind, &token.token);

        if let Err(err) = self.notifier.send(email, &draft).await {
            if let Err(cleanup) = self.tokens.revoke(&token.id).await {
                cleanup.log();
            }
            return Err(AuthError::Dispatch(err));
        }

        Ok(())
    }
}
