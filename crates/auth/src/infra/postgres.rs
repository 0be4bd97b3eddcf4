//! PostgreSQL Repository Implementations
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE accounts (
//!     account_id    UUID PRIMARY KEY,
//!     email         TEXT NOT NULL UNIQUE,
//!     password_hash TEXT NOT NULL,
//!     active        BOOLEAN NOT NULL,
//!     role_id       SMALLINT NOT NULL DEFAULT 0,
//!     group_id      SMALLINT NOT NULL DEFAULT 0,
//!     created_at    TIMESTAMPTZ NOT NULL,
//!     updated_at    TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE auth_sessions (
//!     hash          TEXT PRIMARY KEY,
//!     uid           UUID NOT NULL,
//!     expire_at     TIMESTAMPTZ NOT NULL,
//!     bound_ip      TEXT NOT NULL,
//!     user_agent    TEXT,
//!     integrity_tag TEXT NOT NULL,
//!     created_at    TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE auth_tokens (
//!     id        UUID PRIMARY KEY,
//!     uid       UUID NOT NULL,
//!     token     TEXT NOT NULL,
//!     kind      TEXT NOT NULL,
//!     expire_at TIMESTAMPTZ NOT NULL,
//!     UNIQUE (uid, kind)
//! );
//!
//! CREATE TABLE auth_attempts (
//!     id        BIGSERIAL PRIMARY KEY,
//!     ip        TEXT NOT NULL,
//!     expire_at TIMESTAMPTZ NOT NULL,
//!     note      TEXT NOT NULL
//! );
//!
//! CREATE TABLE auth_roles  (id SMALLINT PRIMARY KEY, name TEXT NOT NULL, active BOOLEAN NOT NULL);
//! CREATE TABLE auth_groups (id SMALLINT PRIMARY KEY, name TEXT NOT NULL, active BOOLEAN NOT NULL);
//! ```
//!
//! The unique constraints on `accounts.email` and `auth_tokens (uid, kind)`
//! back the duplicate-email and duplicate-token races; a conflicting insert
//! surfaces as the corresponding policy rejection.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use kernel::id::{AccountId, TokenId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{
    account::Account,
    action_token::{ActionToken, TokenKind},
    attempt::Attempt,
    session::Session,
};
use crate::domain::repository::{
    AccountRepository, AttemptRepository, DirectoryRepository, SessionRepository, TokenRepository,
};
use crate::domain::value_object::{email::EmailAddress, password::CredentialDigest};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

// ============================================================================
// Account Repository Implementation
// ============================================================================

impl AccountRepository for PgAuthRepository {
    async fn create(&self, account: &Account) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (
                account_id,
                email,
                password_hash,
                active,
                role_id,
                group_id,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(account.account_id.as_uuid())
        .bind(account.email.as_str())
        .bind(account.password_hash.as_phc_string())
        .bind(account.active)
        .bind(account.role_id)
        .bind(account.group_id)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(AuthError::EmailTaken),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, uid: &AccountId) -> AuthResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT
                account_id,
                email,
                password_hash,
                active,
                role_id,
                group_id,
                created_at,
                updated_at
            FROM accounts
            WHERE account_id = $1
            "#,
        )
        .bind(uid.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_account()).transpose()
    }

    async fn find_by_email(&self, email: &EmailAddress) -> AuthResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT
                account_id,
                email,
                password_hash,
                active,
                role_id,
                group_id,
                created_at,
                updated_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_account()).transpose()
    }

    async fn email_exists(&self, email: &EmailAddress) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1)",
        )
        .bind(email.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn update_password(&self, uid: &AccountId, digest: &CredentialDigest) -> AuthResult<()> {
        sqlx::query(
            "UPDATE accounts SET password_hash = $2, updated_at = NOW() WHERE account_id = $1",
        )
        .bind(uid.as_uuid())
        .bind(digest.as_phc_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_email(&self, uid: &AccountId, email: &EmailAddress) -> AuthResult<()> {
        let result =
            sqlx::query("UPDATE accounts SET email = $2, updated_at = NOW() WHERE account_id = $1")
                .bind(uid.as_uuid())
                .bind(email.as_str())
                .execute(&self.pool)
                .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(AuthError::EmailTaken),
            Err(err) => Err(err.into()),
        }
    }

    async fn set_active(&self, uid: &AccountId) -> AuthResult<()> {
        sqlx::query("UPDATE accounts SET active = TRUE, updated_at = NOW() WHERE account_id = $1")
            .bind(uid.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, uid: &AccountId) -> AuthResult<()> {
        sqlx::query("DELETE FROM accounts WHERE account_id = $1")
            .bind(uid.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for PgAuthRepository {
    async fn insert(&self, session: &Session) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_sessions (
                hash,
                uid,
                expire_at,
                bound_ip,
                user_agent,
                integrity_tag,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&session.hash)
        .bind(session.uid.as_uuid())
        .bind(session.expire_at)
        .bind(session.bound_ip.to_string())
        .bind(&session.user_agent)
        .bind(&session.integrity_tag)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_hash(&self, hash: &str) -> AuthResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT
                hash,
                uid,
                expire_at,
                bound_ip,
                user_agent,
                integrity_tag,
                created_at
            FROM auth_sessions
            WHERE hash = $1
            "#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_session()).transpose()
    }

    async fn delete_by_hash(&self, hash: &str) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_sessions WHERE hash = $1")
            .bind(hash)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_for_account(&self, uid: &AccountId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_sessions WHERE uid = $1")
            .bind(uid.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_sessions WHERE expire_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(sessions_deleted = deleted, "Cleaned up expired sessions");

        Ok(deleted)
    }
}

// ============================================================================
// Token Repository Implementation
// ============================================================================

impl TokenRepository for PgAuthRepository {
    async fn insert(&self, token: &ActionToken) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO auth_tokens (
                id,
                uid,
                token,
                kind,
                expire_at
            ) VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.id.as_uuid())
        .bind(token.uid.as_uuid())
        .bind(&token.token)
        .bind(token.kind.code())
        .bind(token.expire_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(AuthError::TokenPending),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_for_account(
        &self,
        uid: &AccountId,
        kind: TokenKind,
    ) -> AuthResult<Option<ActionToken>> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT id, uid, token, kind, expire_at
            FROM auth_tokens
            WHERE uid = $1 AND kind = $2
            "#,
        )
        .bind(uid.as_uuid())
        .bind(kind.code())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_token()).transpose()
    }

    async fn find_by_token(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> AuthResult<Option<ActionToken>> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT id, uid, token, kind, expire_at
            FROM auth_tokens
            WHERE token = $1 AND kind = $2
            "#,
        )
        .bind(token)
        .bind(kind.code())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_token()).transpose()
    }

    async fn delete_by_id(&self, id: &TokenId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_tokens WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_for_account(&self, uid: &AccountId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_tokens WHERE uid = $1")
            .bind(uid.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_tokens WHERE expire_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(tokens_deleted = deleted, "Cleaned up expired action tokens");

        Ok(deleted)
    }
}

// ============================================================================
// Attempt Repository Implementation
// ============================================================================

impl AttemptRepository for PgAuthRepository {
    async fn insert(&self, attempt: &Attempt) -> AuthResult<()> {
        sqlx::query("INSERT INTO auth_attempts (ip, expire_at, note) VALUES ($1, $2, $3)")
            .bind(attempt.ip.to_string())
            .bind(attempt.expire_at)
            .bind(&attempt.note)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn count_for_ip(&self, ip: IpAddr) -> AuthResult<u32> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM auth_attempts WHERE ip = $1")
                .bind(ip.to_string())
                .fetch_one(&self.pool)
                .await?;

        Ok(count.max(0) as u32)
    }

    async fn delete_expired(&self, now: DateTime<Utc>, ip: Option<IpAddr>) -> AuthResult<u64> {
        let deleted = match ip {
            Some(ip) => {
                sqlx::query("DELETE FROM auth_attempts WHERE expire_at < $1 AND ip = $2")
                    .bind(now)
                    .bind(ip.to_string())
                    .execute(&self.pool)
                    .await?
                    .rows_affected()
            }
            None => {
                sqlx::query("DELETE FROM auth_attempts WHERE expire_at < $1")
                    .bind(now)
                    .execute(&self.pool)
                    .await?
                    .rows_affected()
            }
        };

        Ok(deleted)
    }
}

// ============================================================================
// Directory Repository Implementation
// ============================================================================

impl DirectoryRepository for PgAuthRepository {
    async fn role_entries(&self) -> AuthResult<Vec<(i16, String)>> {
        let rows = sqlx::query_as::<_, (i16, String)>(
            "SELECT id, name FROM auth_roles WHERE active = TRUE",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn group_entries(&self) -> AuthResult<Vec<(i16, String)>> {
        let rows = sqlx::query_as::<_, (i16, String)>(
            "SELECT id, name FROM auth_groups WHERE active = TRUE",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct AccountRow {
    account_id: Uuid,
    email: String,
    password_hash: String,
    active: bool,
    role_id: i16,
    group_id: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self) -> AuthResult<Account> {
        let password_hash = CredentialDigest::from_phc_string(self.password_hash)
            .map_err(|e| AuthError::Internal(format!("Invalid stored digest: {}", e)))?;

        Ok(Account {
            account_id: AccountId::from_uuid(self.account_id),
            email: EmailAddress::from_db(self.email),
            password_hash,
            active: self.active,
            role_id: self.role_id,
            group_id: self.group_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    hash: String,
    uid: Uuid,
    expire_at: DateTime<Utc>,
    bound_ip: String,
    user_agent: Option<String>,
    integrity_tag: String,
    created_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> AuthResult<Session> {
        let bound_ip = self
            .bound_ip
            .parse()
            .map_err(|_| AuthError::Internal(format!("Invalid stored ip: {}", self.bound_ip)))?;

        Ok(Session {
            hash: self.hash,
            uid: AccountId::from_uuid(self.uid),
            expire_at: self.expire_at,
            bound_ip,
            user_agent: self.user_agent,
            integrity_tag: self.integrity_tag,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: Uuid,
    uid: Uuid,
    token: String,
    kind: String,
    expire_at: DateTime<Utc>,
}

impl TokenRow {
    fn into_token(self) -> AuthResult<ActionToken> {
        let kind = TokenKind::from_code(&self.kind)
            .ok_or_else(|| AuthError::Internal(format!("Invalid token kind: {}", self.kind)))?;

        Ok(ActionToken {
            id: TokenId::from_uuid(self.id),
            uid: AccountId::from_uuid(self.uid),
            token: self.token,
            kind,
            expire_at: self.expire_at,
        })
    }
}
