//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the durable implementation of the
//! storage ports from the `core` crate. It handles all interactions with the
//! PostgreSQL database using `sqlx`.
//!
//! Queries are checked at runtime rather than with the `query!` macros so the
//! crate builds without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mail_triage_core::domain::{
    AuthSession, Category, HistoryRecord, Identity, NewHistoryEntry, UserCredentials,
};
use mail_triage_core::ports::{
    CredentialStore, HistoryStore, PortError, PortResult, SessionStore,
};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    email: String,
    display_name: String,
    hashed_password: String,
}
impl UserRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            email: self.email,
            display_name: self.display_name,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct IdentityRecord {
    email: String,
    display_name: String,
}
impl IdentityRecord {
    fn to_domain(self) -> Identity {
        Identity {
            email: self.email,
            display_name: self.display_name,
        }
    }
}

#[derive(FromRow)]
struct HistoryRow {
    id: i64,
    owner_email: String,
    text_excerpt: String,
    category: String,
    suggestion: String,
    created_at: DateTime<Utc>,
}
impl HistoryRow {
    fn to_domain(self) -> PortResult<HistoryRecord> {
        let category = self
            .category
            .parse::<Category>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(HistoryRecord {
            id: self.id,
            owner_email: self.owner_email,
            text_excerpt: self.text_excerpt,
            category,
            suggestion: self.suggestion,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `CredentialStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CredentialStore for DbAdapter {
    async fn insert_user(&self, user: UserCredentials) -> PortResult<()> {
        // ON CONFLICT keeps the existing row untouched; zero rows means the email was taken.
        let result = sqlx::query(
            "INSERT INTO users (email, display_name, hashed_password) VALUES ($1, $2, $3) \
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.hashed_password)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::AlreadyExists(format!("User {}", user.email)));
        }
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT email, display_name, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for DbAdapter {
    async fn create_auth_session(&self, session: AuthSession) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_email, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(&session.user_email)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Identity> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            "SELECT u.email, u.display_name FROM auth_sessions s \
             JOIN users u ON u.email = s.user_email \
             WHERE s.id = $1 AND s.expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("Auth session not found".to_string()),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }
}

//=========================================================================================
// `HistoryStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl HistoryStore for DbAdapter {
    async fn append(&self, entry: NewHistoryEntry) -> PortResult<HistoryRecord> {
        let row = sqlx::query_as::<_, HistoryRow>(
            "INSERT INTO email_history (owner_email, text_excerpt, category, suggestion) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, owner_email, text_excerpt, category, suggestion, created_at",
        )
        .bind(&entry.owner_email)
        .bind(&entry.text_excerpt)
        .bind(entry.category.as_str())
        .bind(&entry.suggestion)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        row.to_domain()
    }

    async fn list_for_user(&self, owner_email: &str) -> PortResult<Vec<HistoryRecord>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT id, owner_email, text_excerpt, category, suggestion, created_at \
             FROM email_history WHERE owner_email = $1 ORDER BY id DESC",
        )
        .bind(owner_email)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        rows.into_iter().map(|r| r.to_domain()).collect()
    }
}
