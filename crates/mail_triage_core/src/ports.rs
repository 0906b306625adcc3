//! crates/mail_triage_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific implementations like databases or model APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AuthSession, Category, HistoryRecord, Identity, NewHistoryEntry, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Item already exists: {0}")]
    AlreadyExists(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stores a new user. Fails with `AlreadyExists` without touching the
    /// existing row when the email is taken.
    async fn insert_user(&self, user: UserCredentials) -> PortResult<()>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_auth_session(&self, session: AuthSession) -> PortResult<()>;

    /// Resolves an unexpired session to the identity it is bound to.
    /// Unknown and expired sessions are both `NotFound`.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Identity>;

    /// Deleting a session that does not exist is not an error.
    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    /// Removes every session that expired before `now`, returning how many went.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> PortResult<u64>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Stores the entry under a fresh, increasing id.
    async fn append(&self, entry: NewHistoryEntry) -> PortResult<HistoryRecord>;

    /// Most recent first. Only ever returns records owned by `owner_email`.
    async fn list_for_user(&self, owner_email: &str) -> PortResult<Vec<HistoryRecord>>;
}

//=========================================================================================
// Model Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait EmailAnalysisService: Send + Sync {
    /// Asks the model for a category label. The raw answer is returned as-is;
    /// interpreting it is up to the caller.
    async fn classify_email(&self, text: &str) -> PortResult<String>;

    /// Drafts a short reply to the email, given the category it was filed under.
    async fn suggest_reply(&self, text: &str, category: Category) -> PortResult<String>;
}
