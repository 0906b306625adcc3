//! services/api/src/gate.rs
//!
//! The session gate: turns credentials into a server-side session and a
//! session token back into the identity it is bound to.
//!
//! Every request starts `Anonymous` and becomes `Authenticated` only through a
//! token the store recognises. The identity is never taken from anywhere else.

use crate::credentials::CredentialService;
use chrono::{DateTime, Utc};
use mail_triage_core::{AuthSession, Identity, PortError, PortResult, SessionStore};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// The authentication state of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated(Identity),
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Invalid email or password")]
    Unauthorized,
    #[error("Session storage failed: {0}")]
    Storage(#[from] PortError),
}

impl SessionState {
    pub fn current_identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Authenticated(identity) => Some(identity),
        }
    }

    pub fn require_authenticated(self) -> Result<Identity, GateError> {
        match self {
            SessionState::Anonymous => Err(GateError::Unauthorized),
            SessionState::Authenticated(identity) => Ok(identity),
        }
    }
}

/// A freshly established session, ready to be handed to the client.
#[derive(Debug, Clone)]
pub struct EstablishedSession {
    pub token: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionGate {
    credentials: CredentialService,
    sessions: Arc<dyn SessionStore>,
    ttl: chrono::Duration,
}

impl SessionGate {
    pub fn new(
        credentials: CredentialService,
        sessions: Arc<dyn SessionStore>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            credentials,
            sessions,
            ttl,
        }
    }

    pub fn credentials(&self) -> &CredentialService {
        &self.credentials
    }

    /// Checks the credentials and opens a new session bound to the user's email.
    pub async fn login(&self, email: &str, password: &str) -> Result<EstablishedSession, GateError> {
        let user = self
            .credentials
            .verify_credentials(email, password)
            .await?
            .ok_or(GateError::Unauthorized)?;

        let session = AuthSession {
            id: Uuid::new_v4().to_string(),
            user_email: user.email.clone(),
            expires_at: Utc::now() + self.ttl,
        };
        let established = EstablishedSession {
            token: session.id.clone(),
            expires_at: session.expires_at,
            identity: user.into(),
        };
        self.sessions.create_auth_session(session).await?;

        info!("User {} logged in", established.identity.email);
        Ok(established)
    }

    /// Ends the session behind `token`. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> PortResult<()> {
        self.sessions.delete_auth_session(token).await
    }

    /// Resolves the request's token, if any, to a session state.
    ///
    /// Unknown and expired tokens are anonymous. A store that cannot answer
    /// is an error, never a silent logout.
    pub async fn resolve(&self, token: Option<&str>) -> PortResult<SessionState> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(SessionState::Anonymous);
        };
        match self.sessions.validate_auth_session(token).await {
            Ok(identity) => Ok(SessionState::Authenticated(identity)),
            Err(PortError::NotFound(_)) => Ok(SessionState::Anonymous),
            Err(e) => {
                error!("Failed to validate auth session: {:?}", e);
                Err(e)
            }
        }
    }

    /// Drops every expired session from the store.
    pub async fn purge_expired(&self) -> PortResult<u64> {
        self.sessions.purge_expired_sessions(Utc::now()).await
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use async_trait::async_trait;

    async fn gate_with_alice() -> SessionGate {
        let store = Arc::new(MemoryStore::new());
        let credentials = CredentialService::new(store.clone());
        credentials.create_user("alice@x.com", "Alice", "pw123").await.unwrap();
        SessionGate::new(credentials, store, chrono::Duration::hours(1))
    }

    #[tokio::test]
    async fn login_binds_the_session_to_the_email() {
        let gate = gate_with_alice().await;
        let session = gate.login("alice@x.com", "pw123").await.unwrap();
        assert_eq!(session.identity.email, "alice@x.com");
        assert_eq!(session.identity.display_name, "Alice");

        let state = gate.resolve(Some(&session.token)).await.unwrap();
        assert_eq!(state.current_identity(), Some(&session.identity));
        assert_eq!(state.require_authenticated().unwrap().email, "alice@x.com");
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized() {
        let gate = gate_with_alice().await;
        assert!(matches!(gate.login("alice@x.com", "wrong").await, Err(GateError::Unauthorized)));
        assert!(matches!(gate.login("bob@x.com", "pw123").await, Err(GateError::Unauthorized)));
    }

    #[tokio::test]
    async fn missing_or_unknown_tokens_are_anonymous() {
        let gate = gate_with_alice().await;
        assert_eq!(gate.resolve(None).await.unwrap(), SessionState::Anonymous);
        assert_eq!(gate.resolve(Some("")).await.unwrap(), SessionState::Anonymous);
        let state = gate.resolve(Some("forged")).await.unwrap();
        assert!(state.current_identity().is_none());
        assert!(matches!(state.require_authenticated(), Err(GateError::Unauthorized)));
    }

    #[tokio::test]
    async fn logout_ends_the_session_and_is_idempotent() {
        let gate = gate_with_alice().await;
        let session = gate.login("alice@x.com", "pw123").await.unwrap();

        gate.logout(&session.token).await.unwrap();
        assert_eq!(gate.resolve(Some(&session.token)).await.unwrap(), SessionState::Anonymous);
        gate.logout(&session.token).await.unwrap();
    }

    #[tokio::test]
    async fn each_login_gets_its_own_token() {
        let gate = gate_with_alice().await;
        let first = gate.login("alice@x.com", "pw123").await.unwrap();
        let second = gate.login("alice@x.com", "pw123").await.unwrap();
        assert_ne!(first.token, second.token);

        gate.logout(&first.token).await.unwrap();
        assert!(gate.resolve(Some(&second.token)).await.unwrap().current_identity().is_some());
    }

    /// A session store whose backend is down.
    struct UnreachableSessions;

    #[async_trait]
    impl SessionStore for UnreachableSessions {
        async fn create_auth_session(&self, _session: AuthSession) -> PortResult<()> {
            Err(PortError::Unexpected("db down".into()))
        }

        async fn validate_auth_session(&self, _session_id: &str) -> PortResult<Identity> {
            Err(PortError::Unexpected("db down".into()))
        }

        async fn delete_auth_session(&self, _session_id: &str) -> PortResult<()> {
            Err(PortError::Unexpected("db down".into()))
        }

        async fn purge_expired_sessions(&self, _now: DateTime<Utc>) -> PortResult<u64> {
            Err(PortError::Unexpected("db down".into()))
        }
    }

    #[tokio::test]
    async fn an_unreachable_store_is_an_error_not_anonymous() {
        let credentials = CredentialService::new(Arc::new(MemoryStore::new()));
        let gate = SessionGate::new(credentials, Arc::new(UnreachableSessions), chrono::Duration::hours(1));

        assert!(matches!(gate.resolve(Some("some-token")).await, Err(PortError::Unexpected(_))));
        // No token means no lookup, so there is nothing to fail.
        assert_eq!(gate.resolve(None).await.unwrap(), SessionState::Anonymous);
    }
}
