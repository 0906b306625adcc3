//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the storage ports. Used by the tests and
//! whenever the service starts without a `DATABASE_URL`; nothing survives a
//! restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mail_triage_core::domain::{
    AuthSession, HistoryRecord, Identity, NewHistoryEntry, UserCredentials,
};
use mail_triage_core::ports::{
    CredentialStore, HistoryStore, PortError, PortResult, SessionStore,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct HistoryLog {
    next_id: i64,
    records: Vec<HistoryRecord>,
}

/// Users, sessions and history held in memory behind async locks.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserCredentials>>,
    sessions: RwLock<HashMap<String, AuthSession>>,
    history: RwLock<HistoryLog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_user(&self, user: UserCredentials) -> PortResult<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(PortError::AlreadyExists(format!("User {}", user.email)));
        }
        users.insert(user.email.clone(), user);
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.users
            .read()
            .await
            .get(email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_auth_session(&self, session: AuthSession) -> PortResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Identity> {
        let user_email = {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                Some(session) if !session.is_expired(Utc::now()) => session.user_email.clone(),
                _ => return Err(PortError::NotFound("Auth session not found".to_string())),
            }
        };

        let users = self.users.read().await;
        let user = users
            .get(&user_email)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_email)))?;
        Ok(user.to_user().into())
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> PortResult<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(&self, entry: NewHistoryEntry) -> PortResult<HistoryRecord> {
        let mut log = self.history.write().await;
        log.next_id += 1;
        let record = HistoryRecord {
            id: log.next_id,
            owner_email: entry.owner_email,
            text_excerpt: entry.text_excerpt,
            category: entry.category,
            suggestion: entry.suggestion,
            created_at: Utc::now(),
        };
        log.records.push(record.clone());
        Ok(record)
    }

    async fn list_for_user(&self, owner_email: &str) -> PortResult<Vec<HistoryRecord>> {
        let log = self.history.read().await;
        Ok(log
            .records
            .iter()
            .rev()
            .filter(|r| r.owner_email == owner_email)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mail_triage_core::Category;

    fn credentials(email: &str, name: &str) -> UserCredentials {
        UserCredentials {
            email: email.into(),
            display_name: name.into(),
            hashed_password: "hash".into(),
        }
    }

    fn entry(owner: &str, text: &str) -> NewHistoryEntry {
        NewHistoryEntry {
            owner_email: owner.into(),
            text_excerpt: text.into(),
            category: Category::Productive,
            suggestion: "ok".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_users_are_rejected_without_overwrite() {
        let store = MemoryStore::new();
        store.insert_user(credentials("a@x.com", "First")).await.unwrap();

        let second = store.insert_user(credentials("a@x.com", "Second")).await;
        assert!(matches!(second, Err(PortError::AlreadyExists(_))));

        let stored = store.get_user_by_email("a@x.com").await.unwrap();
        assert_eq!(stored.display_name, "First");
    }

    #[tokio::test]
    async fn history_is_newest_first_and_isolated() {
        let store = MemoryStore::new();
        store.append(entry("a@x.com", "R1")).await.unwrap();
        store.append(entry("b@x.com", "B1")).await.unwrap();
        store.append(entry("a@x.com", "R2")).await.unwrap();
        store.append(entry("b@x.com", "B2")).await.unwrap();
        store.append(entry("a@x.com", "R3")).await.unwrap();

        let texts: Vec<String> = store
            .list_for_user("a@x.com")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.text_excerpt)
            .collect();
        assert_eq!(texts, ["R3", "R2", "R1"]);

        let b = store.list_for_user("b@x.com").await.unwrap();
        assert!(b.iter().all(|r| r.owner_email == "b@x.com"));
        assert_eq!(b.len(), 2);
        assert!(store.list_for_user("nobody@x.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ids_increase_monotonically() {
        let store = MemoryStore::new();
        let first = store.append(entry("a@x.com", "1")).await.unwrap();
        let second = store.append(entry("b@x.com", "2")).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn expired_sessions_do_not_validate_and_get_purged() {
        let store = MemoryStore::new();
        store.insert_user(credentials("a@x.com", "A")).await.unwrap();
        let now = Utc::now();
        store
            .create_auth_session(AuthSession {
                id: "live".into(),
                user_email: "a@x.com".into(),
                expires_at: now + Duration::hours(1),
            })
            .await
            .unwrap();
        store
            .create_auth_session(AuthSession {
                id: "stale".into(),
                user_email: "a@x.com".into(),
                expires_at: now - Duration::hours(1),
            })
            .await
            .unwrap();

        let identity = store.validate_auth_session("live").await.unwrap();
        assert_eq!(identity.email, "a@x.com");
        assert_eq!(identity.display_name, "A");
        assert!(store.validate_auth_session("stale").await.is_err());

        assert_eq!(store.purge_expired_sessions(now).await.unwrap(), 1);
        store.delete_auth_session("live").await.unwrap();
        store.delete_auth_session("live").await.unwrap();
        assert!(store.validate_auth_session("live").await.is_err());
    }
}
