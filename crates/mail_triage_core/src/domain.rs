//! crates/mail_triage_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP framework.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

//=========================================================================================
// Users and Identities
//=========================================================================================

/// Represents a registered user - safe to hand around the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub email: String,
    pub display_name: String,
}

// Only used internally for signup/login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub email: String,
    pub display_name: String,
    pub hashed_password: String,
}

impl UserCredentials {
    pub fn to_user(&self) -> User {
        User {
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// The principal bound to an authenticated session.
///
/// The email is the lookup key for everything the user owns; nothing else is
/// attached to an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub display_name: String,
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            display_name: user.display_name,
        }
    }
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_email: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

//=========================================================================================
// Classification
//=========================================================================================

/// The two possible outcomes of classifying an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Productive,
    Unproductive,
}

impl Category {
    /// The category used whenever the classifier cannot give a usable answer.
    pub const DEFAULT: Category = Category::Unproductive;

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Productive => "Productive",
            Category::Unproductive => "Unproductive",
        }
    }

    /// Interprets a free-form model answer.
    ///
    /// Surrounding whitespace, quotes and a trailing period are ignored and the
    /// comparison is case-insensitive. Anything else yields `None`.
    pub fn from_model_label(raw: &str) -> Option<Category> {
        let label = raw
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
            .trim_end_matches('.')
            .trim();
        if label.eq_ignore_ascii_case("productive") {
            Some(Category::Productive)
        } else if label.eq_ignore_ascii_case("unproductive") {
            Some(Category::Unproductive)
        } else {
            None
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

/// Strict parsing, used for values read back from storage.
impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Productive" => Ok(Category::Productive),
            "Unproductive" => Ok(Category::Unproductive),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

//=========================================================================================
// Documents and History
//=========================================================================================

/// The content a caller submits for processing.
#[derive(Debug, Clone)]
pub enum DocumentInput {
    /// An uploaded file; the extension of `file_name` selects the extractor.
    File { file_name: String, data: Bytes },
    /// Email text typed or pasted directly into the form.
    InlineText(String),
}

/// A history entry that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub owner_email: String,
    pub text_excerpt: String,
    pub category: Category,
    pub suggestion: String,
}

/// One processed document, owned by exactly one user. Never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub id: i64,
    pub owner_email: String,
    pub text_excerpt: String,
    pub category: Category,
    pub suggestion: String,
    pub created_at: DateTime<Utc>,
}

/// What the caller gets back from a successful processing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub category: Category,
    pub suggestion: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_labels_are_normalised() {
        assert_eq!(Category::from_model_label("Productive"), Some(Category::Productive));
        assert_eq!(Category::from_model_label("  unproductive.\n"), Some(Category::Unproductive));
        assert_eq!(Category::from_model_label("\"PRODUCTIVE\""), Some(Category::Productive));
        assert_eq!(Category::from_model_label("Productive email"), None);
        assert_eq!(Category::from_model_label(""), None);
    }

    #[test]
    fn stored_categories_parse_strictly() {
        assert_eq!("Productive".parse::<Category>().unwrap(), Category::Productive);
        assert!("productive".parse::<Category>().is_err());
        assert_eq!(Category::Unproductive.to_string(), "Unproductive");
    }

    #[test]
    fn sessions_expire_at_their_deadline() {
        let now = Utc::now();
        let session = AuthSession {
            id: "s".into(),
            user_email: "a@x.com".into(),
            expires_at: now,
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - chrono::Duration::seconds(1)));
    }
}
