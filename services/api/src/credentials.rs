//! services/api/src/credentials.rs
//!
//! Signup and credential checks on top of the `CredentialStore` port.
//! Passwords are hashed with Argon2 and a fresh random salt per user.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use mail_triage_core::{CredentialStore, PortError, User, UserCredentials};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Missing required field: {0}")]
    InvalidInput(&'static str),
    #[error("This email is already registered")]
    AlreadyExists,
    #[error("Failed to hash password: {0}")]
    Hashing(String),
    #[error("Credential storage failed: {0}")]
    Storage(#[from] PortError),
}

/// Creates users and verifies their passwords.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
}

impl CredentialService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Registers a new user. All three fields must be non-blank; the email must
    /// not be registered yet. A failed attempt leaves the store untouched.
    pub async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
    ) -> Result<User, CredentialError> {
        let email = email.trim();
        let display_name = display_name.trim();
        if email.is_empty() {
            return Err(CredentialError::InvalidInput("email"));
        }
        if display_name.is_empty() {
            return Err(CredentialError::InvalidInput("name"));
        }
        if password.is_empty() {
            return Err(CredentialError::InvalidInput("password"));
        }

        let hashed_password = hash_password(password)?;
        let credentials = UserCredentials {
            email: email.to_string(),
            display_name: display_name.to_string(),
            hashed_password,
        };
        let user = credentials.to_user();

        match self.store.insert_user(credentials).await {
            Ok(()) => {
                info!("Registered user {}", user.email);
                Ok(user)
            }
            Err(PortError::AlreadyExists(_)) => Err(CredentialError::AlreadyExists),
            Err(e) => Err(CredentialError::Storage(e)),
        }
    }

    /// Returns the user iff the email is known and the password matches.
    ///
    /// Unknown email and wrong password both come back as `Ok(None)`.
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, PortError> {
        let credentials = match self.store.get_user_by_email(email.trim()).await {
            Ok(credentials) => credentials,
            Err(PortError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let parsed_hash = match PasswordHash::new(&credentials.hashed_password) {
            Ok(hash) => hash,
            Err(e) => {
                error!("Stored password hash for {} is unreadable: {:?}", credentials.email, e);
                return Ok(None);
            }
        };

        let valid = Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok();

        Ok(valid.then(|| credentials.to_user()))
    }
}

fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hashing(e.to_string()))
}
