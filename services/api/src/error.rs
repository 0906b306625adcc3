//! services/api/src/error.rs
//!
//! Defines the error types for the API service: `ApiError` for failures while
//! starting the server, and `RequestError` for everything a handler can answer
//! with.

use crate::config::ConfigError;
use crate::credentials::CredentialError;
use crate::gate::GateError;
use crate::pipeline::ProcessingError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mail_triage_core::ports::PortError;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// The primary startup error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying the schema migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// Request Errors
//=========================================================================================

/// The JSON body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code, e.g. `no_content`.
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

/// Everything a request handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("This email is already registered")]
    AlreadyExists,
    #[error("Login required")]
    Unauthorized,
    #[error("No such endpoint")]
    NotFound,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Unsupported file format: {0}. Use .txt or .pdf")]
    UnsupportedFormat(String),
    #[error("File is not valid UTF-8 text")]
    InvalidEncoding,
    #[error("Could not read any text from the document")]
    ExtractionFailed,
    #[error("No email content provided")]
    NoContent,
    #[error("The analysis capability is not configured")]
    CapabilityUnavailable,
    /// Details are logged, never sent to the client.
    #[error("Internal server error")]
    StorageUnavailable(String),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::InvalidInput(_)
            | RequestError::UnsupportedFormat(_)
            | RequestError::InvalidEncoding
            | RequestError::ExtractionFailed
            | RequestError::NoContent => StatusCode::BAD_REQUEST,
            RequestError::AlreadyExists => StatusCode::CONFLICT,
            RequestError::NotFound => StatusCode::NOT_FOUND,
            RequestError::Unauthorized | RequestError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            RequestError::CapabilityUnavailable | RequestError::StorageUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RequestError::InvalidInput(_) => "invalid_input",
            RequestError::AlreadyExists => "already_exists",
            RequestError::Unauthorized => "unauthorized",
            RequestError::NotFound => "not_found",
            RequestError::InvalidCredentials => "invalid_credentials",
            RequestError::UnsupportedFormat(_) => "unsupported_format",
            RequestError::InvalidEncoding => "invalid_encoding",
            RequestError::ExtractionFailed => "extraction_failed",
            RequestError::NoContent => "no_content",
            RequestError::CapabilityUnavailable => "capability_unavailable",
            RequestError::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        if let RequestError::StorageUnavailable(detail) = &self {
            error!("Storage failure while serving request: {}", detail);
        }
        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<PortError> for RequestError {
    fn from(e: PortError) -> Self {
        RequestError::StorageUnavailable(e.to_string())
    }
}

impl From<CredentialError> for RequestError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::InvalidInput(field) => {
                RequestError::InvalidInput(format!("Missing required field: {}", field))
            }
            CredentialError::AlreadyExists => RequestError::AlreadyExists,
            CredentialError::Hashing(msg) => RequestError::StorageUnavailable(msg),
            CredentialError::Storage(e) => e.into(),
        }
    }
}

impl From<GateError> for RequestError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Unauthorized => RequestError::InvalidCredentials,
            GateError::Storage(e) => e.into(),
        }
    }
}

impl From<ProcessingError> for RequestError {
    fn from(e: ProcessingError) -> Self {
        match e {
            ProcessingError::NoContent => RequestError::NoContent,
            ProcessingError::UnsupportedFormat(name) => RequestError::UnsupportedFormat(name),
            ProcessingError::InvalidEncoding(_) => RequestError::InvalidEncoding,
            ProcessingError::ExtractionFailed(_) => RequestError::ExtractionFailed,
            ProcessingError::CapabilityUnavailable => RequestError::CapabilityUnavailable,
            ProcessingError::Storage(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(RequestError::InvalidInput("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(RequestError::AlreadyExists.status(), StatusCode::CONFLICT);
        assert_eq!(RequestError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(RequestError::NoContent.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RequestError::UnsupportedFormat("a.csv".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RequestError::StorageUnavailable("db down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_details_stay_out_of_the_message() {
        let e: RequestError = PortError::Unexpected("password=hunter2".into()).into();
        assert_eq!(e.code(), "storage_unavailable");
        assert!(!e.to_string().contains("hunter2"));
    }

    #[test]
    fn processing_errors_map_to_request_errors() {
        let e: RequestError = ProcessingError::UnsupportedFormat("a.csv".into()).into();
        assert_eq!(e.code(), "unsupported_format");
        let e: RequestError = ProcessingError::NoContent.into();
        assert_eq!(e.code(), "no_content");
    }
}
