//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the protected REST API endpoints and the
//! master definition for the OpenAPI specification.

use crate::error::{ErrorBody, RequestError};
use crate::web::auth::{self, is_json, LoginRequest, SignupRequest, StatusResponse, UserResponse};
use crate::web::state::AppState;
use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    response::{IntoResponse, Json, Redirect, Response},
    Extension, Form,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use mail_triage_core::{Category, DocumentInput, HistoryRecord, Identity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        current_user_handler,
        history_handler,
        process_handler,
        health_handler,
    ),
    components(
        schemas(
            SignupRequest,
            LoginRequest,
            UserResponse,
            StatusResponse,
            ErrorBody,
            HistoryItem,
            ProcessTextRequest,
            ProcessResponse,
            HealthResponse,
        )
    ),
    tags(
        (name = "Email Triage API", description = "Classifies emails and suggests replies for logged-in users.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One entry of the caller's processing history.
#[derive(Serialize, ToSchema)]
pub struct HistoryItem {
    pub id: i64,
    pub text: String,
    #[schema(value_type = String, example = "Productive")]
    pub category: Category,
    pub suggestion: String,
    pub created_at: DateTime<Utc>,
}

impl From<HistoryRecord> for HistoryItem {
    fn from(record: HistoryRecord) -> Self {
        Self {
            id: record.id,
            text: record.text_excerpt,
            category: record.category,
            suggestion: record.suggestion,
            created_at: record.created_at,
        }
    }
}

/// Inline email text, for JSON and URL-encoded submissions.
#[derive(Deserialize, ToSchema)]
pub struct ProcessTextRequest {
    #[serde(default)]
    pub email_text: Option<String>,
}

/// The result of processing one email.
#[derive(Serialize, ToSchema)]
pub struct ProcessResponse {
    #[schema(value_type = String, example = "Unproductive")]
    pub category: Category,
    pub suggestion: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// `available` or `unavailable`.
    pub capability: String,
}

//=========================================================================================
// Process Submission Extractor
//=========================================================================================

/// The document a caller submitted, if any.
///
/// Accepts multipart (`file` and/or `email_text` parts), JSON, or a URL-encoded
/// form. Empty file parts and blank text count as absent. Supplying both a
/// file and text, or repeating either part, is rejected.
pub struct ProcessSubmission(pub Option<DocumentInput>);

impl<S> FromRequest<S> for ProcessSubmission
where
    S: Send + Sync,
{
    type Rejection = RequestError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let Some(content_type) = content_type else {
            // A bare POST carries no content at all.
            return Ok(ProcessSubmission(None));
        };

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| RequestError::InvalidInput(e.body_text()))?;
            let (file, text) = read_multipart(multipart).await?;
            return into_input(file, text).map(ProcessSubmission);
        }

        let request = if is_json(req.headers()) {
            let Json(request) = Json::<ProcessTextRequest>::from_request(req, state)
                .await
                .map_err(|e| RequestError::InvalidInput(e.body_text()))?;
            request
        } else {
            let Form(request) = Form::<ProcessTextRequest>::from_request(req, state)
                .await
                .map_err(|e| RequestError::InvalidInput(e.body_text()))?;
            request
        };
        into_input(None, request.email_text).map(ProcessSubmission)
    }
}

async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(Option<(String, Bytes)>, Option<String>), RequestError> {
    let mut file = None;
    let mut text = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RequestError::InvalidInput(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| RequestError::InvalidInput(e.body_text()))?;
                // Browsers send an unnamed, empty part when no file was chosen.
                if file_name.is_empty() {
                    continue;
                }
                if file.replace((file_name, data)).is_some() {
                    return Err(repeated_part("file"));
                }
            }
            "email_text" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| RequestError::InvalidInput(e.body_text()))?;
                if text.replace(value).is_some() {
                    return Err(repeated_part("email_text"));
                }
            }
            _ => {}
        }
    }

    Ok((file, text))
}

fn repeated_part(name: &str) -> RequestError {
    RequestError::InvalidInput(format!("Only one '{}' part is allowed", name))
}

fn into_input(
    file: Option<(String, Bytes)>,
    text: Option<String>,
) -> Result<Option<DocumentInput>, RequestError> {
    let text = text.filter(|t| !t.trim().is_empty());
    match (file, text) {
        (Some(_), Some(_)) => Err(RequestError::InvalidInput(
            "Provide either a file or email_text, not both".to_string(),
        )),
        (Some((file_name, data)), None) => Ok(Some(DocumentInput::File { file_name, data })),
        (None, Some(text)) => Ok(Some(DocumentInput::InlineText(text))),
        (None, None) => Ok(None),
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// GET /api/user - The identity behind the current session.
#[utoipa::path(
    get,
    path = "/api/user",
    responses(
        (status = 200, description = "The logged-in user", body = UserResponse),
        (status = 401, description = "Not logged in", body = ErrorBody)
    )
)]
pub async fn current_user_handler(Extension(identity): Extension<Identity>) -> Json<UserResponse> {
    Json(UserResponse {
        name: identity.display_name,
        email: identity.email,
    })
}

/// GET /api/history - The caller's processed emails, most recent first.
#[utoipa::path(
    get,
    path = "/api/history",
    responses(
        (status = 200, description = "History, most recent first", body = [HistoryItem]),
        (status = 401, description = "Not logged in", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<HistoryItem>>, RequestError> {
    let records = state.history.list_for_user(&identity.email).await?;
    Ok(Json(records.into_iter().map(HistoryItem::from).collect()))
}

/// POST /api/process - Classify an email and suggest a reply.
///
/// Accepts a multipart upload (`file`, `.txt` or `.pdf`) or inline `email_text`.
#[utoipa::path(
    post,
    path = "/api/process",
    request_body(content = ProcessTextRequest, description = "Inline text as JSON, or multipart/form-data with a `file` or `email_text` part."),
    responses(
        (status = 200, description = "Email processed and saved to history", body = ProcessResponse),
        (status = 400, description = "No content, unsupported format, or unreadable file", body = ErrorBody),
        (status = 401, description = "Not logged in", body = ErrorBody),
        (status = 500, description = "Capability not configured or storage failure", body = ErrorBody)
    )
)]
pub async fn process_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ProcessSubmission(input): ProcessSubmission,
) -> Result<Json<ProcessResponse>, RequestError> {
    let outcome = state.pipeline.process_document(input, &identity).await?;
    Ok(Json(ProcessResponse {
        category: outcome.category,
        suggestion: outcome.suggestion,
    }))
}

/// GET /health - Liveness and capability status.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let capability = if state.pipeline.analyzer().is_available() {
        "available"
    } else {
        "unavailable"
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        capability: capability.to_string(),
    })
}

/// GET / - Browser entry point; logged-in users go straight to the app page.
pub async fn home_handler(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::to(&state.config.app_page_url)
}

/// Any other `/api/*` path. Only reachable once logged in.
pub async fn api_not_found_handler() -> Response {
    RequestError::NotFound.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_and_no_file_is_no_input() {
        assert!(into_input(None, None).unwrap().is_none());
        assert!(into_input(None, Some("   ".into())).unwrap().is_none());
    }

    #[test]
    fn both_file_and_text_is_ambiguous() {
        let file = Some(("a.txt".to_string(), Bytes::from_static(b"hi")));
        assert!(matches!(
            into_input(file, Some("hello".into())),
            Err(RequestError::InvalidInput(_))
        ));
    }

    #[test]
    fn file_with_blank_text_is_a_file() {
        let file = Some(("a.txt".to_string(), Bytes::from_static(b"hi")));
        match into_input(file, Some("".into())).unwrap() {
            Some(DocumentInput::File { file_name, .. }) => assert_eq!(file_name, "a.txt"),
            other => panic!("expected a file, got {:?}", other),
        }
    }
}
