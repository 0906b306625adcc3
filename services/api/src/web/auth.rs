//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.
//!
//! Each endpoint serves two kinds of caller. JSON clients get status codes and
//! JSON bodies; browser form posts get redirected to the right page instead.

use axum::{
    extract::{FromRequest, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{ErrorBody, RequestError};
use crate::web::middleware::{clear_session_cookie, session_cookie, SessionToken};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// The public view of a user.
#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub name: String,
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

//=========================================================================================
// Form-or-JSON Extractor
//=========================================================================================

/// A request body that may arrive as JSON or as a URL-encoded browser form.
pub struct Submission<T> {
    pub payload: T,
    pub from_form: bool,
}

impl<S, T> FromRequest<S> for Submission<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = RequestError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_json(req.headers()) {
            let Json(payload) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| RequestError::InvalidInput(e.body_text()))?;
            Ok(Self {
                payload,
                from_form: false,
            })
        } else {
            let Form(payload) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| RequestError::InvalidInput(e.body_text()))?;
            Ok(Self {
                payload,
                from_form: true,
            })
        }
    }
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

pub(crate) fn is_json(headers: &HeaderMap) -> bool {
    content_type(headers).starts_with("application/json")
}

pub(crate) fn is_form(headers: &HeaderMap) -> bool {
    content_type(headers).starts_with("application/x-www-form-urlencoded")
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /signup - Create a new user account
#[utoipa::path(
    post,
    path = "/signup",
    request_body(content = SignupRequest, content_type = "application/json"),
    responses(
        (status = 201, description = "User created successfully", body = UserResponse),
        (status = 303, description = "Browser form post: redirect to the login page"),
        (status = 400, description = "Missing field", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    submission: Submission<SignupRequest>,
) -> Result<Response, RequestError> {
    let req = submission.payload;
    let user = state
        .gate
        .credentials()
        .create_user(&req.email, &req.name, &req.password)
        .await?;

    if submission.from_form {
        return Ok(Redirect::to(&state.config.login_page_url).into_response());
    }

    let response = UserResponse {
        name: user.display_name,
        email: user.email,
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// POST /login - Login with existing account
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Login successful, session cookie set", body = UserResponse),
        (status = 303, description = "Browser form post: redirect to the app page"),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    submission: Submission<LoginRequest>,
) -> Result<Response, RequestError> {
    let req = submission.payload;
    let session = state.gate.login(&req.email, &req.password).await?;

    let cookie = session_cookie(&session.token, state.gate.ttl(), state.config.cookie_secure);

    if submission.from_form {
        return Ok((
            [(header::SET_COOKIE, cookie)],
            Redirect::to(&state.config.app_page_url),
        )
            .into_response());
    }

    let response = UserResponse {
        name: session.identity.display_name,
        email: session.identity.email,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)).into_response())
}

/// POST /logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Logout successful", body = StatusResponse),
        (status = 303, description = "Browser form post: redirect to the login page"),
        (status = 401, description = "No active session", body = ErrorBody)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(SessionToken(token)): Extension<SessionToken>,
    headers: HeaderMap,
) -> Result<Response, RequestError> {
    state.gate.logout(&token).await?;

    let cookie = clear_session_cookie(state.config.cookie_secure);

    if is_form(&headers) {
        return Ok((
            [(header::SET_COOKIE, cookie)],
            Redirect::to(&state.config.login_page_url),
        )
            .into_response());
    }

    let response = StatusResponse {
        status: "logged_out".to_string(),
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)).into_response())
}
