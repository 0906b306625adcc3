//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes, plus the session cookie
//! helpers shared with the auth handlers.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::error::RequestError;
use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// The raw token of the session that authenticated the current request.
#[derive(Clone, Debug)]
pub struct SessionToken(pub String);

/// Middleware that validates the auth session cookie and extracts the identity.
///
/// If valid, inserts the `Identity` and `SessionToken` into request extensions
/// for handlers to use. If invalid or missing, API paths get a JSON 401 and
/// every other path is redirected to the login page. A session store that
/// cannot answer is a 500 on every path.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = session_token(req.headers()).map(str::to_owned);

    let session = match state.gate.resolve(token.as_deref()).await {
        Ok(session) => session,
        Err(e) => return RequestError::from(e).into_response(),
    };

    match session.require_authenticated() {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            if let Some(token) = token {
                req.extensions_mut().insert(SessionToken(token));
            }
            next.run(req).await
        }
        Err(_) => {
            debug!("Rejected anonymous request to {}", req.uri().path());
            unauthorized_response(req.uri().path(), &state.config.login_page_url)
        }
    }
}

/// Renders the "not logged in" condition for the given path.
pub fn unauthorized_response(path: &str, login_page_url: &str) -> Response {
    if is_api_path(path) {
        RequestError::Unauthorized.into_response()
    } else {
        Redirect::to(login_page_url).into_response()
    }
}

fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

/// Finds the session token in the request's `Cookie` header.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|c| {
            let (name, value) = c.trim().split_once('=')?;
            (name == SESSION_COOKIE).then_some(value)
        })
        .filter(|value| !value.is_empty())
}

/// The `Set-Cookie` value that hands a new session to the browser.
pub fn session_cookie(token: &str, max_age: chrono::Duration, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly;{} SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        if secure { " Secure;" } else { "" },
        max_age.num_seconds()
    )
}

/// The `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", chrono::Duration::zero(), secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    #[test]
    fn token_is_found_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=abc-123; lang=pt"));
        assert_eq!(session_token(&headers), Some("abc-123"));
    }

    #[test]
    fn similarly_named_or_empty_cookies_do_not_count() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("old_session=abc; session="));
        assert_eq!(session_token(&headers), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn cookies_carry_the_expected_attributes() {
        let cookie = session_cookie("tok", chrono::Duration::hours(1), true);
        assert_eq!(cookie, "session=tok; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=3600");
        assert_eq!(
            clear_session_cookie(false),
            "session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
        );
    }

    #[test]
    fn api_and_browser_paths_fail_differently() {
        let api = unauthorized_response("/api/history", "/login.html");
        assert_eq!(api.status(), StatusCode::UNAUTHORIZED);

        let browser = unauthorized_response("/", "/login.html");
        assert_eq!(browser.status(), StatusCode::SEE_OTHER);
        assert_eq!(browser.headers()[header::LOCATION], "/login.html");
    }
}
