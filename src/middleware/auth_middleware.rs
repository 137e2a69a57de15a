use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, header::COOKIE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

use crate::services::auth_service::{AuthError, AuthService, SESSION_TTL_HOURS};

pub const SESSION_COOKIE_NAME: &str = "session";

/// Where the browser client sends users without a session
pub const LOGIN_PAGE: &str = "/login.html";

/// Extension type carrying the session owner through the request
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub name: String,
}

/// Values of every cookie called `name`, in header order
fn extract_cookies(headers: &HeaderMap, name: &str) -> Vec<String> {
    headers
        .get_all(COOKIE)
        .into_iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let mut split = pair.trim().splitn(2, '=');
            let key = split.next()?.trim();
            let value = split.next()?.trim();
            (key == name && !value.is_empty()).then(|| value.to_owned())
        })
        .collect()
}

/// Candidate session tokens: session cookies first, then a bearer token
pub fn session_tokens(headers: &HeaderMap) -> Vec<String> {
    let mut tokens = extract_cookies(headers, SESSION_COOKIE_NAME);

    if let Some(bearer) = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        tokens.push(bearer.trim().to_string());
    }

    tokens
}

/// `Set-Cookie` value establishing a session
pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE_NAME,
        token,
        SESSION_TTL_HOURS * 3600
    )
}

/// `Set-Cookie` value removing the session
pub fn clear_session_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE_NAME
    )
}

/// Resolves the first valid token to its session
pub async fn resolve_session(
    auth_service: &dyn AuthService,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, SessionError> {
    let tokens = session_tokens(headers);
    if tokens.is_empty() {
        return Err(SessionError::MissingSession);
    }

    let mut failure = SessionError::InvalidSession;
    for token in tokens {
        match auth_service.validate_token(&token).await {
            Ok(session) => {
                return Ok(AuthenticatedUser {
                    user_id: session.user_id,
                    name: session.name,
                });
            }
            Err(AuthError::TokenExpired) => failure = SessionError::SessionExpired,
            Err(AuthError::DatabaseError(msg)) => return Err(SessionError::Unavailable(msg)),
            Err(_) => {}
        }
    }

    Err(failure)
}

/// Rejects requests without a valid session and stores the
/// [`AuthenticatedUser`] in the request extensions
pub async fn auth_middleware(
    State(auth_service): State<Arc<dyn AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, SessionError> {
    let user = resolve_session(auth_service.as_ref(), request.headers())
        .await
        .inspect_err(|e| {
            tracing::warn!(path = %request.uri().path(), reason = ?e, "Rejected unauthenticated request");
        })?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Session middleware errors
#[derive(Debug)]
pub enum SessionError {
    MissingSession,
    InvalidSession,
    SessionExpired,
    Unavailable(String),
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let message = match self {
            SessionError::MissingSession => "Not authenticated",
            SessionError::InvalidSession => "Invalid session",
            SessionError::SessionExpired => "Session has expired",
            SessionError::Unavailable(msg) => {
                tracing::error!(error = %msg, "Session lookup failed");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "internal_error",
                        "message": "Internal server error",
                    })),
                )
                    .into_response();
            }
        };

        let body = Json(json!({
            "error": message,
            "redirect": LOGIN_PAGE,
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}
