use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

use crate::handlers::{ErrorResponse, JsonBody, internal_error, validate_request};
use crate::middleware::auth_middleware::{
    clear_session_cookie, resolve_session, session_cookie,
};
use crate::models::auth::{AuthToken, LoginRequest, SessionInfo, SessionStatus};
use crate::models::user::{CreateUserRequest, User};
use crate::services::auth_service::{AuthError, AuthService};

/// Convert AuthError to HTTP response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AuthError::DuplicateUsername => (
                StatusCode::BAD_REQUEST,
                "duplicate_username",
                "Username already exists",
            ),
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid username or password",
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Invalid authentication token",
            ),
            AuthError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "token_expired",
                "Authentication token has expired",
            ),
            AuthError::DatabaseError(ref msg) => return internal_error(msg),
        };

        ErrorResponse::new(error_type, message).into_response_with(status)
    }
}

/// Handler for user registration
///
/// Creates a new user account with the provided credentials.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User successfully registered", body = User),
        (status = 400, description = "Validation error or username taken", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(auth_service): State<Arc<dyn AuthService>>,
    JsonBody(request): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), Response> {
    validate_request(&request)?;

    match auth_service.register(request).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(user))),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for user login
///
/// Checks the credentials, sets the `session` cookie and returns the token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookie set", body = AuthToken),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(auth_service): State<Arc<dyn AuthService>>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Response, Response> {
    match auth_service.login(request).await {
        Ok(token) => {
            tracing::info!(user_id = token.user_id, "User logged in");
            let cookie = session_cookie(&token.token);
            Ok(([(SET_COOKIE, cookie)], Json(token)).into_response())
        }
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for logout
///
/// Clears the session cookie. Tokens are stateless, so nothing is stored.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cookie cleared")
    ),
    tag = "auth"
)]
pub async fn logout_handler() -> Response {
    ([(SET_COOKIE, clear_session_cookie())], Json(json!({ "ok": true }))).into_response()
}

/// Handler for the session check
#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Whether the caller holds a valid session", body = SessionStatus)
    ),
    tag = "auth"
)]
pub async fn session_handler(
    State(auth_service): State<Arc<dyn AuthService>>,
    headers: HeaderMap,
) -> Json<SessionStatus> {
    let user = resolve_session(auth_service.as_ref(), &headers).await.ok();

    Json(SessionStatus {
        authenticated: user.is_some(),
        user: user.map(|user| SessionInfo {
            user_id: user.user_id,
            name: user.name,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::in_memory::InMemoryRepositories;
    use crate::services::auth_service::AuthServiceImpl;
    use axum::http::header::COOKIE;

    fn auth_service() -> Arc<dyn AuthService> {
        Arc::new(AuthServiceImpl::new(
            InMemoryRepositories::new(),
            "test_secret".to_string(),
            4,
        ))
    }

    fn register_request(password: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: "Test User".to_string(),
            username: "tester".to_string(),
            password: password.to_string(),
        }
    }

    fn login_request(password: &str) -> LoginRequest {
        LoginRequest {
            username: "tester".to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_handler_success() {
        let result = register_handler(State(auth_service()), JsonBody(register_request("password123"))).await;

        let (status, Json(user)) = result.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user.name, "Test User");
        assert_eq!(user.username, "tester");
    }

    #[tokio::test]
    async fn test_register_handler_short_password() {
        let result = register_handler(State(auth_service()), JsonBody(register_request("123"))).await;

        let response = result.unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_handler_duplicate_username() {
        let auth_service = auth_service();
        let _ = register_handler(State(auth_service.clone()), JsonBody(register_request("password123"))).await;

        let result = register_handler(State(auth_service), JsonBody(register_request("password123"))).await;
        assert_eq!(result.unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_handler_sets_session_cookie() {
        let auth_service = auth_service();
        let _ = register_handler(State(auth_service.clone()), JsonBody(register_request("password123"))).await;

        let response = login_handler(State(auth_service), JsonBody(login_request("password123")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn test_login_handler_invalid_credentials() {
        let auth_service = auth_service();
        let _ = register_handler(State(auth_service.clone()), JsonBody(register_request("password123"))).await;

        let result = login_handler(State(auth_service), JsonBody(login_request("wrongpassword"))).await;
        assert_eq!(result.unwrap_err().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_clears_cookie() {
        let response = logout_handler().await;

        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_session_handler() {
        let auth_service = auth_service();
        let _ = register_handler(State(auth_service.clone()), JsonBody(register_request("password123"))).await;
        let token = auth_service.login(login_request("password123")).await.unwrap();

        let Json(anonymous) = session_handler(State(auth_service.clone()), HeaderMap::new()).await;
        assert!(!anonymous.authenticated);
        assert!(anonymous.user.is_none());

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, format!("session={}", token.token).parse().unwrap());
        let Json(status) = session_handler(State(auth_service), headers).await;
        assert!(status.authenticated);
        assert_eq!(status.user.unwrap().name, "Test User");
    }
}
