use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::handlers::{ErrorResponse, JsonBody, internal_error, validate_request};
use crate::middleware::auth_middleware::AuthenticatedUser;
use crate::models::user::{
    ChangePasswordRequest, CreateUserRequest, UpdateUserRequest, User, UserSummary,
};
use crate::services::user_service::{UserError, UserService};

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        match self {
            UserError::NotFound => ErrorResponse::new("user_not_found", "User not found")
                .into_response_with(StatusCode::NOT_FOUND),
            UserError::DuplicateUsername => {
                ErrorResponse::new("duplicate_username", "Username already exists")
                    .into_response_with(StatusCode::BAD_REQUEST)
            }
            UserError::SelfModification => ErrorResponse::new(
                "self_modification",
                "You cannot edit or delete your own account here",
            )
            .into_response_with(StatusCode::FORBIDDEN),
            UserError::HasExpenses(count) => ErrorResponse::new(
                "user_has_expenses",
                format!("User still owns {} expense(s)", count),
            )
            .with_usage_count(count)
            .into_response_with(StatusCode::BAD_REQUEST),
            UserError::DatabaseError(msg) => internal_error(&msg),
        }
    }
}

/// Handler for listing users
///
/// `is_current` marks the caller.
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = Vec<UserSummary>),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_users_handler(
    State(user_service): State<Arc<dyn UserService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<UserSummary>>, Response> {
    match user_service.list(auth_user.user_id).await {
        Ok(users) => Ok(Json(users)),
        Err(e) => Err(e.into_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user_handler(
    State(user_service): State<Arc<dyn UserService>>,
    Path(id): Path<i64>,
) -> Result<Json<User>, Response> {
    match user_service.get(id).await {
        Ok(user) => Ok(Json(user)),
        Err(e) => Err(e.into_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Validation error or username taken", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn create_user_handler(
    State(user_service): State<Arc<dyn UserService>>,
    JsonBody(request): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), Response> {
    validate_request(&request)?;

    match user_service.create(request).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(user))),
        Err(e) => Err(e.into_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Validation error or username taken", body = ErrorResponse),
        (status = 403, description = "Caller tried to edit their own account", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_user_handler(
    State(user_service): State<Arc<dyn UserService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    JsonBody(request): JsonBody<UpdateUserRequest>,
) -> Result<Json<User>, Response> {
    validate_request(&request)?;

    match user_service.update(auth_user.user_id, id, request).await {
        Ok(user) => Ok(Json(user)),
        Err(e) => Err(e.into_response()),
    }
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/password",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Too short or confirmation mismatch", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn change_password_handler(
    State(user_service): State<Arc<dyn UserService>>,
    Path(id): Path<i64>,
    JsonBody(request): JsonBody<ChangePasswordRequest>,
) -> Result<StatusCode, Response> {
    validate_request(&request)?;

    match user_service.change_password(id, request).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for deleting a user
///
/// Refused for the caller's own account and for users who still own expenses.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "User still owns expenses", body = ErrorResponse),
        (status = 403, description = "Caller tried to delete their own account", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete_user_handler(
    State(user_service): State<Arc<dyn UserService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, Response> {
    match user_service.delete(auth_user.user_id, id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(e.into_response()),
    }
}
