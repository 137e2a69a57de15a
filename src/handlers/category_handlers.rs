use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::handlers::{ErrorResponse, JsonBody, bad_request, internal_error, validate_request};
use crate::models::category::{Category, CreateCategoryRequest, UpdateCategoryRequest};
use crate::services::category_service::{CategoryError, CategoryService};

/// Convert CategoryError to HTTP response
impl IntoResponse for CategoryError {
    fn into_response(self) -> Response {
        match self {
            CategoryError::DuplicateName => ErrorResponse::new(
                "duplicate_name",
                "Category with this name already exists",
            )
            .into_response_with(StatusCode::BAD_REQUEST),
            CategoryError::CategoryNotFound => {
                ErrorResponse::new("category_not_found", "Category not found")
                    .into_response_with(StatusCode::NOT_FOUND)
            }
            CategoryError::CategoryInUse(count) => ErrorResponse::new(
                "category_in_use",
                format!(
                    "Category is used by {} expense(s) and cannot be deleted",
                    count
                ),
            )
            .with_usage_count(count)
            .into_response_with(StatusCode::BAD_REQUEST),
            CategoryError::Validation(msg) => bad_request("validation_error", msg),
            CategoryError::DatabaseError(msg) => internal_error(&msg),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "All categories, by name", body = Vec<Category>),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn list_categories_handler(
    State(category_service): State<Arc<dyn CategoryService>>,
) -> Result<Json<Vec<Category>>, Response> {
    match category_service.list().await {
        Ok(categories) => Ok(Json(categories)),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for creating a category
///
/// The color defaults to `#3498db`.
#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Validation error or duplicate name", body = ErrorResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn create_category_handler(
    State(category_service): State<Arc<dyn CategoryService>>,
    JsonBody(request): JsonBody<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), Response> {
    validate_request(&request)?;

    match category_service.create(request).await {
        Ok(category) => Ok((StatusCode::CREATED, Json(category))),
        Err(e) => Err(e.into_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    params(
        ("id" = i64, Path, description = "Category ID")
    ),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 400, description = "Validation error or duplicate name", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn update_category_handler(
    State(category_service): State<Arc<dyn CategoryService>>,
    Path(id): Path<i64>,
    JsonBody(request): JsonBody<UpdateCategoryRequest>,
) -> Result<Json<Category>, Response> {
    validate_request(&request)?;

    match category_service.update(id, request).await {
        Ok(category) => Ok(Json(category)),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for deleting a category
///
/// Refused with the blocking count while expenses still use it.
#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(
        ("id" = i64, Path, description = "Category ID")
    ),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 400, description = "Category in use", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn delete_category_handler(
    State(category_service): State<Arc<dyn CategoryService>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, Response> {
    match category_service.delete(id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(e.into_response()),
    }
}
