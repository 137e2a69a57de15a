use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::handlers::{ErrorResponse, JsonBody, validate_request};
use crate::middleware::auth_middleware::AuthenticatedUser;
use crate::models::expense::{DeleteOutcome, DeleteScope, ExpenseRef};
use crate::models::recurring::{
    CreateRecurringExpenseRequest, RecurringExpense, UpdateRecurringExpenseRequest,
};
use crate::services::expense_service::ExpenseService;

/// Handler for listing recurring expenses
///
/// Every template of the caller, paused ones included.
#[utoipa::path(
    get,
    path = "/api/recurring-expenses",
    responses(
        (status = 200, description = "Recurring expenses", body = Vec<RecurringExpense>),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "recurring-expenses"
)]
pub async fn list_recurring_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<RecurringExpense>>, Response> {
    match expense_service.list_recurring(auth_user.user_id).await {
        Ok(templates) => Ok(Json(templates)),
        Err(e) => Err(e.into_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/recurring-expenses",
    request_body = CreateRecurringExpenseRequest,
    responses(
        (status = 201, description = "Recurring expense created", body = RecurringExpense),
        (status = 400, description = "Validation error, unknown category or invalid split", body = ErrorResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "recurring-expenses"
)]
pub async fn create_recurring_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    JsonBody(request): JsonBody<CreateRecurringExpenseRequest>,
) -> Result<(StatusCode, Json<RecurringExpense>), Response> {
    validate_request(&request)?;

    match expense_service
        .create_recurring(auth_user.user_id, request)
        .await
    {
        Ok(template) => Ok((StatusCode::CREATED, Json(template))),
        Err(e) => Err(e.into_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/recurring-expenses/{id}",
    params(
        ("id" = i64, Path, description = "Recurring expense ID")
    ),
    request_body = UpdateRecurringExpenseRequest,
    responses(
        (status = 200, description = "Recurring expense updated", body = RecurringExpense),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Recurring expense not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "recurring-expenses"
)]
pub async fn update_recurring_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    JsonBody(request): JsonBody<UpdateRecurringExpenseRequest>,
) -> Result<Json<RecurringExpense>, Response> {
    validate_request(&request)?;

    match expense_service
        .update_recurring(auth_user.user_id, id, request)
        .await
    {
        Ok(template) => Ok(Json(template)),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for deleting a recurring expense and its payment history
#[utoipa::path(
    delete,
    path = "/api/recurring-expenses/{id}",
    params(
        ("id" = i64, Path, description = "Recurring expense ID")
    ),
    responses(
        (status = 200, description = "Recurring expense deleted", body = DeleteOutcome),
        (status = 404, description = "Recurring expense not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "recurring-expenses"
)]
pub async fn delete_recurring_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteOutcome>, Response> {
    match expense_service
        .delete(auth_user.user_id, ExpenseRef::Recurring(id), DeleteScope::Single)
        .await
    {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => Err(e.into_response()),
    }
}
