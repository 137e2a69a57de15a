use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::handlers::{ErrorResponse, JsonBody, bad_request, internal_error, validate_request};
use crate::middleware::auth_middleware::AuthenticatedUser;
use crate::models::expense::{
    CreateExpenseRequest, DeleteOutcome, DeleteQuery, Expense, ExpenseRef, MonthlyStatement,
    PaymentStatus, PaymentTarget, SetPaidRequest, UpdateExpenseRequest,
};
use crate::models::period::{Period, PeriodQuery};
use crate::services::expense_service::{ExpenseError, ExpenseService};

/// Convert ExpenseError to HTTP response
impl IntoResponse for ExpenseError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ExpenseError::NotFound => (
                StatusCode::NOT_FOUND,
                "expense_not_found",
                "Expense not found".to_string(),
            ),
            ExpenseError::CategoryNotFound => (
                StatusCode::BAD_REQUEST,
                "category_not_found",
                "Category not found".to_string(),
            ),
            ExpenseError::InvalidCounterpart(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_split", msg)
            }
            ExpenseError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ExpenseError::DatabaseError(ref msg) => return internal_error(msg),
        };

        ErrorResponse::new(error_type, message).into_response_with(status)
    }
}

fn parse_ref(raw: &str) -> Result<ExpenseRef, Response> {
    raw.parse::<ExpenseRef>()
        .map_err(|e| bad_request("invalid_id", e.to_string()))
}

/// Handler for the monthly listing
///
/// Expenses due in the month plus the active recurring expenses resolved to it.
#[utoipa::path(
    get,
    path = "/api/expenses",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Monthly statement", body = MonthlyStatement),
        (status = 400, description = "Invalid month or year", body = ErrorResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn list_expenses_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<MonthlyStatement>, Response> {
    let period = query
        .resolve()
        .map_err(|e| bad_request("invalid_period", e.to_string()))?;

    match expense_service
        .list_for_period(auth_user.user_id, period)
        .await
    {
        Ok(statement) => Ok(Json(statement)),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for creating a variable expense or an installment plan
///
/// Returns the caller's rows; split mirrors are created for the other user.
#[utoipa::path(
    post,
    path = "/api/expenses",
    request_body = CreateExpenseRequest,
    responses(
        (status = 201, description = "Expense rows created", body = Vec<Expense>),
        (status = 400, description = "Validation error, unknown category or invalid split", body = ErrorResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn create_expense_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    JsonBody(request): JsonBody<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Vec<Expense>>), Response> {
    validate_request(&request)?;

    match expense_service
        .create_expense(auth_user.user_id, request)
        .await
    {
        Ok(expenses) => Ok((StatusCode::CREATED, Json(expenses))),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for updating a variable or installment expense
#[utoipa::path(
    put,
    path = "/api/expenses/{id}",
    params(
        ("id" = String, Path, description = "Expense ID")
    ),
    request_body = UpdateExpenseRequest,
    responses(
        (status = 200, description = "Expense updated", body = Expense),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn update_expense_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateExpenseRequest>,
) -> Result<Json<Expense>, Response> {
    let ExpenseRef::Expense(id) = parse_ref(&id)? else {
        return Err(bad_request(
            "invalid_id",
            "Recurring expenses are updated under /api/recurring-expenses",
        ));
    };
    validate_request(&request)?;

    match expense_service
        .update_expense(auth_user.user_id, id, request)
        .await
    {
        Ok(expense) => Ok(Json(expense)),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for marking an expense paid or unpaid
///
/// `id` is an expense id (`12`) or a recurring expense (`fixed-12`); the
/// latter needs `month` and `year` to pick the instance.
#[utoipa::path(
    put,
    path = "/api/expenses/{id}/paid",
    params(
        ("id" = String, Path, description = "Expense reference, `12` or `fixed-12`")
    ),
    request_body = SetPaidRequest,
    responses(
        (status = 200, description = "Paid state updated", body = PaymentStatus),
        (status = 400, description = "Malformed reference or missing month/year", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn set_paid_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(raw_ref): Path<String>,
    JsonBody(request): JsonBody<SetPaidRequest>,
) -> Result<Json<PaymentStatus>, Response> {
    let target = match parse_ref(&raw_ref)? {
        ExpenseRef::Expense(id) => PaymentTarget::Expense(id),
        ExpenseRef::Recurring(template_id) => {
            let (Some(month), Some(year)) = (request.month, request.year) else {
                return Err(bad_request(
                    "validation_error",
                    "month and year are required for recurring expenses",
                ));
            };
            let period = Period::new(month, year)
                .map_err(|e| bad_request("invalid_period", e.to_string()))?;
            PaymentTarget::RecurringInstance {
                template_id,
                period,
            }
        }
    };

    match expense_service
        .set_paid(auth_user.user_id, target, request.paid)
        .await
    {
        Ok(status) => Ok(Json(status)),
        Err(e) => Err(e.into_response()),
    }
}

/// Handler for deleting an expense
///
/// With `scope=all` an installment takes the rest of its plan with it.
#[utoipa::path(
    delete,
    path = "/api/expenses/{id}",
    params(
        ("id" = String, Path, description = "Expense reference, `12` or `fixed-12`"),
        DeleteQuery
    ),
    responses(
        (status = 200, description = "Rows deleted", body = DeleteOutcome),
        (status = 400, description = "Malformed reference", body = ErrorResponse),
        (status = 404, description = "Expense not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn delete_expense_handler(
    State(expense_service): State<Arc<dyn ExpenseService>>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(raw_ref): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteOutcome>, Response> {
    let target = parse_ref(&raw_ref)?;

    match expense_service
        .delete(auth_user.user_id, target, query.scope)
        .await
    {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => Err(e.into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::expense::DeleteScope;
    use crate::repositories::in_memory::InMemoryRepositories;
    use crate::services::expense_service::ExpenseServiceImpl;

    fn setup() -> (Arc<InMemoryRepositories>, Arc<dyn ExpenseService>, AuthenticatedUser) {
        let repo = InMemoryRepositories::new();
        let user = repo.insert_user("thiago", "Thiago");
        let service: Arc<dyn ExpenseService> = Arc::new(ExpenseServiceImpl::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
        ));
        let auth_user = AuthenticatedUser {
            user_id: user.id,
            name: user.name,
        };
        (repo, service, auth_user)
    }

    #[tokio::test]
    async fn test_set_paid_rejects_malformed_reference() {
        let (_, service, auth_user) = setup();

        let result = set_paid_handler(
            State(service),
            Extension(auth_user),
            Path("fixa-1".to_string()),
            JsonBody(SetPaidRequest {
                paid: true,
                month: Some(1),
                year: Some(2024),
            }),
        )
        .await;

        assert_eq!(result.unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_set_paid_recurring_requires_period() {
        let (_, service, auth_user) = setup();

        let result = set_paid_handler(
            State(service),
            Extension(auth_user),
            Path("fixed-1".to_string()),
            JsonBody(SetPaidRequest {
                paid: true,
                month: None,
                year: Some(2024),
            }),
        )
        .await;

        assert_eq!(result.unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_unknown_expense_is_not_found() {
        let (_, service, auth_user) = setup();

        let result = delete_expense_handler(
            State(service),
            Extension(auth_user),
            Path("42".to_string()),
            Query(DeleteQuery {
                scope: DeleteScope::All,
            }),
        )
        .await;

        assert_eq!(result.unwrap_err().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_rejects_invalid_month() {
        let (_, service, auth_user) = setup();

        let result = list_expenses_handler(
            State(service),
            Extension(auth_user),
            Query(PeriodQuery {
                month: Some(13),
                year: Some(2024),
            }),
        )
        .await;

        assert_eq!(result.unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_storage_errors_hide_details() {
        let (repo, service, auth_user) = setup();
        repo.fail();

        let response = list_expenses_handler(
            State(service),
            Extension(auth_user),
            Query(PeriodQuery::default()),
        )
        .await
        .unwrap_err();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["message"], "Internal server error");
    }
}
