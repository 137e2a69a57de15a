use axum::{
    Json, Router, middleware,
    routing::{get, patch, post, put},
};
use std::path::Path;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;

use crate::handlers::{
    ErrorResponse, auth_handlers, category_handlers, expense_handlers, recurring_handlers,
    user_handlers,
};
use crate::middleware::auth_middleware;
use crate::models::{
    AuthToken, Category, ChangePasswordRequest, CreateCategoryRequest, CreateExpenseRequest,
    CreateRecurringExpenseRequest, CreateUserRequest, DeleteOutcome, DeleteScope, Expense,
    ExpenseKind, LoginRequest, MonthlyExpense, MonthlyExpenseKind, MonthlyStatement,
    PaymentStatus, RecurringExpense, SessionInfo, SessionStatus, SetPaidRequest,
    UpdateCategoryRequest, UpdateExpenseRequest, UpdateRecurringExpenseRequest, UpdateUserRequest,
    User, UserSummary,
};
use crate::state::AppState;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        auth_handlers::register_handler,
        auth_handlers::login_handler,
        auth_handlers::logout_handler,
        auth_handlers::session_handler,
        expense_handlers::list_expenses_handler,
        expense_handlers::create_expense_handler,
        expense_handlers::update_expense_handler,
        expense_handlers::set_paid_handler,
        expense_handlers::delete_expense_handler,
        recurring_handlers::list_recurring_handler,
        recurring_handlers::create_recurring_handler,
        recurring_handlers::update_recurring_handler,
        recurring_handlers::delete_recurring_handler,
        category_handlers::list_categories_handler,
        category_handlers::create_category_handler,
        category_handlers::update_category_handler,
        category_handlers::delete_category_handler,
        user_handlers::list_users_handler,
        user_handlers::get_user_handler,
        user_handlers::create_user_handler,
        user_handlers::update_user_handler,
        user_handlers::change_password_handler,
        user_handlers::delete_user_handler,
    ),
    components(
        schemas(
            User, UserSummary, CreateUserRequest, UpdateUserRequest, ChangePasswordRequest,
            LoginRequest, AuthToken, SessionInfo, SessionStatus,
            Category, CreateCategoryRequest, UpdateCategoryRequest,
            Expense, ExpenseKind, CreateExpenseRequest, UpdateExpenseRequest, SetPaidRequest,
            MonthlyExpense, MonthlyExpenseKind, MonthlyStatement, PaymentStatus,
            DeleteScope, DeleteOutcome,
            RecurringExpense, CreateRecurringExpenseRequest, UpdateRecurringExpenseRequest,
            ErrorResponse
        )
    ),
    tags(
        (name = "auth", description = "Login, logout and session"),
        (name = "expenses", description = "Monthly view, variable and installment expenses"),
        (name = "recurring-expenses", description = "Recurring expense templates"),
        (name = "categories", description = "Household expense categories"),
        (name = "users", description = "Household members")
    ),
    info(
        title = "Household Expenses API",
        version = "0.1.0",
        description = "REST API for tracking shared household expenses",
    )
)]
pub struct ApiDoc;

async fn health_check() -> &'static str {
    "OK"
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Builds the application router.
///
/// Everything under `/api` except the auth endpoints requires a session;
/// unmatched paths fall through to the static files in `static_dir`.
pub fn router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    let public = Router::new()
        .route("/health", get(health_check))
        .route("/api/docs/openapi.json", get(openapi_json))
        .route("/api/auth/register", post(auth_handlers::register_handler))
        .route("/api/auth/login", post(auth_handlers::login_handler))
        .route("/api/auth/logout", post(auth_handlers::logout_handler))
        .route("/api/auth/session", get(auth_handlers::session_handler));

    let protected = Router::new()
        .route(
            "/api/expenses",
            get(expense_handlers::list_expenses_handler)
                .post(expense_handlers::create_expense_handler),
        )
        .route(
            "/api/expenses/{id}",
            put(expense_handlers::update_expense_handler)
                .delete(expense_handlers::delete_expense_handler),
        )
        .route(
            "/api/expenses/{id}/paid",
            put(expense_handlers::set_paid_handler),
        )
        .route(
            "/api/recurring-expenses",
            get(recurring_handlers::list_recurring_handler)
                .post(recurring_handlers::create_recurring_handler),
        )
        .route(
            "/api/recurring-expenses/{id}",
            put(recurring_handlers::update_recurring_handler)
                .delete(recurring_handlers::delete_recurring_handler),
        )
        .route(
            "/api/categories",
            get(category_handlers::list_categories_handler)
                .post(category_handlers::create_category_handler),
        )
        .route(
            "/api/categories/{id}",
            put(category_handlers::update_category_handler)
                .delete(category_handlers::delete_category_handler),
        )
        .route(
            "/api/users",
            get(user_handlers::list_users_handler).post(user_handlers::create_user_handler),
        )
        .route(
            "/api/users/{id}",
            get(user_handlers::get_user_handler)
                .put(user_handlers::update_user_handler)
                .delete(user_handlers::delete_user_handler),
        )
        .route(
            "/api/users/{id}/password",
            patch(user_handlers::change_password_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
