use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::validation::validate_positive_amount;

/// Monthly recurring ("fixed") expense template.
///
/// It has no due date of its own: one is resolved per queried month from
/// `day_of_month`. Paid state lives in [`RecurringPayment`] rows.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct RecurringExpense {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub description: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub day_of_month: i32,
    pub active: bool,
    pub shared_with_user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecurringExpense {
    pub user_id: i64,
    pub category_id: i64,
    pub description: String,
    pub amount: Decimal,
    pub day_of_month: i32,
    pub active: bool,
    pub shared_with_user_id: Option<i64>,
}

/// Marks one month's instance of a template as paid
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct RecurringPayment {
    pub id: i64,
    pub user_id: i64,
    pub recurring_expense_id: i64,
    pub description: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub reference_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecurringPayment {
    pub user_id: i64,
    pub recurring_expense_id: i64,
    pub description: String,
    pub amount: Decimal,
    pub reference_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
}

/// Request payload for creating a recurring expense.
///
/// The day of month comes from `day_of_month` when given, otherwise from `due_date`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "description": "Internet",
    "amount": "99.90",
    "category_id": 2,
    "due_date": "2024-01-31",
    "split_with_user_id": 2
}))]
pub struct CreateRecurringExpenseRequest {
    #[validate(length(min = 1, max = 255, message = "Description must be between 1 and 255 characters"))]
    pub description: String,

    #[validate(custom(function = "validate_positive_amount"))]
    #[schema(value_type = String, example = "99.90")]
    pub amount: Decimal,

    pub category_id: i64,

    #[schema(format = "date")]
    pub due_date: Option<NaiveDate>,

    #[validate(range(min = 1, max = 31, message = "Day of month must be between 1 and 31"))]
    pub day_of_month: Option<i32>,

    pub split_with_user_id: Option<i64>,
}

/// Request payload for updating a recurring expense
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateRecurringExpenseRequest {
    #[validate(length(min = 1, max = 255, message = "Description must be between 1 and 255 characters"))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_positive_amount"))]
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,

    pub category_id: Option<i64>,

    #[validate(range(min = 1, max = 31, message = "Day of month must be between 1 and 31"))]
    pub day_of_month: Option<i32>,

    pub active: Option<bool>,
}
