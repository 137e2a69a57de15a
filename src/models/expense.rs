use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::period::Period;
use crate::validation::validate_positive_amount;

/// Prefix marking a recurring template in an expense reference
pub const RECURRING_REF_PREFIX: &str = "fixed-";

/// Kind of a stored expense row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseKind {
    Variable,
    Installment,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown expense kind '{0}'")]
pub struct UnknownExpenseKind(String);

impl ExpenseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseKind::Variable => "variable",
            ExpenseKind::Installment => "installment",
        }
    }
}

impl TryFrom<String> for ExpenseKind {
    type Error = UnknownExpenseKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "variable" => Ok(ExpenseKind::Variable),
            "installment" => Ok(ExpenseKind::Installment),
            _ => Err(UnknownExpenseKind(value)),
        }
    }
}

/// Variable or installment expense owned by one user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub description: String,
    pub amount: Decimal,
    #[sqlx(try_from = "String")]
    pub kind: ExpenseKind,
    pub due_date: NaiveDate,
    pub paid: bool,
    pub paid_date: Option<NaiveDate>,
    pub installment_number: Option<i32>,
    pub installment_total: Option<i32>,
    /// Shared by every row generated from the same installment plan
    pub installment_group: Option<Uuid>,
    /// The other participant of a split expense
    pub shared_with_user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Expense row about to be inserted
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub user_id: i64,
    pub category_id: i64,
    pub description: String,
    pub amount: Decimal,
    pub kind: ExpenseKind,
    pub due_date: NaiveDate,
    pub paid: bool,
    pub paid_date: Option<NaiveDate>,
    pub installment_number: Option<i32>,
    pub installment_total: Option<i32>,
    pub installment_group: Option<Uuid>,
    pub shared_with_user_id: Option<i64>,
}

/// Request payload for creating a variable or installment expense
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "description": "Geladeira",
    "amount": "350.00",
    "category_id": 1,
    "due_date": "2024-01-15",
    "paid": false,
    "installments": 10,
    "split_with_user_id": 2
}))]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, max = 255, message = "Description must be between 1 and 255 characters"))]
    pub description: String,

    /// Amount of each installment, before splitting
    #[validate(custom(function = "validate_positive_amount"))]
    #[schema(value_type = String, example = "350.00")]
    pub amount: Decimal,

    pub category_id: i64,

    #[schema(format = "date", example = "2024-01-15")]
    pub due_date: NaiveDate,

    #[schema(default = false)]
    pub paid: Option<bool>,

    #[validate(range(min = 1, max = 360, message = "Installments must be between 1 and 360"))]
    pub installments: Option<i32>,

    pub split_with_user_id: Option<i64>,
}

/// Request payload for updating a variable or installment expense
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateExpenseRequest {
    #[validate(length(min = 1, max = 255, message = "Description must be between 1 and 255 characters"))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_positive_amount"))]
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,

    pub category_id: Option<i64>,

    #[schema(format = "date")]
    pub due_date: Option<NaiveDate>,
}

/// Request payload for marking an expense paid or unpaid.
///
/// `month` and `year` select the instance when the target is a recurring
/// expense and are ignored otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "paid": true, "month": 2, "year": 2024 }))]
pub struct SetPaidRequest {
    pub paid: bool,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// Identifies a row in the monthly listing: a stored expense or a recurring template.
///
/// On the wire this is `"12"` for an expense and `"fixed-12"` for a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExpenseRef {
    Expense(i64),
    Recurring(i64),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid expense reference '{0}'")]
pub struct InvalidExpenseRef(pub String);

impl FromStr for ExpenseRef {
    type Err = InvalidExpenseRef;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parse_id = |raw: &str| {
            raw.parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| InvalidExpenseRef(value.to_string()))
        };

        match value.strip_prefix(RECURRING_REF_PREFIX) {
            Some(raw) => parse_id(raw).map(ExpenseRef::Recurring),
            None => parse_id(value).map(ExpenseRef::Expense),
        }
    }
}

impl TryFrom<String> for ExpenseRef {
    type Error = InvalidExpenseRef;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ExpenseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpenseRef::Expense(id) => write!(f, "{id}"),
            ExpenseRef::Recurring(id) => write!(f, "{RECURRING_REF_PREFIX}{id}"),
        }
    }
}

impl From<ExpenseRef> for String {
    fn from(value: ExpenseRef) -> Self {
        value.to_string()
    }
}

/// What a paid/unpaid change applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTarget {
    Expense(i64),
    RecurringInstance { template_id: i64, period: Period },
}

/// How much of an installment group a delete removes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeleteScope {
    #[default]
    Single,
    All,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteQuery {
    #[serde(default)]
    pub scope: DeleteScope,
}

/// Kind of a row in the monthly listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MonthlyExpenseKind {
    Variable,
    Installment,
    Recurring,
}

impl From<ExpenseKind> for MonthlyExpenseKind {
    fn from(kind: ExpenseKind) -> Self {
        match kind {
            ExpenseKind::Variable => MonthlyExpenseKind::Variable,
            ExpenseKind::Installment => MonthlyExpenseKind::Installment,
        }
    }
}

/// One row of a monthly view, either a stored expense or a resolved recurring instance
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MonthlyExpense {
    #[schema(value_type = String, example = "fixed-3")]
    pub id: ExpenseRef,
    pub kind: MonthlyExpenseKind,
    pub description: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub due_date: NaiveDate,
    pub paid: bool,
    pub paid_date: Option<NaiveDate>,
    pub installment_number: Option<i32>,
    pub installment_total: Option<i32>,
    pub installment_group: Option<Uuid>,
    pub shared_with_user_id: Option<i64>,
}

/// Everything due for one user in one month
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MonthlyStatement {
    pub month: u32,
    pub year: i32,
    pub expenses: Vec<MonthlyExpense>,
    #[schema(value_type = String)]
    pub total: Decimal,
    #[schema(value_type = String)]
    pub paid_total: Decimal,
    #[schema(value_type = String)]
    pub pending_total: Decimal,
}

/// Paid state of one row after a paid/unpaid change
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentStatus {
    #[schema(value_type = String, example = "fixed-3")]
    pub id: ExpenseRef,
    pub paid: bool,
    pub paid_date: Option<NaiveDate>,
}

/// Result of a delete request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteOutcome {
    pub deleted: u64,
}
