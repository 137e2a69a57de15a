//! Expense lifecycle: installment plans, split expenses, recurring templates
//! and the per-month view that merges them.

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::due_date::add_months;
use crate::models::category::Category;
use crate::models::expense::{
    CreateExpenseRequest, DeleteOutcome, DeleteScope, Expense, ExpenseKind, ExpenseRef,
    MonthlyExpense, MonthlyExpenseKind, MonthlyStatement, NewExpense, PaymentStatus,
    PaymentTarget, UpdateExpenseRequest,
};
use crate::models::period::Period;
use crate::models::recurring::{
    CreateRecurringExpenseRequest, NewRecurringExpense, NewRecurringPayment, RecurringExpense,
    RecurringPayment, UpdateRecurringExpenseRequest,
};
use crate::repositories::{
    CategoryRepository, ExpenseRepository, RecurringExpenseRepository, RepositoryError,
    UserRepository,
};

/// Expense service errors
#[derive(Debug, thiserror::Error)]
pub enum ExpenseError {
    #[error("Expense not found")]
    NotFound,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("{0}")]
    InvalidCounterpart(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<RepositoryError> for ExpenseError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => ExpenseError::NotFound,
            RepositoryError::ConstraintViolation(msg) => ExpenseError::Validation(msg),
            // The category or counterpart vanished between the check and the insert
            RepositoryError::ReferenceViolation(msg) => ExpenseError::Validation(msg),
            RepositoryError::DatabaseError(msg) => ExpenseError::DatabaseError(msg),
        }
    }
}

/// Trait defining expense lifecycle operations.
///
/// Every operation acts on behalf of `user_id` and treats rows owned by
/// anyone else as missing.
#[async_trait]
pub trait ExpenseService: Send + Sync {
    /// Expenses due in the period merged with the active recurring expenses
    /// resolved to it, sorted by due date
    async fn list_for_period(
        &self,
        user_id: i64,
        period: Period,
    ) -> Result<MonthlyStatement, ExpenseError>;

    /// Create a variable expense or an installment plan; returns the caller's rows
    async fn create_expense(
        &self,
        user_id: i64,
        request: CreateExpenseRequest,
    ) -> Result<Vec<Expense>, ExpenseError>;

    async fn create_recurring(
        &self,
        user_id: i64,
        request: CreateRecurringExpenseRequest,
    ) -> Result<RecurringExpense, ExpenseError>;

    /// Every recurring template of the user, inactive ones included
    async fn list_recurring(&self, user_id: i64) -> Result<Vec<RecurringExpense>, ExpenseError>;

    async fn update_expense(
        &self,
        user_id: i64,
        id: i64,
        request: UpdateExpenseRequest,
    ) -> Result<Expense, ExpenseError>;

    async fn update_recurring(
        &self,
        user_id: i64,
        id: i64,
        request: UpdateRecurringExpenseRequest,
    ) -> Result<RecurringExpense, ExpenseError>;

    /// Mark an expense, or one month of a recurring expense, paid or unpaid.
    /// Repeating the same call leaves the same state.
    async fn set_paid(
        &self,
        user_id: i64,
        target: PaymentTarget,
        paid: bool,
    ) -> Result<PaymentStatus, ExpenseError>;

    async fn delete(
        &self,
        user_id: i64,
        target: ExpenseRef,
        scope: DeleteScope,
    ) -> Result<DeleteOutcome, ExpenseError>;
}

/// Implementation of ExpenseService
pub struct ExpenseServiceImpl {
    expense_repository: Arc<dyn ExpenseRepository>,
    recurring_repository: Arc<dyn RecurringExpenseRepository>,
    category_repository: Arc<dyn CategoryRepository>,
    user_repository: Arc<dyn UserRepository>,
}

/// Stored descriptions are VARCHAR(255)
const MAX_DESCRIPTION_LEN: usize = 255;

/// Paid dates follow the server's local calendar
fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Each participant's share of a split amount, rounded to cents
fn split_amount(amount: Decimal) -> Decimal {
    (amount / Decimal::from(2)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn ensure_positive(amount: Decimal) -> Result<(), ExpenseError> {
    if amount <= Decimal::ZERO {
        return Err(ExpenseError::Validation(
            "Amount must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

fn clean_description(description: &str) -> Result<String, ExpenseError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(ExpenseError::Validation(
            "Description is required".to_string(),
        ));
    }
    Ok(description.to_string())
}

fn ensure_day_of_month(day: i32) -> Result<(), ExpenseError> {
    if !(1..=31).contains(&day) {
        return Err(ExpenseError::Validation(format!(
            "Day of month must be between 1 and 31, got {}",
            day
        )));
    }
    Ok(())
}

impl ExpenseServiceImpl {
    pub fn new(
        expense_repository: Arc<dyn ExpenseRepository>,
        recurring_repository: Arc<dyn RecurringExpenseRepository>,
        category_repository: Arc<dyn CategoryRepository>,
        user_repository: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            expense_repository,
            recurring_repository,
            category_repository,
            user_repository,
        }
    }

    async fn ensure_category(&self, category_id: i64) -> Result<Category, ExpenseError> {
        self.category_repository
            .find_by_id(category_id)
            .await?
            .ok_or(ExpenseError::CategoryNotFound)
    }

    /// The other participant of a split, who must exist and differ from the owner
    async fn resolve_counterpart(
        &self,
        user_id: i64,
        counterpart: Option<i64>,
    ) -> Result<Option<i64>, ExpenseError> {
        let Some(other) = counterpart else {
            return Ok(None);
        };

        if other == user_id {
            return Err(ExpenseError::InvalidCounterpart(
                "An expense cannot be split with its own owner".to_string(),
            ));
        }

        self.user_repository
            .find_by_id(other)
            .await?
            .ok_or_else(|| {
                ExpenseError::InvalidCounterpart(format!("User {} does not exist", other))
            })?;

        Ok(Some(other))
    }

    async fn owned_expense(&self, user_id: i64, id: i64) -> Result<Expense, ExpenseError> {
        self.expense_repository
            .find_by_id(id)
            .await?
            .filter(|expense| expense.user_id == user_id)
            .ok_or(ExpenseError::NotFound)
    }

    async fn owned_template(&self, user_id: i64, id: i64) -> Result<RecurringExpense, ExpenseError> {
        self.recurring_repository
            .find_by_id(id)
            .await?
            .filter(|template| template.user_id == user_id)
            .ok_or(ExpenseError::NotFound)
    }
}

#[async_trait]
impl ExpenseService for ExpenseServiceImpl {
    async fn list_for_period(
        &self,
        user_id: i64,
        period: Period,
    ) -> Result<MonthlyStatement, ExpenseError> {
        let (from, to) = (period.first_day(), period.last_day());

        let categories: HashMap<i64, Category> = self
            .category_repository
            .list()
            .await?
            .into_iter()
            .map(|category| (category.id, category))
            .collect();
        let category_of = |id: i64| {
            let category = categories.get(&id);
            (
                category.map(|c| c.name.clone()),
                category.map(|c| c.color.clone()),
            )
        };

        let expenses = self
            .expense_repository
            .find_by_user_between(user_id, from, to)
            .await?;
        let templates = self.recurring_repository.find_by_user(user_id).await?;
        let payments: HashMap<(i64, NaiveDate), RecurringPayment> = self
            .recurring_repository
            .find_payments_between(user_id, from, to)
            .await?
            .into_iter()
            .map(|payment| ((payment.recurring_expense_id, payment.reference_date), payment))
            .collect();

        let mut items: Vec<MonthlyExpense> = expenses
            .into_iter()
            .filter(|expense| period.contains(expense.due_date))
            .map(|expense| {
                let (category_name, category_color) = category_of(expense.category_id);
                MonthlyExpense {
                    id: ExpenseRef::Expense(expense.id),
                    kind: expense.kind.into(),
                    description: expense.description,
                    amount: expense.amount,
                    category_id: expense.category_id,
                    category_name,
                    category_color,
                    due_date: expense.due_date,
                    paid: expense.paid,
                    paid_date: expense.paid_date,
                    installment_number: expense.installment_number,
                    installment_total: expense.installment_total,
                    installment_group: expense.installment_group,
                    shared_with_user_id: expense.shared_with_user_id,
                }
            })
            .collect();

        for template in templates.into_iter().filter(|template| template.active) {
            let due_date = period.reference_date(template.day_of_month);
            let payment = payments.get(&(template.id, due_date));
            let (category_name, category_color) = category_of(template.category_id);

            items.push(MonthlyExpense {
                id: ExpenseRef::Recurring(template.id),
                kind: MonthlyExpenseKind::Recurring,
                description: template.description,
                amount: template.amount,
                category_id: template.category_id,
                category_name,
                category_color,
                due_date,
                paid: payment.is_some(),
                paid_date: payment.and_then(|p| p.paid_date),
                installment_number: None,
                installment_total: None,
                installment_group: None,
                shared_with_user_id: template.shared_with_user_id,
            });
        }

        // Stable: stored expenses stay ahead of recurring ones due the same day
        items.sort_by_key(|item| item.due_date);

        let total: Decimal = items.iter().map(|item| item.amount).sum();
        let paid_total: Decimal = items
            .iter()
            .filter(|item| item.paid)
            .map(|item| item.amount)
            .sum();

        Ok(MonthlyStatement {
            month: period.month,
            year: period.year,
            expenses: items,
            total,
            paid_total,
            pending_total: total - paid_total,
        })
    }

    async fn create_expense(
        &self,
        user_id: i64,
        request: CreateExpenseRequest,
    ) -> Result<Vec<Expense>, ExpenseError> {
        let installments = request.installments.unwrap_or(1);
        if installments < 1 {
            return Err(ExpenseError::Validation(
                "Installments must be at least 1".to_string(),
            ));
        }
        ensure_positive(request.amount)?;
        let description = clean_description(&request.description)?;
        if installments > 1 {
            // The last installment carries the widest suffix
            let suffix = format!(" ({}/{})", installments, installments);
            let room = MAX_DESCRIPTION_LEN - suffix.chars().count();
            if description.chars().count() > room {
                return Err(ExpenseError::Validation(format!(
                    "Description is too long for {} installments, at most {} characters",
                    installments, room
                )));
            }
        }
        self.ensure_category(request.category_id).await?;
        let counterpart = self
            .resolve_counterpart(user_id, request.split_with_user_id)
            .await?;

        let amount = match counterpart {
            Some(_) => split_amount(request.amount),
            None => request.amount,
        };
        let (kind, group) = if installments > 1 {
            (ExpenseKind::Installment, Some(Uuid::new_v4()))
        } else {
            (ExpenseKind::Variable, None)
        };
        // Only the first installment can start out paid
        let first_paid = request.paid.unwrap_or(false);
        let today = today();

        let mut rows = Vec::with_capacity(installments as usize * 2);
        for number in 1..=installments {
            let (description, installment_number, installment_total) = match group {
                Some(_) => (
                    format!("{} ({}/{})", description, number, installments),
                    Some(number),
                    Some(installments),
                ),
                None => (description.clone(), None, None),
            };
            let paid = first_paid && number == 1;

            let row = NewExpense {
                user_id,
                category_id: request.category_id,
                description,
                amount,
                kind,
                due_date: add_months(request.due_date, (number - 1) as u32),
                paid,
                paid_date: paid.then_some(today),
                installment_number,
                installment_total,
                installment_group: group,
                shared_with_user_id: counterpart,
            };
            let mirror = counterpart.map(|other| NewExpense {
                user_id: other,
                shared_with_user_id: Some(user_id),
                ..row.clone()
            });

            rows.push(row);
            rows.extend(mirror);
        }

        let created = self.expense_repository.create_many(rows).await?;
        tracing::info!(
            user_id,
            rows = created.len(),
            installments,
            split_with = ?counterpart,
            "Expense created"
        );

        Ok(created
            .into_iter()
            .filter(|expense| expense.user_id == user_id)
            .collect())
    }

    async fn create_recurring(
        &self,
        user_id: i64,
        request: CreateRecurringExpenseRequest,
    ) -> Result<RecurringExpense, ExpenseError> {
        let day_of_month = request
            .day_of_month
            .or_else(|| request.due_date.map(|date| date.day() as i32))
            .ok_or_else(|| {
                ExpenseError::Validation("Either due_date or day_of_month is required".to_string())
            })?;
        ensure_day_of_month(day_of_month)?;
        ensure_positive(request.amount)?;
        let description = clean_description(&request.description)?;
        self.ensure_category(request.category_id).await?;
        let counterpart = self
            .resolve_counterpart(user_id, request.split_with_user_id)
            .await?;

        let template = NewRecurringExpense {
            user_id,
            category_id: request.category_id,
            description,
            amount: match counterpart {
                Some(_) => split_amount(request.amount),
                None => request.amount,
            },
            day_of_month,
            active: true,
            shared_with_user_id: counterpart,
        };
        let mirror = counterpart.map(|other| NewRecurringExpense {
            user_id: other,
            shared_with_user_id: Some(user_id),
            ..template.clone()
        });

        let mut templates = vec![template];
        templates.extend(mirror);

        let created = self.recurring_repository.create_many(templates).await?;
        tracing::info!(user_id, day_of_month, split_with = ?counterpart, "Recurring expense created");

        created
            .into_iter()
            .find(|template| template.user_id == user_id)
            .ok_or_else(|| ExpenseError::DatabaseError("Created template was not returned".to_string()))
    }

    async fn list_recurring(&self, user_id: i64) -> Result<Vec<RecurringExpense>, ExpenseError> {
        Ok(self.recurring_repository.find_by_user(user_id).await?)
    }

    async fn update_expense(
        &self,
        user_id: i64,
        id: i64,
        request: UpdateExpenseRequest,
    ) -> Result<Expense, ExpenseError> {
        let mut expense = self.owned_expense(user_id, id).await?;

        if let Some(description) = request.description {
            expense.description = clean_description(&description)?;
        }
        if let Some(amount) = request.amount {
            ensure_positive(amount)?;
            expense.amount = amount;
        }
        if let Some(category_id) = request.category_id {
            self.ensure_category(category_id).await?;
            expense.category_id = category_id;
        }
        if let Some(due_date) = request.due_date {
            expense.due_date = due_date;
        }

        Ok(self.expense_repository.update(expense).await?)
    }

    async fn update_recurring(
        &self,
        user_id: i64,
        id: i64,
        request: UpdateRecurringExpenseRequest,
    ) -> Result<RecurringExpense, ExpenseError> {
        let mut template = self.owned_template(user_id, id).await?;

        if let Some(description) = request.description {
            template.description = clean_description(&description)?;
        }
        if let Some(amount) = request.amount {
            ensure_positive(amount)?;
            template.amount = amount;
        }
        if let Some(category_id) = request.category_id {
            self.ensure_category(category_id).await?;
            template.category_id = category_id;
        }
        if let Some(day_of_month) = request.day_of_month {
            ensure_day_of_month(day_of_month)?;
            template.day_of_month = day_of_month;
        }
        if let Some(active) = request.active {
            template.active = active;
        }

        Ok(self.recurring_repository.update(template).await?)
    }

    async fn set_paid(
        &self,
        user_id: i64,
        target: PaymentTarget,
        paid: bool,
    ) -> Result<PaymentStatus, ExpenseError> {
        let paid_date = paid.then(today);

        match target {
            PaymentTarget::Expense(id) => {
                self.owned_expense(user_id, id).await?;
                let expense = self.expense_repository.set_paid(id, paid, paid_date).await?;

                Ok(PaymentStatus {
                    id: ExpenseRef::Expense(expense.id),
                    paid: expense.paid,
                    paid_date: expense.paid_date,
                })
            }
            PaymentTarget::RecurringInstance {
                template_id,
                period,
            } => {
                let template = self.owned_template(user_id, template_id).await?;
                let reference_date = period.reference_date(template.day_of_month);

                if paid {
                    self.recurring_repository
                        .upsert_payment(NewRecurringPayment {
                            user_id,
                            recurring_expense_id: template.id,
                            description: template.description,
                            amount: template.amount,
                            reference_date,
                            paid_date,
                        })
                        .await?;
                } else {
                    self.recurring_repository
                        .delete_payment(user_id, template.id, reference_date)
                        .await?;
                }

                Ok(PaymentStatus {
                    id: ExpenseRef::Recurring(template_id),
                    paid,
                    paid_date,
                })
            }
        }
    }

    async fn delete(
        &self,
        user_id: i64,
        target: ExpenseRef,
        scope: DeleteScope,
    ) -> Result<DeleteOutcome, ExpenseError> {
        let deleted = match target {
            ExpenseRef::Expense(id) => {
                let expense = self.owned_expense(user_id, id).await?;
                match (scope, expense.installment_group) {
                    (DeleteScope::All, Some(group)) => {
                        self.expense_repository.delete_group(user_id, group).await?
                    }
                    _ => {
                        self.expense_repository.delete(id).await?;
                        1
                    }
                }
            }
            ExpenseRef::Recurring(id) => {
                self.owned_template(user_id, id).await?;
                self.recurring_repository.delete(id).await?;
                1
            }
        };

        tracing::info!(user_id, target = %target, ?scope, deleted, "Expense deleted");
        Ok(DeleteOutcome { deleted })
    }
}
