use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::expense::{Expense, NewExpense};
use crate::repositories::RepositoryError;

/// Trait defining expense repository operations
#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// Insert a batch of expenses; either all rows are stored or none
    async fn create_many(&self, expenses: Vec<NewExpense>) -> Result<Vec<Expense>, RepositoryError>;

    /// Find an expense by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Expense>, RepositoryError>;

    /// A user's expenses due between `from` and `to` (inclusive), sorted by due date ascending
    async fn find_by_user_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Expense>, RepositoryError>;

    /// Overwrite the editable fields of an existing expense
    async fn update(&self, expense: Expense) -> Result<Expense, RepositoryError>;

    async fn set_paid(
        &self,
        id: i64,
        paid: bool,
        paid_date: Option<NaiveDate>,
    ) -> Result<Expense, RepositoryError>;

    /// Delete a single expense by ID
    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;

    /// Delete every row of an installment group owned by `user_id`, returning how many went
    async fn delete_group(&self, user_id: i64, group: Uuid) -> Result<u64, RepositoryError>;
}

/// PostgreSQL implementation of ExpenseRepository
pub struct PostgresExpenseRepository {
    pool: PgPool,
}

impl PostgresExpenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const EXPENSE_COLUMNS: &str = "id, user_id, category_id, description, amount, kind, due_date, \
     paid, paid_date, installment_number, installment_total, installment_group, \
     shared_with_user_id, created_at";

#[async_trait]
impl ExpenseRepository for PostgresExpenseRepository {
    async fn create_many(&self, expenses: Vec<NewExpense>) -> Result<Vec<Expense>, RepositoryError> {
        // Installment plans and split mirrors are all-or-nothing
        let mut tx = self.pool.begin().await?;

        let insert = format!(
            r#"
            INSERT INTO despesas (
                user_id, category_id, description, amount, kind, due_date, paid,
                paid_date, installment_number, installment_total, installment_group,
                shared_with_user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {EXPENSE_COLUMNS}
            "#
        );

        let mut created = Vec::with_capacity(expenses.len());
        for expense in expenses {
            let row = sqlx::query_as::<_, Expense>(&insert)
                .bind(expense.user_id)
                .bind(expense.category_id)
                .bind(expense.description)
                .bind(expense.amount)
                .bind(expense.kind.as_str())
                .bind(expense.due_date)
                .bind(expense.paid)
                .bind(expense.paid_date)
                .bind(expense.installment_number)
                .bind(expense.installment_total)
                .bind(expense.installment_group)
                .bind(expense.shared_with_user_id)
                .fetch_one(&mut *tx)
                .await?;
            created.push(row);
        }

        tx.commit().await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Expense>, RepositoryError> {
        let expense = sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM despesas WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(expense)
    }

    async fn find_by_user_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Expense>, RepositoryError> {
        let expenses = sqlx::query_as::<_, Expense>(&format!(
            r#"
            SELECT {EXPENSE_COLUMNS}
            FROM despesas
            WHERE user_id = $1 AND due_date BETWEEN $2 AND $3
            ORDER BY due_date ASC, id ASC
            "#
        ))
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    async fn update(&self, expense: Expense) -> Result<Expense, RepositoryError> {
        let updated = sqlx::query_as::<_, Expense>(&format!(
            r#"
            UPDATE despesas
            SET category_id = $2,
                description = $3,
                amount = $4,
                due_date = $5
            WHERE id = $1
            RETURNING {EXPENSE_COLUMNS}
            "#
        ))
        .bind(expense.id)
        .bind(expense.category_id)
        .bind(expense.description)
        .bind(expense.amount)
        .bind(expense.due_date)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or(RepositoryError::NotFound)
    }

    async fn set_paid(
        &self,
        id: i64,
        paid: bool,
        paid_date: Option<NaiveDate>,
    ) -> Result<Expense, RepositoryError> {
        let updated = sqlx::query_as::<_, Expense>(&format!(
            r#"
            UPDATE despesas
            SET paid = $2, paid_date = $3
            WHERE id = $1
            RETURNING {EXPENSE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(paid)
        .bind(paid_date)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM despesas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_group(&self, user_id: i64, group: Uuid) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM despesas WHERE installment_group = $1 AND user_id = $2")
                .bind(group)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}
