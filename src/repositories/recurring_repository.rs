use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::recurring::{
    NewRecurringExpense, NewRecurringPayment, RecurringExpense, RecurringPayment,
};
use crate::repositories::RepositoryError;

/// Trait defining recurring expense and recurring payment operations
#[async_trait]
pub trait RecurringExpenseRepository: Send + Sync {
    /// Insert a batch of templates; either all rows are stored or none
    async fn create_many(
        &self,
        templates: Vec<NewRecurringExpense>,
    ) -> Result<Vec<RecurringExpense>, RepositoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<RecurringExpense>, RepositoryError>;

    /// Every template of a user, active or not, ordered by day of month
    async fn find_by_user(&self, user_id: i64) -> Result<Vec<RecurringExpense>, RepositoryError>;

    async fn update(&self, template: RecurringExpense) -> Result<RecurringExpense, RepositoryError>;

    /// Delete a template together with all of its payment records
    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;

    /// Payment records of a user whose reference date lies between `from` and `to`
    async fn find_payments_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RecurringPayment>, RepositoryError>;

    /// Insert or refresh the record keyed by (user, template, reference date)
    async fn upsert_payment(
        &self,
        payment: NewRecurringPayment,
    ) -> Result<RecurringPayment, RepositoryError>;

    /// Remove the record keyed by (user, template, reference date); false if there was none
    async fn delete_payment(
        &self,
        user_id: i64,
        recurring_expense_id: i64,
        reference_date: NaiveDate,
    ) -> Result<bool, RepositoryError>;
}

/// PostgreSQL implementation of RecurringExpenseRepository
pub struct PostgresRecurringExpenseRepository {
    pool: PgPool,
}

impl PostgresRecurringExpenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TEMPLATE_COLUMNS: &str = "id, user_id, category_id, description, amount, day_of_month, \
     active, shared_with_user_id, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, user_id, recurring_expense_id, description, amount, \
     reference_date, paid_date, created_at";

#[async_trait]
impl RecurringExpenseRepository for PostgresRecurringExpenseRepository {
    async fn create_many(
        &self,
        templates: Vec<NewRecurringExpense>,
    ) -> Result<Vec<RecurringExpense>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let insert = format!(
            r#"
            INSERT INTO despesas_fixas (
                user_id, category_id, description, amount, day_of_month, active,
                shared_with_user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {TEMPLATE_COLUMNS}
            "#
        );

        let mut created = Vec::with_capacity(templates.len());
        for template in templates {
            let row = sqlx::query_as::<_, RecurringExpense>(&insert)
                .bind(template.user_id)
                .bind(template.category_id)
                .bind(template.description)
                .bind(template.amount)
                .bind(template.day_of_month)
                .bind(template.active)
                .bind(template.shared_with_user_id)
                .fetch_one(&mut *tx)
                .await?;
            created.push(row);
        }

        tx.commit().await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<RecurringExpense>, RepositoryError> {
        let template = sqlx::query_as::<_, RecurringExpense>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM despesas_fixas WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(template)
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<RecurringExpense>, RepositoryError> {
        let templates = sqlx::query_as::<_, RecurringExpense>(&format!(
            r#"
            SELECT {TEMPLATE_COLUMNS}
            FROM despesas_fixas
            WHERE user_id = $1
            ORDER BY day_of_month ASC, id ASC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(templates)
    }

    async fn update(&self, template: RecurringExpense) -> Result<RecurringExpense, RepositoryError> {
        let updated = sqlx::query_as::<_, RecurringExpense>(&format!(
            r#"
            UPDATE despesas_fixas
            SET category_id = $2,
                description = $3,
                amount = $4,
                day_of_month = $5,
                active = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TEMPLATE_COLUMNS}
            "#
        ))
        .bind(template.id)
        .bind(template.category_id)
        .bind(template.description)
        .bind(template.amount)
        .bind(template.day_of_month)
        .bind(template.active)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        // Payment records go with the template through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM despesas_fixas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn find_payments_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RecurringPayment>, RepositoryError> {
        let payments = sqlx::query_as::<_, RecurringPayment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM despesas_pagas_temp
            WHERE user_id = $1 AND reference_date BETWEEN $2 AND $3
            "#
        ))
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    async fn upsert_payment(
        &self,
        payment: NewRecurringPayment,
    ) -> Result<RecurringPayment, RepositoryError> {
        let stored = sqlx::query_as::<_, RecurringPayment>(&format!(
            r#"
            INSERT INTO despesas_pagas_temp (
                user_id, recurring_expense_id, description, amount, reference_date, paid_date
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, recurring_expense_id, reference_date)
            DO UPDATE SET description = EXCLUDED.description,
                          amount = EXCLUDED.amount,
                          paid_date = EXCLUDED.paid_date
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment.user_id)
        .bind(payment.recurring_expense_id)
        .bind(payment.description)
        .bind(payment.amount)
        .bind(payment.reference_date)
        .bind(payment.paid_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn delete_payment(
        &self,
        user_id: i64,
        recurring_expense_id: i64,
        reference_date: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM despesas_pagas_temp
            WHERE user_id = $1 AND recurring_expense_id = $2 AND reference_date = $3
            "#,
        )
        .bind(user_id)
        .bind(recurring_expense_id)
        .bind(reference_date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
