pub mod category_repository;
pub mod expense_repository;
#[cfg(test)]
pub(crate) mod in_memory;
pub mod json_store;
pub mod recurring_repository;
pub mod user_repository;

pub use category_repository::{CategoryRepository, PostgresCategoryRepository};
pub use expense_repository::{ExpenseRepository, PostgresExpenseRepository};
pub use json_store::{
    JsonCategoryRepository, JsonExpenseRepository, JsonRecurringExpenseRepository, JsonStore,
    JsonUserRepository,
};
pub use recurring_repository::{PostgresRecurringExpenseRepository, RecurringExpenseRepository};
pub use user_repository::{PostgresUserRepository, UserRepository};

/// Repository errors for storage operations, shared by both backends
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Resource not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A foreign key blocked the write or delete
    #[error("Reference violation: {0}")]
    ReferenceViolation(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepositoryError::ConstraintViolation(db_err.to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                RepositoryError::ReferenceViolation(db_err.to_string())
            }
            e => RepositoryError::DatabaseError(e.to_string()),
        }
    }
}
