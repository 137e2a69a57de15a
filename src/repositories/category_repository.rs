use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::category::{Category, NewCategory};
use crate::repositories::RepositoryError;

/// Trait defining category repository operations
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category; a taken name is a constraint violation
    async fn create(&self, category: NewCategory) -> Result<Category, RepositoryError>;

    /// Find a category by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Category>, RepositoryError>;

    /// Find a category by its exact name
    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError>;

    /// All categories, ordered by name
    async fn list(&self) -> Result<Vec<Category>, RepositoryError>;

    async fn update(
        &self,
        id: i64,
        name: Option<String>,
        color: Option<String>,
    ) -> Result<Category, RepositoryError>;

    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;

    /// Number of expenses and recurring templates pointing at the category
    async fn count_references(&self, id: i64) -> Result<i64, RepositoryError>;
}

/// PostgreSQL implementation of CategoryRepository
pub struct PostgresCategoryRepository {
    pool: PgPool,
}

impl PostgresCategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for PostgresCategoryRepository {
    async fn create(&self, category: NewCategory) -> Result<Category, RepositoryError> {
        let result = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categorias (name, color)
            VALUES ($1, $2)
            RETURNING id, name, color, created_at
            "#,
        )
        .bind(&category.name)
        .bind(&category.color)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(category) => Ok(category),
            Err(sqlx::Error::Database(db_err)) => {
                if db_err.is_unique_violation() {
                    Err(RepositoryError::ConstraintViolation(
                        "Category with this name already exists".to_string(),
                    ))
                } else {
                    Err(RepositoryError::DatabaseError(db_err.to_string()))
                }
            }
            Err(e) => Err(RepositoryError::DatabaseError(e.to_string())),
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, color, created_at FROM categorias WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, color, created_at FROM categorias WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, color, created_at FROM categorias ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn update(
        &self,
        id: i64,
        name: Option<String>,
        color: Option<String>,
    ) -> Result<Category, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categorias
            SET name = COALESCE($2, name),
                color = COALESCE($3, color)
            WHERE id = $1
            RETURNING id, name, color, created_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(color)
        .fetch_optional(&self.pool)
        .await?;

        category.ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM categorias WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn count_references(&self, id: i64) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT (SELECT COUNT(*) FROM despesas WHERE category_id = $1)
                 + (SELECT COUNT(*) FROM despesas_fixas WHERE category_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
