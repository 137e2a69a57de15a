use async_trait::async_trait;
use std::sync::Arc;

use crate::models::category::{
    Category, CreateCategoryRequest, DEFAULT_CATEGORY_COLOR, NewCategory, UpdateCategoryRequest,
};
use crate::repositories::{CategoryRepository, RepositoryError};

/// Category service errors
#[derive(Debug, thiserror::Error)]
pub enum CategoryError {
    #[error("Category with this name already exists")]
    DuplicateName,

    #[error("Category not found")]
    CategoryNotFound,

    #[error("Category is used by {0} expense(s) and cannot be deleted")]
    CategoryInUse(i64),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<RepositoryError> for CategoryError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => CategoryError::CategoryNotFound,
            RepositoryError::ConstraintViolation(_) => CategoryError::DuplicateName,
            RepositoryError::ReferenceViolation(_) => CategoryError::CategoryInUse(1),
            RepositoryError::DatabaseError(msg) => CategoryError::DatabaseError(msg),
        }
    }
}

/// Trait defining category service operations
#[async_trait]
pub trait CategoryService: Send + Sync {
    /// All household categories, ordered by name
    async fn list(&self) -> Result<Vec<Category>, CategoryError>;

    async fn create(&self, request: CreateCategoryRequest) -> Result<Category, CategoryError>;

    async fn update(
        &self,
        id: i64,
        request: UpdateCategoryRequest,
    ) -> Result<Category, CategoryError>;

    /// Delete a category no expense or recurring expense refers to
    async fn delete(&self, id: i64) -> Result<(), CategoryError>;
}

/// Implementation of CategoryService
pub struct CategoryServiceImpl {
    category_repository: Arc<dyn CategoryRepository>,
}

impl CategoryServiceImpl {
    pub fn new(category_repository: Arc<dyn CategoryRepository>) -> Self {
        Self {
            category_repository,
        }
    }
}

fn clean_name(name: &str) -> Result<String, CategoryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryError::Validation(
            "Category name is required".to_string(),
        ));
    }
    Ok(name.to_string())
}

#[async_trait]
impl CategoryService for CategoryServiceImpl {
    async fn list(&self) -> Result<Vec<Category>, CategoryError> {
        Ok(self.category_repository.list().await?)
    }

    async fn create(&self, request: CreateCategoryRequest) -> Result<Category, CategoryError> {
        let name = clean_name(&request.name)?;
        if self.category_repository.find_by_name(&name).await?.is_some() {
            return Err(CategoryError::DuplicateName);
        }

        let category = NewCategory {
            name,
            color: request
                .color
                .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
        };
        Ok(self.category_repository.create(category).await?)
    }

    async fn update(
        &self,
        id: i64,
        request: UpdateCategoryRequest,
    ) -> Result<Category, CategoryError> {
        let name = request.name.as_deref().map(clean_name).transpose()?;
        if let Some(name) = &name {
            if let Some(existing) = self.category_repository.find_by_name(name).await? {
                if existing.id != id {
                    return Err(CategoryError::DuplicateName);
                }
            }
        }

        Ok(self
            .category_repository
            .update(id, name, request.color)
            .await?)
    }

    async fn delete(&self, id: i64) -> Result<(), CategoryError> {
        self.category_repository
            .find_by_id(id)
            .await?
            .ok_or(CategoryError::CategoryNotFound)?;

        let references = self.category_repository.count_references(id).await?;
        if references > 0 {
            return Err(CategoryError::CategoryInUse(references));
        }

        match self.category_repository.delete(id).await {
            Ok(()) => {}
            // An expense took the category between the count and the delete
            Err(RepositoryError::ReferenceViolation(_)) => {
                let references = self.category_repository.count_references(id).await?;
                return Err(CategoryError::CategoryInUse(references.max(1)));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(category_id = id, "Category deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::recurring::NewRecurringExpense;
    use crate::repositories::RecurringExpenseRepository;
    use crate::repositories::in_memory::InMemoryRepositories;
    use rust_decimal::Decimal;

    fn create_request(name: &str, color: Option<&str>) -> CreateCategoryRequest {
        CreateCategoryRequest {
            name: name.to_string(),
            color: color.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_create_uses_default_color() {
        let service = CategoryServiceImpl::new(InMemoryRepositories::new());

        let category = service.create(create_request("Mercado", None)).await.unwrap();
        assert_eq!(category.color, DEFAULT_CATEGORY_COLOR);

        let colored = service
            .create(create_request("Lazer", Some("#8e44ad")))
            .await
            .unwrap();
        assert_eq!(colored.color, "#8e44ad");
    }

    #[tokio::test]
    async fn test_create_duplicate_name() {
        let service = CategoryServiceImpl::new(InMemoryRepositories::new());

        service.create(create_request("Mercado", None)).await.unwrap();
        let result = service.create(create_request(" Mercado ", None)).await;

        assert!(matches!(result, Err(CategoryError::DuplicateName)));
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let repo = InMemoryRepositories::new();
        let casa = repo.insert_category("Casa", "#3498db");
        let service = CategoryServiceImpl::new(repo);

        let created = service.create(create_request("   ", None)).await;
        assert!(matches!(created, Err(CategoryError::Validation(_))));

        let renamed = service
            .update(
                casa.id,
                UpdateCategoryRequest {
                    name: Some("\t ".to_string()),
                    color: None,
                },
            )
            .await;
        assert!(matches!(renamed, Err(CategoryError::Validation(_))));
        assert!(service.list().await.unwrap().iter().all(|c| !c.name.is_empty()));
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_name() {
        let service = CategoryServiceImpl::new(InMemoryRepositories::new());
        for name in ["Transporte", "Casa", "Mercado"] {
            service.create(create_request(name, None)).await.unwrap();
        }

        let names: Vec<String> = service
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Casa", "Mercado", "Transporte"]);
    }

    #[tokio::test]
    async fn test_update_rejects_taken_name_but_allows_own() {
        let repo = InMemoryRepositories::new();
        let casa = repo.insert_category("Casa", "#3498db");
        repo.insert_category("Mercado", "#27ae60");
        let service = CategoryServiceImpl::new(repo);

        let taken = service
            .update(
                casa.id,
                UpdateCategoryRequest {
                    name: Some("Mercado".to_string()),
                    color: None,
                },
            )
            .await;
        assert!(matches!(taken, Err(CategoryError::DuplicateName)));

        let recolored = service
            .update(
                casa.id,
                UpdateCategoryRequest {
                    name: Some("Casa".to_string()),
                    color: Some("#000000".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(recolored.color, "#000000");
    }

    #[tokio::test]
    async fn test_delete_in_use_reports_count() {
        let repo = InMemoryRepositories::new();
        let casa = repo.insert_category("Casa", "#3498db");
        RecurringExpenseRepository::create_many(
            repo.as_ref(),
            vec![NewRecurringExpense {
                user_id: 1,
                category_id: casa.id,
                description: "Aluguel".to_string(),
                amount: Decimal::new(150000, 2),
                day_of_month: 5,
                active: true,
                shared_with_user_id: None,
            }],
        )
        .await
        .unwrap();
        let service = CategoryServiceImpl::new(repo);

        let result = service.delete(casa.id).await;
        assert!(matches!(result, Err(CategoryError::CategoryInUse(1))));
    }

    /// Lets an expense claim the category right before the delete reaches storage
    struct LateReferenceRepository {
        inner: Arc<InMemoryRepositories>,
    }

    #[async_trait]
    impl CategoryRepository for LateReferenceRepository {
        async fn create(&self, category: NewCategory) -> Result<Category, RepositoryError> {
            CategoryRepository::create(self.inner.as_ref(), category).await
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<Category>, RepositoryError> {
            CategoryRepository::find_by_id(self.inner.as_ref(), id).await
        }

        async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
            self.inner.find_by_name(name).await
        }

        async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
            CategoryRepository::list(self.inner.as_ref()).await
        }

        async fn update(
            &self,
            id: i64,
            name: Option<String>,
            color: Option<String>,
        ) -> Result<Category, RepositoryError> {
            CategoryRepository::update(self.inner.as_ref(), id, name, color).await
        }

        async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
            RecurringExpenseRepository::create_many(
                self.inner.as_ref(),
                vec![NewRecurringExpense {
                    user_id: 1,
                    category_id: id,
                    description: "Internet".to_string(),
                    amount: Decimal::new(9990, 2),
                    day_of_month: 10,
                    active: true,
                    shared_with_user_id: None,
                }],
            )
            .await?;
            Err(RepositoryError::ReferenceViolation(
                "violates foreign key constraint".to_string(),
            ))
        }

        async fn count_references(&self, id: i64) -> Result<i64, RepositoryError> {
            self.inner.count_references(id).await
        }
    }

    #[tokio::test]
    async fn test_delete_losing_race_reports_in_use() {
        let inner = InMemoryRepositories::new();
        let casa = inner.insert_category("Casa", "#3498db");
        let service = CategoryServiceImpl::new(Arc::new(LateReferenceRepository { inner }));

        let result = service.delete(casa.id).await;
        assert!(matches!(result, Err(CategoryError::CategoryInUse(1))));
    }

    #[test]
    fn test_reference_violation_is_not_a_duplicate() {
        let error = CategoryError::from(RepositoryError::ReferenceViolation("fk".to_string()));
        assert!(matches!(error, CategoryError::CategoryInUse(_)));

        let error = CategoryError::from(RepositoryError::ConstraintViolation("unique".to_string()));
        assert!(matches!(error, CategoryError::DuplicateName));
    }

    #[tokio::test]
    async fn test_delete_unused_and_missing() {
        let repo = InMemoryRepositories::new();
        let casa = repo.insert_category("Casa", "#3498db");
        let service = CategoryServiceImpl::new(repo);

        service.delete(casa.id).await.unwrap();
        assert!(matches!(
            service.delete(casa.id).await,
            Err(CategoryError::CategoryNotFound)
        ));
    }

    #[tokio::test]
    async fn test_database_error() {
        let repo = InMemoryRepositories::new();
        repo.fail();
        let service = CategoryServiceImpl::new(repo);

        assert!(matches!(
            service.list().await,
            Err(CategoryError::DatabaseError(_))
        ));
    }
}
