use async_trait::async_trait;
use std::sync::Arc;

use crate::models::user::{
    ChangePasswordRequest, CreateUserRequest, UpdateUserRequest, User, UserChanges, UserSummary,
};
use crate::repositories::{RepositoryError, UserRepository};
use crate::services::auth_service::hash_password;

/// User management errors
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Users cannot modify or delete their own account here")]
    SelfModification,

    #[error("User still owns {0} expense(s)")]
    HasExpenses(i64),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<RepositoryError> for UserError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => UserError::NotFound,
            RepositoryError::ConstraintViolation(_) => UserError::DuplicateUsername,
            // Rows the delete guard did not see still point at the user
            RepositoryError::ReferenceViolation(_) => UserError::HasExpenses(1),
            RepositoryError::DatabaseError(msg) => UserError::DatabaseError(msg),
        }
    }
}

/// Management of household members by other members
#[async_trait]
pub trait UserService: Send + Sync {
    /// All users, flagging the caller
    async fn list(&self, current_user_id: i64) -> Result<Vec<UserSummary>, UserError>;

    async fn get(&self, id: i64) -> Result<User, UserError>;

    async fn create(&self, request: CreateUserRequest) -> Result<User, UserError>;

    /// Rename another user; the caller cannot edit themselves through this
    async fn update(
        &self,
        current_user_id: i64,
        id: i64,
        request: UpdateUserRequest,
    ) -> Result<User, UserError>;

    async fn change_password(
        &self,
        id: i64,
        request: ChangePasswordRequest,
    ) -> Result<(), UserError>;

    /// Delete another user who owns no expenses
    async fn delete(&self, current_user_id: i64, id: i64) -> Result<(), UserError>;
}

pub struct UserServiceImpl {
    user_repository: Arc<dyn UserRepository>,
    bcrypt_cost: u32,
}

impl UserServiceImpl {
    pub fn new(user_repository: Arc<dyn UserRepository>, bcrypt_cost: u32) -> Self {
        Self {
            user_repository,
            bcrypt_cost,
        }
    }

    fn hash(&self, password: &str) -> Result<String, UserError> {
        hash_password(password, self.bcrypt_cost)
            .map_err(|e| UserError::DatabaseError(format!("Password hashing failed: {}", e)))
    }

    async fn existing(&self, id: i64) -> Result<User, UserError> {
        self.user_repository
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound)
    }
}

#[async_trait]
impl UserService for UserServiceImpl {
    async fn list(&self, current_user_id: i64) -> Result<Vec<UserSummary>, UserError> {
        let users = self.user_repository.list().await?;
        Ok(users
            .into_iter()
            .map(|user| UserSummary::from_user(user, current_user_id))
            .collect())
    }

    async fn get(&self, id: i64) -> Result<User, UserError> {
        self.existing(id).await
    }

    async fn create(&self, request: CreateUserRequest) -> Result<User, UserError> {
        let password_hash = self.hash(&request.password)?;
        let user = self.user_repository.create(request, password_hash).await?;

        tracing::info!(user_id = user.id, username = %user.username, "User created");
        Ok(user)
    }

    async fn update(
        &self,
        current_user_id: i64,
        id: i64,
        request: UpdateUserRequest,
    ) -> Result<User, UserError> {
        if id == current_user_id {
            return Err(UserError::SelfModification);
        }
        self.existing(id).await?;

        let changes = UserChanges {
            username: request.username,
            name: request.name,
            password_hash: None,
        };
        Ok(self.user_repository.update(id, changes).await?)
    }

    async fn change_password(
        &self,
        id: i64,
        request: ChangePasswordRequest,
    ) -> Result<(), UserError> {
        self.existing(id).await?;

        let changes = UserChanges {
            password_hash: Some(self.hash(&request.new_password)?),
            ..UserChanges::default()
        };
        self.user_repository.update(id, changes).await?;

        tracing::info!(user_id = id, "Password changed");
        Ok(())
    }

    async fn delete(&self, current_user_id: i64, id: i64) -> Result<(), UserError> {
        if id == current_user_id {
            return Err(UserError::SelfModification);
        }
        self.existing(id).await?;

        let owned = self.user_repository.count_owned_expenses(id).await?;
        if owned > 0 {
            return Err(UserError::HasExpenses(owned));
        }

        self.user_repository.delete(id).await?;
        tracing::info!(user_id = id, deleted_by = current_user_id, "User deleted");
        Ok(())
    }
}
