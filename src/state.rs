use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

use crate::repositories::{
    CategoryRepository, ExpenseRepository, JsonCategoryRepository, JsonExpenseRepository,
    JsonRecurringExpenseRepository, JsonStore, JsonUserRepository, PostgresCategoryRepository,
    PostgresExpenseRepository, PostgresRecurringExpenseRepository, PostgresUserRepository,
    RecurringExpenseRepository, UserRepository,
};
use crate::services::{
    AuthService, AuthServiceImpl, CategoryService, CategoryServiceImpl, ExpenseService,
    ExpenseServiceImpl, UserService, UserServiceImpl,
};

/// One storage client per table, backed by either PostgreSQL or the JSON store
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub expenses: Arc<dyn ExpenseRepository>,
    pub recurring: Arc<dyn RecurringExpenseRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            categories: Arc::new(PostgresCategoryRepository::new(pool.clone())),
            expenses: Arc::new(PostgresExpenseRepository::new(pool.clone())),
            recurring: Arc::new(PostgresRecurringExpenseRepository::new(pool)),
        }
    }

    pub fn json(store: Arc<JsonStore>) -> Self {
        Self {
            users: Arc::new(JsonUserRepository::new(store.clone())),
            categories: Arc::new(JsonCategoryRepository::new(store.clone())),
            expenses: Arc::new(JsonExpenseRepository::new(store.clone())),
            recurring: Arc::new(JsonRecurringExpenseRepository::new(store)),
        }
    }
}

/// Shared application state; handlers pull the service they need via `FromRef`
#[derive(Clone, FromRef)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthService>,
    pub user_service: Arc<dyn UserService>,
    pub category_service: Arc<dyn CategoryService>,
    pub expense_service: Arc<dyn ExpenseService>,
}

impl AppState {
    pub fn new(repositories: Repositories, session_secret: String, bcrypt_cost: u32) -> Self {
        let Repositories {
            users,
            categories,
            expenses,
            recurring,
        } = repositories;

        Self {
            auth_service: Arc::new(AuthServiceImpl::new(
                users.clone(),
                session_secret,
                bcrypt_cost,
            )),
            user_service: Arc::new(UserServiceImpl::new(users.clone(), bcrypt_cost)),
            category_service: Arc::new(CategoryServiceImpl::new(categories.clone())),
            expense_service: Arc::new(ExpenseServiceImpl::new(
                expenses, recurring, categories, users,
            )),
        }
    }
}
