pub mod auth_service;
pub mod category_service;
pub mod expense_service;
pub mod user_service;

pub use auth_service::{AuthError, AuthService, AuthServiceImpl};
pub use category_service::{CategoryError, CategoryService, CategoryServiceImpl};
pub use expense_service::{ExpenseError, ExpenseService, ExpenseServiceImpl};
pub use user_service::{UserError, UserService, UserServiceImpl};
