pub mod auth;
pub mod category;
pub mod expense;
pub mod period;
pub mod recurring;
pub mod user;

pub use auth::{AuthToken, LoginRequest, SessionInfo, SessionStatus};
pub use category::{Category, CreateCategoryRequest, NewCategory, UpdateCategoryRequest};
pub use expense::{
    CreateExpenseRequest, DeleteOutcome, DeleteScope, Expense, ExpenseKind, ExpenseRef,
    MonthlyExpense, MonthlyExpenseKind, MonthlyStatement, NewExpense, PaymentStatus, PaymentTarget,
    SetPaidRequest, UpdateExpenseRequest,
};
pub use period::{Period, PeriodQuery};
pub use recurring::{
    CreateRecurringExpenseRequest, NewRecurringExpense, NewRecurringPayment, RecurringExpense,
    RecurringPayment, UpdateRecurringExpenseRequest,
};
pub use user::{ChangePasswordRequest, CreateUserRequest, UpdateUserRequest, User, UserSummary};
