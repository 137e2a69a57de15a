//! Flat-file storage backend.
//!
//! Every table is one JSON array in `<dir>/<table>.json`. Writes rewrite the
//! whole file through a temporary file and a rename. Within one process all
//! access goes through a single mutex; across processes the last writer wins.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::category::{Category, NewCategory};
use crate::models::expense::{Expense, NewExpense};
use crate::models::recurring::{
    NewRecurringExpense, NewRecurringPayment, RecurringExpense, RecurringPayment,
};
use crate::models::user::{CreateUserRequest, User, UserChanges};
use crate::repositories::{
    CategoryRepository, ExpenseRepository, RecurringExpenseRepository, RepositoryError,
    UserRepository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Users,
    Categories,
    Expenses,
    RecurringExpenses,
    RecurringPayments,
}

impl Table {
    pub fn file_name(&self) -> &'static str {
        match self {
            Table::Users => "usuarios",
            Table::Categories => "categorias",
            Table::Expenses => "despesas",
            Table::RecurringExpenses => "despesas_fixas",
            Table::RecurringPayments => "despesas_pagas_temp",
        }
    }
}

pub type StoreGuard<'a> = MutexGuard<'a, ()>;

pub struct JsonStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

fn io_error(error: std::io::Error) -> RepositoryError {
    RepositoryError::DatabaseError(format!("I/O error: {}", error))
}

fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0) + 1
}

impl JsonStore {
    /// Opens (creating if needed) the data directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(io_error)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, table: Table) -> PathBuf {
        self.dir.join(format!("{}.json", table.file_name()))
    }

    pub async fn lock(&self) -> StoreGuard<'_> {
        self.lock.lock().await
    }

    /// Reads a table; a missing or blank file is an empty table
    pub async fn load<T: DeserializeOwned>(
        &self,
        _guard: &StoreGuard<'_>,
        table: Table,
    ) -> Result<Vec<T>, RepositoryError> {
        match tokio::fs::read(self.path(table)).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                RepositoryError::DatabaseError(format!(
                    "corrupt {} file: {}",
                    table.file_name(),
                    e
                ))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(io_error(e)),
        }
    }

    pub async fn save<T: Serialize>(
        &self,
        _guard: &StoreGuard<'_>,
        table: Table,
        rows: &[T],
    ) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec_pretty(rows)
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        let path = self.path(table);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(io_error)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_error)?;
        Ok(())
    }

    pub async fn read<T: DeserializeOwned>(&self, table: Table) -> Result<Vec<T>, RepositoryError> {
        let guard = self.lock().await;
        self.load(&guard, table).await
    }

    /// Read-modify-write of one table under the store lock.
    /// Nothing is written when `f` fails.
    pub async fn modify<T, R, F>(&self, table: Table, f: F) -> Result<R, RepositoryError>
    where
        T: Serialize + DeserializeOwned + Send,
        R: Send,
        F: FnOnce(&mut Vec<T>) -> Result<R, RepositoryError> + Send,
    {
        let guard = self.lock().await;
        let mut rows = self.load(&guard, table).await?;
        let result = f(&mut rows)?;
        self.save(&guard, table, &rows).await?;
        Ok(result)
    }
}

// ==================== USERS ====================

/// On-disk user row; unlike [`User`] it keeps the password hash when serialized
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    id: i64,
    username: String,
    name: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<StoredUser> for User {
    fn from(stored: StoredUser) -> Self {
        User {
            id: stored.id,
            username: stored.username,
            name: stored.name,
            password_hash: stored.password_hash,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}

pub struct JsonUserRepository {
    store: Arc<JsonStore>,
}

impl JsonUserRepository {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UserRepository for JsonUserRepository {
    async fn create(
        &self,
        user: CreateUserRequest,
        password_hash: String,
    ) -> Result<User, RepositoryError> {
        self.store
            .modify(Table::Users, move |users: &mut Vec<StoredUser>| {
                if users.iter().any(|u| u.username == user.username) {
                    return Err(RepositoryError::ConstraintViolation(
                        "Username already exists".to_string(),
                    ));
                }

                let stored = StoredUser {
                    id: next_id(users.iter().map(|u| u.id)),
                    username: user.username,
                    name: user.name,
                    password_hash,
                    created_at: Utc::now(),
                    updated_at: None,
                };
                users.push(stored.clone());
                Ok(User::from(stored))
            })
            .await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let users: Vec<StoredUser> = self.store.read(Table::Users).await?;
        Ok(users
            .into_iter()
            .find(|u| u.username == username)
            .map(User::from))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let users: Vec<StoredUser> = self.store.read(Table::Users).await?;
        Ok(users.into_iter().find(|u| u.id == id).map(User::from))
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let mut users: Vec<StoredUser> = self.store.read(Table::Users).await?;
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(users.into_iter().map(User::from).collect())
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, RepositoryError> {
        self.store
            .modify(Table::Users, move |users: &mut Vec<StoredUser>| {
                if let Some(username) = &changes.username {
                    if users.iter().any(|u| &u.username == username && u.id != id) {
                        return Err(RepositoryError::ConstraintViolation(
                            "Username already exists".to_string(),
                        ));
                    }
                }

                let user = users
                    .iter_mut()
                    .find(|u| u.id == id)
                    .ok_or(RepositoryError::NotFound)?;

                if let Some(username) = changes.username {
                    user.username = username;
                }
                if let Some(name) = changes.name {
                    user.name = name;
                }
                if let Some(password_hash) = changes.password_hash {
                    user.password_hash = password_hash;
                }
                user.updated_at = Some(Utc::now());

                Ok(User::from(user.clone()))
            })
            .await
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        self.store
            .modify(Table::Users, move |users: &mut Vec<StoredUser>| {
                let index = users
                    .iter()
                    .position(|u| u.id == id)
                    .ok_or(RepositoryError::NotFound)?;
                users.remove(index);
                Ok(())
            })
            .await
    }

    async fn count_owned_expenses(&self, id: i64) -> Result<i64, RepositoryError> {
        let guard = self.store.lock().await;
        let expenses: Vec<Expense> = self.store.load(&guard, Table::Expenses).await?;
        let templates: Vec<RecurringExpense> =
            self.store.load(&guard, Table::RecurringExpenses).await?;

        let count = expenses.iter().filter(|e| e.user_id == id).count()
            + templates.iter().filter(|t| t.user_id == id).count();
        Ok(count as i64)
    }
}

// ==================== CATEGORIES ====================

pub struct JsonCategoryRepository {
    store: Arc<JsonStore>,
}

impl JsonCategoryRepository {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CategoryRepository for JsonCategoryRepository {
    async fn create(&self, category: NewCategory) -> Result<Category, RepositoryError> {
        self.store
            .modify(Table::Categories, move |categories: &mut Vec<Category>| {
                if categories.iter().any(|c| c.name == category.name) {
                    return Err(RepositoryError::ConstraintViolation(
                        "Category with this name already exists".to_string(),
                    ));
                }

                let created = Category {
                    id: next_id(categories.iter().map(|c| c.id)),
                    name: category.name,
                    color: category.color,
                    created_at: Utc::now(),
                };
                categories.push(created.clone());
                Ok(created)
            })
            .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Category>, RepositoryError> {
        let categories: Vec<Category> = self.store.read(Table::Categories).await?;
        Ok(categories.into_iter().find(|c| c.id == id))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
        let categories: Vec<Category> = self.store.read(Table::Categories).await?;
        Ok(categories.into_iter().find(|c| c.name == name))
    }

    async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let mut categories: Vec<Category> = self.store.read(Table::Categories).await?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn update(
        &self,
        id: i64,
        name: Option<String>,
        color: Option<String>,
    ) -> Result<Category, RepositoryError> {
        self.store
            .modify(Table::Categories, move |categories: &mut Vec<Category>| {
                if let Some(name) = &name {
                    if categories.iter().any(|c| &c.name == name && c.id != id) {
                        return Err(RepositoryError::ConstraintViolation(
                            "Category with this name already exists".to_string(),
                        ));
                    }
                }

                let category = categories
                    .iter_mut()
                    .find(|c| c.id == id)
                    .ok_or(RepositoryError::NotFound)?;

                if let Some(name) = name {
                    category.name = name;
                }
                if let Some(color) = color {
                    category.color = color;
                }
                Ok(category.clone())
            })
            .await
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        self.store
            .modify(Table::Categories, move |categories: &mut Vec<Category>| {
                let index = categories
                    .iter()
                    .position(|c| c.id == id)
                    .ok_or(RepositoryError::NotFound)?;
                categories.remove(index);
                Ok(())
            })
            .await
    }

    async fn count_references(&self, id: i64) -> Result<i64, RepositoryError> {
        let guard = self.store.lock().await;
        let expenses: Vec<Expense> = self.store.load(&guard, Table::Expenses).await?;
        let templates: Vec<RecurringExpense> =
            self.store.load(&guard, Table::RecurringExpenses).await?;

        let count = expenses.iter().filter(|e| e.category_id == id).count()
            + templates.iter().filter(|t| t.category_id == id).count();
        Ok(count as i64)
    }
}

// ==================== EXPENSES ====================

pub struct JsonExpenseRepository {
    store: Arc<JsonStore>,
}

impl JsonExpenseRepository {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ExpenseRepository for JsonExpenseRepository {
    async fn create_many(&self, new_expenses: Vec<NewExpense>) -> Result<Vec<Expense>, RepositoryError> {
        self.store
            .modify(Table::Expenses, move |expenses: &mut Vec<Expense>| {
                let mut id = next_id(expenses.iter().map(|e| e.id));
                let created_at = Utc::now();
                let mut created = Vec::with_capacity(new_expenses.len());

                for expense in new_expenses {
                    let row = Expense {
                        id,
                        user_id: expense.user_id,
                        category_id: expense.category_id,
                        description: expense.description,
                        amount: expense.amount,
                        kind: expense.kind,
                        due_date: expense.due_date,
                        paid: expense.paid,
                        paid_date: expense.paid_date,
                        installment_number: expense.installment_number,
                        installment_total: expense.installment_total,
                        installment_group: expense.installment_group,
                        shared_with_user_id: expense.shared_with_user_id,
                        created_at,
                    };
                    id += 1;
                    created.push(row);
                }

                expenses.extend(created.iter().cloned());
                Ok(created)
            })
            .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Expense>, RepositoryError> {
        let expenses: Vec<Expense> = self.store.read(Table::Expenses).await?;
        Ok(expenses.into_iter().find(|e| e.id == id))
    }

    async fn find_by_user_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Expense>, RepositoryError> {
        let expenses: Vec<Expense> = self.store.read(Table::Expenses).await?;
        let mut found: Vec<Expense> = expenses
            .into_iter()
            .filter(|e| e.user_id == user_id && e.due_date >= from && e.due_date <= to)
            .collect();
        found.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn update(&self, expense: Expense) -> Result<Expense, RepositoryError> {
        self.store
            .modify(Table::Expenses, move |expenses: &mut Vec<Expense>| {
                let stored = expenses
                    .iter_mut()
                    .find(|e| e.id == expense.id)
                    .ok_or(RepositoryError::NotFound)?;

                stored.category_id = expense.category_id;
                stored.description = expense.description;
                stored.amount = expense.amount;
                stored.due_date = expense.due_date;
                Ok(stored.clone())
            })
            .await
    }

    async fn set_paid(
        &self,
        id: i64,
        paid: bool,
        paid_date: Option<NaiveDate>,
    ) -> Result<Expense, RepositoryError> {
        self.store
            .modify(Table::Expenses, move |expenses: &mut Vec<Expense>| {
                let stored = expenses
                    .iter_mut()
                    .find(|e| e.id == id)
                    .ok_or(RepositoryError::NotFound)?;

                stored.paid = paid;
                stored.paid_date = paid_date;
                Ok(stored.clone())
            })
            .await
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        self.store
            .modify(Table::Expenses, move |expenses: &mut Vec<Expense>| {
                let index = expenses
                    .iter()
                    .position(|e| e.id == id)
                    .ok_or(RepositoryError::NotFound)?;
                expenses.remove(index);
                Ok(())
            })
            .await
    }

    async fn delete_group(&self, user_id: i64, group: Uuid) -> Result<u64, RepositoryError> {
        self.store
            .modify(Table::Expenses, move |expenses: &mut Vec<Expense>| {
                let before = expenses.len();
                expenses.retain(|e| !(e.installment_group == Some(group) && e.user_id == user_id));
                Ok((before - expenses.len()) as u64)
            })
            .await
    }
}

// ==================== RECURRING EXPENSES ====================

pub struct JsonRecurringExpenseRepository {
    store: Arc<JsonStore>,
}

impl JsonRecurringExpenseRepository {
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RecurringExpenseRepository for JsonRecurringExpenseRepository {
    async fn create_many(
        &self,
        new_templates: Vec<NewRecurringExpense>,
    ) -> Result<Vec<RecurringExpense>, RepositoryError> {
        self.store
            .modify(
                Table::RecurringExpenses,
                move |templates: &mut Vec<RecurringExpense>| {
                    let mut id = next_id(templates.iter().map(|t| t.id));
                    let now = Utc::now();
                    let mut created = Vec::with_capacity(new_templates.len());

                    for template in new_templates {
                        created.push(RecurringExpense {
                            id,
                            user_id: template.user_id,
                            category_id: template.category_id,
                            description: template.description,
                            amount: template.amount,
                            day_of_month: template.day_of_month,
                            active: template.active,
                            shared_with_user_id: template.shared_with_user_id,
                            created_at: now,
                            updated_at: now,
                        });
                        id += 1;
                    }

                    templates.extend(created.iter().cloned());
                    Ok(created)
                },
            )
            .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<RecurringExpense>, RepositoryError> {
        let templates: Vec<RecurringExpense> = self.store.read(Table::RecurringExpenses).await?;
        Ok(templates.into_iter().find(|t| t.id == id))
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<RecurringExpense>, RepositoryError> {
        let templates: Vec<RecurringExpense> = self.store.read(Table::RecurringExpenses).await?;
        let mut found: Vec<RecurringExpense> = templates
            .into_iter()
            .filter(|t| t.user_id == user_id)
            .collect();
        found.sort_by(|a, b| a.day_of_month.cmp(&b.day_of_month).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn update(&self, template: RecurringExpense) -> Result<RecurringExpense, RepositoryError> {
        self.store
            .modify(
                Table::RecurringExpenses,
                move |templates: &mut Vec<RecurringExpense>| {
                    let stored = templates
                        .iter_mut()
                        .find(|t| t.id == template.id)
                        .ok_or(RepositoryError::NotFound)?;

                    stored.category_id = template.category_id;
                    stored.description = template.description;
                    stored.amount = template.amount;
                    stored.day_of_month = template.day_of_month;
                    stored.active = template.active;
                    stored.updated_at = Utc::now();
                    Ok(stored.clone())
                },
            )
            .await
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let guard = self.store.lock().await;

        let mut templates: Vec<RecurringExpense> =
            self.store.load(&guard, Table::RecurringExpenses).await?;
        let index = templates
            .iter()
            .position(|t| t.id == id)
            .ok_or(RepositoryError::NotFound)?;
        templates.remove(index);

        let mut payments: Vec<RecurringPayment> =
            self.store.load(&guard, Table::RecurringPayments).await?;
        payments.retain(|p| p.recurring_expense_id != id);

        // Payments first: a crash in between leaves a template without history
        // rather than orphaned payments
        self.store
            .save(&guard, Table::RecurringPayments, &payments)
            .await?;
        self.store
            .save(&guard, Table::RecurringExpenses, &templates)
            .await?;
        Ok(())
    }

    async fn find_payments_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RecurringPayment>, RepositoryError> {
        let payments: Vec<RecurringPayment> = self.store.read(Table::RecurringPayments).await?;
        Ok(payments
            .into_iter()
            .filter(|p| {
                p.user_id == user_id && p.reference_date >= from && p.reference_date <= to
            })
            .collect())
    }

    async fn upsert_payment(
        &self,
        payment: NewRecurringPayment,
    ) -> Result<RecurringPayment, RepositoryError> {
        self.store
            .modify(
                Table::RecurringPayments,
                move |payments: &mut Vec<RecurringPayment>| {
                    if let Some(existing) = payments.iter_mut().find(|p| {
                        p.user_id == payment.user_id
                            && p.recurring_expense_id == payment.recurring_expense_id
                            && p.reference_date == payment.reference_date
                    }) {
                        existing.description = payment.description;
                        existing.amount = payment.amount;
                        existing.paid_date = payment.paid_date;
                        return Ok(existing.clone());
                    }

                    let stored = RecurringPayment {
                        id: next_id(payments.iter().map(|p| p.id)),
                        user_id: payment.user_id,
                        recurring_expense_id: payment.recurring_expense_id,
                        description: payment.description,
                        amount: payment.amount,
                        reference_date: payment.reference_date,
                        paid_date: payment.paid_date,
                        created_at: Utc::now(),
                    };
                    payments.push(stored.clone());
                    Ok(stored)
                },
            )
            .await
    }

    async fn delete_payment(
        &self,
        user_id: i64,
        recurring_expense_id: i64,
        reference_date: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        self.store
            .modify(
                Table::RecurringPayments,
                move |payments: &mut Vec<RecurringPayment>| {
                    let before = payments.len();
                    payments.retain(|p| {
                        !(p.user_id == user_id
                            && p.recurring_expense_id == recurring_expense_id
                            && p.reference_date == reference_date)
                    });
                    Ok(payments.len() != before)
                },
            )
            .await
    }
}
