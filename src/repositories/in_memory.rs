//! `Mutex<HashMap>` repositories backing the service unit tests.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
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

#[derive(Default)]
pub struct InMemoryRepositories {
    users: Mutex<HashMap<i64, User>>,
    categories: Mutex<HashMap<i64, Category>>,
    expenses: Mutex<HashMap<i64, Expense>>,
    templates: Mutex<HashMap<i64, RecurringExpense>>,
    payments: Mutex<HashMap<i64, RecurringPayment>>,
    next_id: AtomicI64,
    failing: AtomicBool,
}

impl InMemoryRepositories {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every later call fails with a database error
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::DatabaseError(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }

    pub fn insert_user(&self, username: &str, name: &str) -> User {
        let user = User {
            id: self.next_id(),
            username: username.to_string(),
            name: name.to_string(),
            password_hash: String::new(),
            created_at: Utc::now(),
            updated_at: None,
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        user
    }

    pub fn insert_category(&self, name: &str, color: &str) -> Category {
        let category = Category {
            id: self.next_id(),
            name: name.to_string(),
            color: color.to_string(),
            created_at: Utc::now(),
        };
        self.categories
            .lock()
            .unwrap()
            .insert(category.id, category.clone());
        category
    }

    /// All stored expenses of a user, in insertion order
    pub fn expenses_of(&self, user_id: i64) -> Vec<Expense> {
        let mut expenses: Vec<Expense> = self
            .expenses
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        expenses.sort_by_key(|e| e.id);
        expenses
    }

    pub fn templates_of(&self, user_id: i64) -> Vec<RecurringExpense> {
        let mut templates: Vec<RecurringExpense> = self
            .templates
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        templates.sort_by_key(|t| t.id);
        templates
    }

    pub fn payment_count(&self) -> usize {
        self.payments.lock().unwrap().len()
    }
}

#[async_trait]
impl UserRepository for InMemoryRepositories {
    async fn create(
        &self,
        user: CreateUserRequest,
        password_hash: String,
    ) -> Result<User, RepositoryError> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.username == user.username) {
            return Err(RepositoryError::ConstraintViolation(
                "Username already exists".to_string(),
            ));
        }

        let created = User {
            id: self.next_id(),
            username: user.username,
            name: user.name,
            password_hash,
            created_at: Utc::now(),
            updated_at: None,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        self.check()?;
        let users = self.users.lock().unwrap();
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        self.check()?;
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        self.check()?;
        let mut users: Vec<User> = self.users.lock().unwrap().values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, RepositoryError> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        if let Some(username) = &changes.username {
            if users.values().any(|u| &u.username == username && u.id != id) {
                return Err(RepositoryError::ConstraintViolation(
                    "Username already exists".to_string(),
                ));
            }
        }

        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
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
        Ok(user.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        self.check()?;
        self.users
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn count_owned_expenses(&self, id: i64) -> Result<i64, RepositoryError> {
        self.check()?;
        let expenses = self.expenses.lock().unwrap();
        let templates = self.templates.lock().unwrap();
        let count = expenses.values().filter(|e| e.user_id == id).count()
            + templates.values().filter(|t| t.user_id == id).count();
        Ok(count as i64)
    }
}

#[async_trait]
impl CategoryRepository for InMemoryRepositories {
    async fn create(&self, category: NewCategory) -> Result<Category, RepositoryError> {
        self.check()?;
        let mut categories = self.categories.lock().unwrap();
        if categories.values().any(|c| c.name == category.name) {
            return Err(RepositoryError::ConstraintViolation(
                "Category with this name already exists".to_string(),
            ));
        }

        let created = Category {
            id: self.next_id(),
            name: category.name,
            color: category.color,
            created_at: Utc::now(),
        };
        categories.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Category>, RepositoryError> {
        self.check()?;
        Ok(self.categories.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
        self.check()?;
        let categories = self.categories.lock().unwrap();
        Ok(categories.values().find(|c| c.name == name).cloned())
    }

    async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        self.check()?;
        let mut categories: Vec<Category> =
            self.categories.lock().unwrap().values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn update(
        &self,
        id: i64,
        name: Option<String>,
        color: Option<String>,
    ) -> Result<Category, RepositoryError> {
        self.check()?;
        let mut categories = self.categories.lock().unwrap();
        if let Some(name) = &name {
            if categories.values().any(|c| &c.name == name && c.id != id) {
                return Err(RepositoryError::ConstraintViolation(
                    "Category with this name already exists".to_string(),
                ));
            }
        }

        let category = categories.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if let Some(name) = name {
            category.name = name;
        }
        if let Some(color) = color {
            category.color = color;
        }
        Ok(category.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        self.check()?;
        self.categories
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn count_references(&self, id: i64) -> Result<i64, RepositoryError> {
        self.check()?;
        let expenses = self.expenses.lock().unwrap();
        let templates = self.templates.lock().unwrap();
        let count = expenses.values().filter(|e| e.category_id == id).count()
            + templates.values().filter(|t| t.category_id == id).count();
        Ok(count as i64)
    }
}

#[async_trait]
impl ExpenseRepository for InMemoryRepositories {
    async fn create_many(&self, new_expenses: Vec<NewExpense>) -> Result<Vec<Expense>, RepositoryError> {
        self.check()?;
        let mut expenses = self.expenses.lock().unwrap();
        let created: Vec<Expense> = new_expenses
            .into_iter()
            .map(|expense| Expense {
                id: self.next_id(),
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
                created_at: Utc::now(),
            })
            .collect();

        for expense in &created {
            expenses.insert(expense.id, expense.clone());
        }
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Expense>, RepositoryError> {
        self.check()?;
        Ok(self.expenses.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_user_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Expense>, RepositoryError> {
        self.check()?;
        let mut found: Vec<Expense> = self
            .expenses
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.user_id == user_id && e.due_date >= from && e.due_date <= to)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn update(&self, expense: Expense) -> Result<Expense, RepositoryError> {
        self.check()?;
        let mut expenses = self.expenses.lock().unwrap();
        let stored = expenses
            .get_mut(&expense.id)
            .ok_or(RepositoryError::NotFound)?;
        stored.category_id = expense.category_id;
        stored.description = expense.description;
        stored.amount = expense.amount;
        stored.due_date = expense.due_date;
        Ok(stored.clone())
    }

    async fn set_paid(
        &self,
        id: i64,
        paid: bool,
        paid_date: Option<NaiveDate>,
    ) -> Result<Expense, RepositoryError> {
        self.check()?;
        let mut expenses = self.expenses.lock().unwrap();
        let stored = expenses.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        stored.paid = paid;
        stored.paid_date = paid_date;
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        self.check()?;
        self.expenses
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_group(&self, user_id: i64, group: Uuid) -> Result<u64, RepositoryError> {
        self.check()?;
        let mut expenses = self.expenses.lock().unwrap();
        let before = expenses.len();
        expenses.retain(|_, e| !(e.installment_group == Some(group) && e.user_id == user_id));
        Ok((before - expenses.len()) as u64)
    }
}

#[async_trait]
impl RecurringExpenseRepository for InMemoryRepositories {
    async fn create_many(
        &self,
        new_templates: Vec<NewRecurringExpense>,
    ) -> Result<Vec<RecurringExpense>, RepositoryError> {
        self.check()?;
        let mut templates = self.templates.lock().unwrap();
        let created: Vec<RecurringExpense> = new_templates
            .into_iter()
            .map(|template| RecurringExpense {
                id: self.next_id(),
                user_id: template.user_id,
                category_id: template.category_id,
                description: template.description,
                amount: template.amount,
                day_of_month: template.day_of_month,
                active: template.active,
                shared_with_user_id: template.shared_with_user_id,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .collect();

        for template in &created {
            templates.insert(template.id, template.clone());
        }
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<RecurringExpense>, RepositoryError> {
        self.check()?;
        Ok(self.templates.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Vec<RecurringExpense>, RepositoryError> {
        self.check()?;
        let mut found: Vec<RecurringExpense> = self
            .templates
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.day_of_month.cmp(&b.day_of_month).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn update(&self, template: RecurringExpense) -> Result<RecurringExpense, RepositoryError> {
        self.check()?;
        let mut templates = self.templates.lock().unwrap();
        let stored = templates
            .get_mut(&template.id)
            .ok_or(RepositoryError::NotFound)?;
        stored.category_id = template.category_id;
        stored.description = template.description;
        stored.amount = template.amount;
        stored.day_of_month = template.day_of_month;
        stored.active = template.active;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        self.check()?;
        self.templates
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(RepositoryError::NotFound)?;
        self.payments
            .lock()
            .unwrap()
            .retain(|_, p| p.recurring_expense_id != id);
        Ok(())
    }

    async fn find_payments_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RecurringPayment>, RepositoryError> {
        self.check()?;
        Ok(self
            .payments
            .lock()
            .unwrap()
            .values()
            .filter(|p| {
                p.user_id == user_id && p.reference_date >= from && p.reference_date <= to
            })
            .cloned()
            .collect())
    }

    async fn upsert_payment(
        &self,
        payment: NewRecurringPayment,
    ) -> Result<RecurringPayment, RepositoryError> {
        self.check()?;
        let mut payments = self.payments.lock().unwrap();
        if let Some(existing) = payments.values_mut().find(|p| {
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
            id: self.next_id(),
            user_id: payment.user_id,
            recurring_expense_id: payment.recurring_expense_id,
            description: payment.description,
            amount: payment.amount,
            reference_date: payment.reference_date,
            paid_date: payment.paid_date,
            created_at: Utc::now(),
        };
        payments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete_payment(
        &self,
        user_id: i64,
        recurring_expense_id: i64,
        reference_date: NaiveDate,
    ) -> Result<bool, RepositoryError> {
        self.check()?;
        let mut payments = self.payments.lock().unwrap();
        let before = payments.len();
        payments.retain(|_, p| {
            !(p.user_id == user_id
                && p.recurring_expense_id == recurring_expense_id
                && p.reference_date == reference_date)
        });
        Ok(payments.len() != before)
    }
}
