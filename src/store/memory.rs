use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreResult};
use crate::{
    error::StoreError,
    models::{ApprovalEntry, Company, Expense, ExpenseFilter, ExpenseStatus, User},
};

#[derive(Default)]
struct Inner {
    companies: HashMap<Uuid, Company>,
    users: HashMap<Uuid, User>,
    expenses: HashMap<Uuid, Expense>,
    // (company_id, status) -> expense ids
    by_company_status: HashMap<(Uuid, ExpenseStatus), BTreeSet<Uuid>>,
}

impl Inner {
    fn email_taken(&self, email: &str) -> bool {
        self.email_taken_by_other(email, None)
    }

    fn email_taken_by_other(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }

    fn referenced(&self, user_id: Uuid) -> bool {
        self.expenses.values().any(|e| {
            e.user_id == user_id || e.approval_history.iter().any(|h| h.approver_id == user_id)
        })
    }

    fn index(&mut self, expense: &Expense) {
        self.by_company_status
            .entry((expense.company_id, expense.status))
            .or_default()
            .insert(expense.id);
    }

    fn unindex(&mut self, expense: &Expense) {
        if let Some(ids) = self.by_company_status.get_mut(&(expense.company_id, expense.status)) {
            ids.remove(&expense.id);
        }
    }
}

/// Store kept entirely in process memory. Used for tests and local demos.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_company(&self, company: &Company, owner: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.email_taken(&owner.email) {
            return Err(StoreError::Conflict(format!("user with email {}", owner.email)));
        }
        inner.companies.insert(company.id, company.clone());
        inner.users.insert(owner.id, owner.clone());
        Ok(())
    }

    async fn get_company(&self, id: Uuid) -> StoreResult<Company> {
        self.inner
            .read()
            .await
            .companies
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "company", id })
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.email_taken(&user.email) {
            return Err(StoreError::Conflict(format!("user with email {}", user.email)));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        self.inner
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "user", id })
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self, company_id: Uuid) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self
            .inner
            .read()
            .await
            .users
            .values()
            .filter(|u| u.company_id == company_id)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user.id) {
            return Err(StoreError::NotFound { entity: "user", id: user.id });
        }
        if inner.email_taken_by_other(&user.email, Some(user.id)) {
            return Err(StoreError::Conflict(format!("user with email {}", user.email)));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&id) {
            return Err(StoreError::NotFound { entity: "user", id });
        }
        if inner.referenced(id) {
            return Err(StoreError::InUse(format!("user {}", id)));
        }
        inner.users.remove(&id);
        for report in inner.users.values_mut().filter(|u| u.manager_id == Some(id)) {
            report.manager_id = None;
        }
        Ok(())
    }

    async fn insert_expense(&self, expense: &Expense) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.index(expense);
        inner.expenses.insert(expense.id, expense.clone());
        Ok(())
    }

    async fn get_expense(&self, id: Uuid) -> StoreResult<Expense> {
        self.inner
            .read()
            .await
            .expenses
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "expense", id })
    }

    async fn list_expenses(&self, filter: &ExpenseFilter) -> StoreResult<Vec<Expense>> {
        let inner = self.inner.read().await;

        let mut expenses: Vec<Expense> = match (filter.company_id, filter.status) {
            (Some(company_id), Some(status)) => inner
                .by_company_status
                .get(&(company_id, status))
                .map(|ids| ids.iter().filter_map(|id| inner.expenses.get(id)).cloned().collect())
                .unwrap_or_default(),
            _ => inner.expenses.values().cloned().collect(),
        };
        drop(inner);

        expenses.retain(|e| filter.matches(e));
        expenses.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(expenses)
    }

    async fn record_decision(&self, expense_id: Uuid, entry: ApprovalEntry) -> StoreResult<Expense> {
        let mut inner = self.inner.write().await;

        let current = inner
            .expenses
            .get(&expense_id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "expense", id: expense_id })?;

        if current.status != ExpenseStatus::Pending {
            return Err(StoreError::NotPending { id: expense_id, status: current.status });
        }

        let mut updated = current.clone();
        updated.status = entry.status;
        updated.updated_at = Utc::now();
        updated.approval_history.push(entry);

        inner.unindex(&current);
        inner.index(&updated);
        inner.expenses.insert(expense_id, updated.clone());

        Ok(updated)
    }

    async fn close(&self) {
        log::info!("In-memory store closed");
    }
}
