pub mod memory;
pub mod seed;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{ApprovalEntry, Company, Expense, ExpenseFilter, User},
};

pub use memory::MemoryStore;
pub use seed::seed_demo_data;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence collaborator for companies, users and expenses.
///
/// Opened once at process start and shared behind an `Arc`; `close` is called
/// after the server has stopped accepting requests.
#[async_trait]
pub trait Store: Send + Sync {
    /// Creates a company together with its first user.
    async fn insert_company(&self, company: &Company, owner: &User) -> StoreResult<()>;

    async fn get_company(&self, id: Uuid) -> StoreResult<Company>;

    /// Fails with `StoreError::Conflict` when the email is already taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn get_user(&self, id: Uuid) -> StoreResult<User>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Users of one company ordered by name.
    async fn list_users(&self, company_id: Uuid) -> StoreResult<Vec<User>>;

    /// Replaces name, email, role and manager of an existing user. Fails with
    /// `StoreError::Conflict` when the email belongs to someone else.
    async fn update_user(&self, user: &User) -> StoreResult<()>;

    /// Removes a user and detaches their direct reports. Fails with
    /// `StoreError::InUse` while the user owns expenses or appears as an
    /// approver in any history.
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    async fn insert_expense(&self, expense: &Expense) -> StoreResult<()>;

    async fn get_expense(&self, id: Uuid) -> StoreResult<Expense>;

    /// Matching expenses, newest incurred date first.
    async fn list_expenses(&self, filter: &ExpenseFilter) -> StoreResult<Vec<Expense>>;

    /// Moves a Pending expense to `entry.status` and appends `entry` to its
    /// history as one atomic step. Fails with `StoreError::NotPending` if the
    /// expense left Pending before the write landed.
    async fn record_decision(&self, expense_id: Uuid, entry: ApprovalEntry) -> StoreResult<Expense>;

    async fn close(&self);
}
