use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use super::dashboard::{summarize, DashboardSummary};
use super::policy::{can_decide, can_manage_team, can_view};
use crate::{
    error::{StoreError, WorkflowError, WorkflowResult},
    models::{
        ApprovalEntry, Company, CreateUser, Decision, Expense, ExpenseDraft, ExpenseFilter,
        ExpenseStatus, Role, Signup, User,
    },
    store::Store,
};

/// Amounts are stored as NUMERIC(14, 2): at most two decimal places and
/// twelve integer digits.
const AMOUNT_SCALE: u32 = 2;
const AMOUNT_LIMIT: i64 = 1_000_000_000_000;

/// Owns the expense lifecycle: submission, the single Pending -> terminal
/// decision, and who is allowed to see or make it.
pub struct WorkflowEngine {
    store: Arc<dyn Store>,
    allow_future_dates: bool,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn Store>, allow_future_dates: bool) -> Self {
        Self { store, allow_future_dates }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn submit(&self, draft: ExpenseDraft, submitter_id: Uuid) -> WorkflowResult<Expense> {
        let submitter = self.store.get_user(submitter_id).await?;
        let now = Utc::now();

        if draft.amount <= Decimal::ZERO {
            return Err(WorkflowError::Validation("amount must be greater than 0".into()));
        }
        let amount = draft.amount.normalize();
        if amount.scale() > AMOUNT_SCALE {
            return Err(WorkflowError::Validation(format!(
                "amount {} has more than {} decimal places",
                draft.amount, AMOUNT_SCALE
            )));
        }
        if amount >= Decimal::new(AMOUNT_LIMIT, 0) {
            return Err(WorkflowError::Validation(format!("amount {} is too large", draft.amount)));
        }
        let currency = normalize_currency(&draft.currency)?;
        let description = draft.description.trim();
        if description.is_empty() {
            return Err(WorkflowError::Validation("description must not be empty".into()));
        }
        if !self.allow_future_dates && draft.date > now.date_naive() {
            return Err(WorkflowError::Validation(format!(
                "expense date {} is in the future",
                draft.date
            )));
        }

        let expense = Expense {
            id: Uuid::new_v4(),
            user_id: submitter.id,
            company_id: submitter.company_id,
            amount,
            currency,
            category: draft.category,
            description: description.to_string(),
            date: draft.date,
            status: ExpenseStatus::Pending,
            approval_history: Vec::new(),
            vendor_name: draft.vendor_name.filter(|v| !v.trim().is_empty()),
            line_items: draft.line_items,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_expense(&expense).await?;
        log::info!(
            "Expense {} submitted by {} ({} {})",
            expense.id, submitter.id, expense.amount, expense.currency
        );
        Ok(expense)
    }

    pub async fn decide(
        &self,
        expense_id: Uuid,
        actor_id: Uuid,
        decision: Decision,
        comment: Option<String>,
    ) -> WorkflowResult<Expense> {
        let expense = self.store.get_expense(expense_id).await?;
        if expense.status.is_terminal() {
            return Err(WorkflowError::InvalidState { id: expense.id, status: expense.status });
        }

        let actor = self.actor(actor_id).await?;
        if !can_decide(&actor, &expense) {
            log::warn!("User {} denied decision on expense {}", actor.id, expense.id);
            return Err(WorkflowError::Forbidden(format!(
                "user {} may not decide expense {}",
                actor.id, expense.id
            )));
        }

        let entry = ApprovalEntry {
            approver_id: actor.id,
            status: decision.into(),
            comment: comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            date: Utc::now(),
        };

        let updated = self.store.record_decision(expense.id, entry).await?;
        log::info!("Expense {} {} by {}", updated.id, updated.status, actor.id);
        Ok(updated)
    }

    pub async fn get(&self, expense_id: Uuid, actor_id: Uuid) -> WorkflowResult<Expense> {
        let expense = self.store.get_expense(expense_id).await?;
        let actor = self.actor(actor_id).await?;
        if !can_view(&actor, &expense) {
            return Err(WorkflowError::Forbidden(format!("expense {} is not visible", expense_id)));
        }
        Ok(expense)
    }

    /// Expenses of the actor's company. Employees only ever get their own.
    pub async fn list(
        &self,
        actor_id: Uuid,
        status: Option<ExpenseStatus>,
        user_id: Option<Uuid>,
    ) -> WorkflowResult<Vec<Expense>> {
        let actor = self.actor(actor_id).await?;
        let filter = ExpenseFilter {
            company_id: Some(actor.company_id),
            user_id: if actor.role.can_approve() { user_id } else { Some(actor.id) },
            status,
        };
        Ok(self.store.list_expenses(&filter).await?)
    }

    pub async fn dashboard(&self, actor_id: Uuid, today: NaiveDate) -> WorkflowResult<DashboardSummary> {
        let actor = self.actor(actor_id).await?;
        let company = self.store.get_company(actor.company_id).await?;
        let expenses = self.list(actor_id, None, None).await?;
        Ok(summarize(&actor, expenses, today, &company.currency))
    }

    /// Creates a company and its first user, who becomes its Admin.
    pub async fn signup(&self, signup: Signup) -> WorkflowResult<(Company, User)> {
        let company_name = signup.company_name.trim();
        if company_name.is_empty() {
            return Err(WorkflowError::Validation("company name must not be empty".into()));
        }
        let currency = normalize_currency(&signup.currency)?;
        let (name, email) = validate_identity(&signup.user_name, &signup.email)?;

        let company = Company::new(company_name.to_string(), currency);
        let owner = User::new(name, email, Role::Admin, None, company.id);
        self.store.insert_company(&company, &owner).await?;

        log::info!("Company {} created with admin {}", company.id, owner.id);
        Ok((company, owner))
    }

    pub async fn create_user(&self, actor_id: Uuid, new_user: CreateUser) -> WorkflowResult<User> {
        let actor = self.actor(actor_id).await?;
        if !can_manage_team(&actor) {
            return Err(WorkflowError::Forbidden("only admins can add team members".into()));
        }

        let (name, email) = validate_identity(&new_user.name, &new_user.email)?;
        if let Some(manager_id) = new_user.manager_id {
            self.check_manager(&actor, manager_id).await?;
        }

        let user = User::new(name, email, new_user.role, new_user.manager_id, actor.company_id);
        self.store.insert_user(&user).await?;

        log::info!("User {} added to company {} as {}", user.id, user.company_id, user.role);
        Ok(user)
    }

    /// Replaces a team member's name, email, role and manager.
    pub async fn update_user(&self, actor_id: Uuid, user_id: Uuid, changes: CreateUser) -> WorkflowResult<User> {
        let actor = self.actor(actor_id).await?;
        if !can_manage_team(&actor) {
            return Err(WorkflowError::Forbidden("only admins can edit team members".into()));
        }
        if user_id == actor.id {
            return Err(WorkflowError::Validation("admins cannot edit their own account".into()));
        }
        let existing = self.team_member(&actor, user_id).await?;

        let (name, email) = validate_identity(&changes.name, &changes.email)?;
        if let Some(manager_id) = changes.manager_id {
            if manager_id == existing.id {
                return Err(WorkflowError::Validation("a user cannot be their own manager".into()));
            }
            self.check_manager(&actor, manager_id).await?;
        }

        let user = User {
            name,
            email,
            role: changes.role,
            manager_id: changes.manager_id,
            ..existing
        };
        self.store.update_user(&user).await?;

        log::info!("User {} updated by {} (role {})", user.id, actor.id, user.role);
        Ok(user)
    }

    /// Removes a team member who has no expenses and never decided one.
    pub async fn delete_user(&self, actor_id: Uuid, user_id: Uuid) -> WorkflowResult<()> {
        let actor = self.actor(actor_id).await?;
        if !can_manage_team(&actor) {
            return Err(WorkflowError::Forbidden("only admins can remove team members".into()));
        }
        if user_id == actor.id {
            return Err(WorkflowError::Validation("admins cannot remove themselves".into()));
        }
        let user = self.team_member(&actor, user_id).await?;

        self.store.delete_user(user.id).await?;
        log::info!("User {} removed from company {} by {}", user.id, user.company_id, actor.id);
        Ok(())
    }

    pub async fn team(&self, actor_id: Uuid) -> WorkflowResult<Vec<User>> {
        let actor = self.actor(actor_id).await?;
        Ok(self.store.list_users(actor.company_id).await?)
    }

    pub async fn user(&self, user_id: Uuid) -> WorkflowResult<User> {
        Ok(self.store.get_user(user_id).await?)
    }

    pub async fn company(&self, company_id: Uuid) -> WorkflowResult<Company> {
        Ok(self.store.get_company(company_id).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> WorkflowResult<Option<User>> {
        Ok(self.store.find_user_by_email(email.trim()).await?)
    }

    // Users of other companies are reported as missing.
    async fn team_member(&self, actor: &User, user_id: Uuid) -> WorkflowResult<User> {
        match self.store.get_user(user_id).await {
            Ok(user) if user.company_id == actor.company_id => Ok(user),
            Ok(_) | Err(StoreError::NotFound { .. }) => Err(WorkflowError::NotFound(format!("user {}", user_id))),
            Err(err) => Err(err.into()),
        }
    }

    async fn check_manager(&self, actor: &User, manager_id: Uuid) -> WorkflowResult<()> {
        let manager = match self.store.get_user(manager_id).await {
            Ok(manager) => manager,
            Err(StoreError::NotFound { .. }) => {
                return Err(WorkflowError::Validation(format!("manager {} does not exist", manager_id)))
            }
            Err(err) => return Err(err.into()),
        };
        if manager.company_id != actor.company_id {
            return Err(WorkflowError::Validation(format!(
                "manager {} belongs to another company",
                manager_id
            )));
        }
        Ok(())
    }

    // An acting user that no longer exists is an authorization failure.
    async fn actor(&self, actor_id: Uuid) -> WorkflowResult<User> {
        match self.store.get_user(actor_id).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound { .. }) => {
                Err(WorkflowError::Forbidden(format!("unknown user {}", actor_id)))
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn normalize_currency(code: &str) -> WorkflowResult<String> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(WorkflowError::Validation(format!("'{}' is not a currency code", code)));
    }
    Ok(code.to_ascii_uppercase())
}

fn validate_identity(name: &str, email: &str) -> WorkflowResult<(String, String)> {
    let name = name.trim();
    let email = email.trim();
    if name.is_empty() {
        return Err(WorkflowError::Validation("name must not be empty".into()));
    }
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(WorkflowError::Validation(format!("'{}' is not an email address", email)));
    }
    Ok((name.to_string(), email.to_lowercase()))
}
