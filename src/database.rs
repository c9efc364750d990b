use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Pool, Postgres, QueryBuilder, Row,
};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{ApprovalEntry, Company, Expense, ExpenseFilter, User},
    store::{Store, StoreResult},
};

pub type Database = Pool<Postgres>;

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(50);

pub async fn create_database_pool(database_url: &str, max_connections: u32) -> Result<Database, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await?;

    log::info!("Connected to database successfully!");
    Ok(pool)
}

fn is_transient(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
}

/// Runs `op` again on connection-level failures, doubling the pause each time.
async fn with_retry<T, F, Fut>(label: &str, mut op: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if attempt < MAX_ATTEMPTS && is_transient(&err) => {
                let delay = BASE_BACKOFF * 2u32.pow(attempt - 1);
                log::warn!("{} failed (attempt {}/{}): {}; retrying in {:?}", label, attempt, MAX_ATTEMPTS, err, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn decode_err(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: role.parse().map_err(decode_err)?,
        manager_id: row.try_get("manager_id")?,
        company_id: row.try_get("company_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn entry_from_row(row: &PgRow) -> Result<ApprovalEntry, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(ApprovalEntry {
        approver_id: row.try_get("approver_id")?,
        status: status.parse().map_err(decode_err)?,
        comment: row.try_get("comment")?,
        date: row.try_get("decided_at")?,
    })
}

fn expense_from_row(row: &PgRow, approval_history: Vec<ApprovalEntry>) -> Result<Expense, sqlx::Error> {
    let category: String = row.try_get("category")?;
    let status: String = row.try_get("status")?;
    let line_items: sqlx::types::Json<Vec<String>> = row.try_get("line_items")?;
    Ok(Expense {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        company_id: row.try_get("company_id")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        category: category.parse().map_err(decode_err)?,
        description: row.try_get("description")?,
        date: row.try_get("expense_date")?,
        status: status.parse().map_err(decode_err)?,
        approval_history,
        vendor_name: row.try_get("vendor_name")?,
        line_items: line_items.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn conflict_or(err: sqlx::Error, what: String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what),
        _ => StoreError::Database(err),
    }
}

fn in_use_or(err: sqlx::Error, what: String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::InUse(what),
        _ => StoreError::Database(err),
    }
}

/// PostgreSQL-backed store. Schema lives in `migrations/`.
pub struct PgStore {
    pool: Database,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = with_retry("connect", move || create_database_pool(database_url, max_connections)).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        log::info!("Database migrations completed");
        Ok(Self { pool })
    }

    async fn load_user(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn load_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn load_users(&self, company_id: Uuid) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query("SELECT * FROM users WHERE company_id = $1 ORDER BY name")
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(user_from_row)
            .collect()
    }

    async fn load_company(&self, id: Uuid) -> Result<Option<Company>, sqlx::Error> {
        sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn load_history(&self, expense_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<ApprovalEntry>>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM approval_history WHERE expense_id = ANY($1) ORDER BY expense_id, seq"
        )
        .bind(expense_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut history: HashMap<Uuid, Vec<ApprovalEntry>> = HashMap::new();
        for row in &rows {
            let expense_id: Uuid = row.try_get("expense_id")?;
            history.entry(expense_id).or_default().push(entry_from_row(row)?);
        }
        Ok(history)
    }

    async fn attach_history(&self, rows: Vec<PgRow>) -> Result<Vec<Expense>, sqlx::Error> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut history = self.load_history(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| expense_from_row(row, history.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn load_expense(&self, id: Uuid) -> Result<Option<Expense>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM expenses WHERE id = $1")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(self.attach_history(rows).await?.pop())
    }

    async fn load_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>, sqlx::Error> {
        let mut query_builder = QueryBuilder::<Postgres>::new("SELECT * FROM expenses WHERE TRUE");

        if let Some(company_id) = filter.company_id {
            query_builder.push(" AND company_id = ").push_bind(company_id);
        }
        if let Some(user_id) = filter.user_id {
            query_builder.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(status) = filter.status {
            query_builder.push(" AND status = ").push_bind(status.as_str());
        }
        query_builder.push(" ORDER BY expense_date DESC, created_at DESC");

        let rows = query_builder.build().fetch_all(&self.pool).await?;
        self.attach_history(rows).await
    }

    // Compare-and-set on status; the history row commits with the update.
    async fn apply_decision(&self, expense_id: Uuid, entry: &ApprovalEntry) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE expenses SET status = $1, updated_at = NOW() WHERE id = $2 AND status = 'Pending'"
        )
        .bind(entry.status.as_str())
        .bind(expense_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO approval_history (expense_id, approver_id, status, comment, decided_at) VALUES ($1, $2, $3, $4, $5)"
        )
        .bind(expense_id)
        .bind(entry.approver_id)
        .bind(entry.status.as_str())
        .bind(&entry.comment)
        .bind(entry.date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_company(&self, company: &Company, owner: &User) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO companies (id, name, currency, created_at) VALUES ($1, $2, $3, $4)")
            .bind(company.id)
            .bind(&company.name)
            .bind(&company.currency)
            .bind(company.created_at)
            .execute(&mut *tx)
            .await?;

        insert_user_query(owner)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_or(e, format!("user with email {}", owner.email)))?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_company(&self, id: Uuid) -> StoreResult<Company> {
        with_retry("get_company", move || self.load_company(id))
            .await?
            .ok_or(StoreError::NotFound { entity: "company", id })
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        insert_user_query(user)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or(e, format!("user with email {}", user.email)))?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        with_retry("get_user", move || self.load_user(id))
            .await?
            .ok_or(StoreError::NotFound { entity: "user", id })
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(with_retry("find_user_by_email", move || self.load_user_by_email(email)).await?)
    }

    async fn list_users(&self, company_id: Uuid) -> StoreResult<Vec<User>> {
        Ok(with_retry("list_users", move || self.load_users(company_id)).await?)
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET name = $1, email = $2, role = $3, manager_id = $4 WHERE id = $5"
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.manager_id)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or(e, format!("user with email {}", user.email)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "user", id: user.id });
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let referenced: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM expenses WHERE user_id = $1)
                OR EXISTS (SELECT 1 FROM approval_history WHERE approver_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if referenced {
            tx.rollback().await?;
            return Err(StoreError::InUse(format!("user {}", id)));
        }

        // manager_id is ON DELETE SET NULL, so reports are detached by the delete.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| in_use_or(e, format!("user {}", id)))?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound { entity: "user", id });
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_expense(&self, expense: &Expense) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO expenses (id, user_id, company_id, amount, currency, category, description,
                                  expense_date, status, vendor_name, line_items, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(expense.id)
        .bind(expense.user_id)
        .bind(expense.company_id)
        .bind(expense.amount)
        .bind(&expense.currency)
        .bind(expense.category.as_str())
        .bind(&expense.description)
        .bind(expense.date)
        .bind(expense.status.as_str())
        .bind(&expense.vendor_name)
        .bind(sqlx::types::Json(&expense.line_items))
        .bind(expense.created_at)
        .bind(expense.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_expense(&self, id: Uuid) -> StoreResult<Expense> {
        with_retry("get_expense", move || self.load_expense(id))
            .await?
            .ok_or(StoreError::NotFound { entity: "expense", id })
    }

    async fn list_expenses(&self, filter: &ExpenseFilter) -> StoreResult<Vec<Expense>> {
        Ok(with_retry("list_expenses", move || self.load_expenses(filter)).await?)
    }

    async fn record_decision(&self, expense_id: Uuid, entry: ApprovalEntry) -> StoreResult<Expense> {
        // Not retried: a lost commit acknowledgement would turn into a spurious NotPending.
        let applied = self.apply_decision(expense_id, &entry).await?;

        let expense = self
            .get_expense(expense_id)
            .await?;
        if !applied {
            return Err(StoreError::NotPending { id: expense_id, status: expense.status });
        }
        Ok(expense)
    }

    async fn close(&self) {
        self.pool.close().await;
        log::info!("Database pool closed");
    }
}

fn insert_user_query(user: &User) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        "INSERT INTO users (id, name, email, role, manager_id, company_id, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)"
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(user.role.as_str())
    .bind(user.manager_id)
    .bind(user.company_id)
    .bind(user.created_at)
}
