use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{Store, StoreResult};
use crate::models::{ApprovalEntry, Company, Expense, ExpenseCategory, ExpenseStatus, Role, User};

/// Populates an empty store with a demo company: an admin, a manager and an
/// employee, plus four expenses in every lifecycle state.
pub async fn seed_demo_data(store: &dyn Store) -> StoreResult<Company> {
    let company = Company::new("Innovate Inc".to_string(), "USD".to_string());
    let alicia = User::new("Alicia Rodriguez".into(), "alicia@innovate.com".into(), Role::Admin, None, company.id);
    let ben = User::new("Ben Carter".into(), "ben@innovate.com".into(), Role::Manager, Some(alicia.id), company.id);
    let carlos = User::new("Carlos Diaz".into(), "carlos@innovate.com".into(), Role::Employee, Some(ben.id), company.id);

    store.insert_company(&company, &alicia).await?;
    store.insert_user(&ben).await?;
    store.insert_user(&carlos).await?;

    let seeds = [
        (&carlos, 150, ExpenseCategory::Travel, "Flight to SFO", (2024, 5, 10), Some((&ben, ExpenseStatus::Approved))),
        (&carlos, 75, ExpenseCategory::Food, "Client Lunch", (2024, 5, 12), None),
        (&ben, 300, ExpenseCategory::Software, "Figma Subscription", (2024, 5, 1), Some((&alicia, ExpenseStatus::Approved))),
        (&alicia, 25, ExpenseCategory::Other, "Office Coffee", (2024, 5, 15), Some((&ben, ExpenseStatus::Rejected))),
    ];

    for (owner, amount, category, description, (y, m, d), decision) in seeds {
        let now = Utc::now();
        let expense = Expense {
            id: Uuid::new_v4(),
            user_id: owner.id,
            company_id: company.id,
            amount: Decimal::new(amount, 0),
            currency: "USD".to_string(),
            category,
            description: description.to_string(),
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            status: ExpenseStatus::Pending,
            approval_history: Vec::new(),
            vendor_name: None,
            line_items: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        store.insert_expense(&expense).await?;

        if let Some((approver, status)) = decision {
            let entry = ApprovalEntry { approver_id: approver.id, status, comment: None, date: now };
            store.record_decision(expense.id, entry).await?;
        }
    }

    log::info!("Seeded demo company {} ({})", company.name, company.id);
    Ok(company)
}
