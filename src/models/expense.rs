use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseCategory {
    Travel,
    Food,
    #[serde(rename = "Office Supplies")]
    OfficeSupplies,
    Software,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Travel => "Travel",
            ExpenseCategory::Food => "Food",
            ExpenseCategory::OfficeSupplies => "Office Supplies",
            ExpenseCategory::Software => "Software",
            ExpenseCategory::Other => "Other",
        }
    }
}

impl FromStr for ExpenseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Travel" => Ok(ExpenseCategory::Travel),
            "Food" => Ok(ExpenseCategory::Food),
            "Office Supplies" => Ok(ExpenseCategory::OfficeSupplies),
            "Software" => Ok(ExpenseCategory::Software),
            "Other" => Ok(ExpenseCategory::Other),
            other => Err(format!("unknown expense category '{}'", other)),
        }
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "Pending",
            ExpenseStatus::Approved => "Approved",
            ExpenseStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExpenseStatus::Pending)
    }
}

impl FromStr for ExpenseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ExpenseStatus::Pending),
            "Approved" => Ok(ExpenseStatus::Approved),
            "Rejected" => Ok(ExpenseStatus::Rejected),
            other => Err(format!("unknown expense status '{}'", other)),
        }
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome an approver may choose. Only maps onto the terminal statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for ExpenseStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => ExpenseStatus::Approved,
            Decision::Rejected => ExpenseStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalEntry {
    pub approver_id: Uuid,
    pub status: ExpenseStatus,
    pub comment: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub category: ExpenseCategory,
    pub description: String,
    pub date: NaiveDate,
    pub status: ExpenseStatus,
    pub approval_history: Vec<ApprovalEntry>,
    pub vendor_name: Option<String>,
    pub line_items: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Submitted expense before validation. Vendor and line items are the
/// receipt-derived fields the client may pre-fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub amount: Decimal,
    pub currency: String,
    pub category: ExpenseCategory,
    pub description: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub line_items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseFilter {
    pub company_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: Option<ExpenseStatus>,
}

impl ExpenseFilter {
    pub fn matches(&self, expense: &Expense) -> bool {
        self.company_id.map_or(true, |id| expense.company_id == id)
            && self.user_id.map_or(true, |id| expense.user_id == id)
            && self.status.map_or(true, |status| expense.status == status)
    }
}
