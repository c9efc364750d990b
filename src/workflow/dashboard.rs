use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use super::policy::can_decide;
use crate::models::{Expense, ExpenseStatus, User};

/// Number of calendar months covered by the spend chart.
pub const CHART_MONTHS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotals {
    pub year: i32,
    pub month: String,
    pub approved: Decimal,
    pub rejected: Decimal,
}

/// Counts cover every visible expense. Money totals only add up expenses
/// filed in `currency`, the company's currency; there is no conversion.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_pending: usize,
    pub total_approved: usize,
    pub total_rejected: usize,
    pub currency: String,
    pub total_spent: Decimal,
    pub pending_for_approval: Vec<Expense>,
    pub monthly: Vec<MonthlyTotals>,
}

pub fn summarize(actor: &User, expenses: Vec<Expense>, today: NaiveDate, currency: &str) -> DashboardSummary {
    let count = |status: ExpenseStatus| expenses.iter().filter(|e| e.status == status).count();

    let total_spent = expenses
        .iter()
        .filter(|e| e.status == ExpenseStatus::Approved && e.currency == currency)
        .map(|e| e.amount)
        .sum();

    DashboardSummary {
        total_pending: count(ExpenseStatus::Pending),
        total_approved: count(ExpenseStatus::Approved),
        total_rejected: count(ExpenseStatus::Rejected),
        currency: currency.to_string(),
        total_spent,
        monthly: monthly_totals(&expenses, today, CHART_MONTHS, currency),
        pending_for_approval: expenses
            .into_iter()
            .filter(|e| e.status == ExpenseStatus::Pending && can_decide(actor, e))
            .collect(),
    }
}

/// Approved and rejected sums in `currency` for the `months` calendar months
/// ending with `today`'s month, oldest first. Months without expenses are zero.
pub fn monthly_totals(expenses: &[Expense], today: NaiveDate, months: u32, currency: &str) -> Vec<MonthlyTotals> {
    let mut sums: HashMap<(i32, u32), (Decimal, Decimal)> = HashMap::new();
    for expense in expenses.iter().filter(|e| e.currency == currency) {
        let key = (expense.date.year(), expense.date.month());
        let slot = sums.entry(key).or_insert((Decimal::ZERO, Decimal::ZERO));
        match expense.status {
            ExpenseStatus::Approved => slot.0 += expense.amount,
            ExpenseStatus::Rejected => slot.1 += expense.amount,
            ExpenseStatus::Pending => {}
        }
    }

    (0..months)
        .rev()
        .map(|back| {
            let (year, month) = months_before(today.year(), today.month(), back);
            let (approved, rejected) = sums
                .get(&(year, month))
                .copied()
                .unwrap_or((Decimal::ZERO, Decimal::ZERO));
            MonthlyTotals {
                year,
                month: month_label(year, month),
                approved,
                rejected,
            }
        })
        .collect()
}

fn months_before(year: i32, month: u32, back: u32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) - back as i32;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

fn month_label(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%b").to_string())
        .unwrap_or_default()
}
