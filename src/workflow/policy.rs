use crate::models::{Expense, Role, User};

/// Whether `actor` may approve or reject `expense`.
pub fn can_decide(actor: &User, expense: &Expense) -> bool {
    actor.role.can_approve()
        && actor.company_id == expense.company_id
        && actor.id != expense.user_id
}

/// Owners see their own expenses; approvers see everything in their company.
pub fn can_view(actor: &User, expense: &Expense) -> bool {
    actor.id == expense.user_id
        || (actor.role.can_approve() && actor.company_id == expense.company_id)
}

pub fn can_manage_team(actor: &User) -> bool {
    actor.role.includes(Role::Admin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExpenseCategory, ExpenseStatus};
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn user(role: Role, company_id: Uuid) -> User {
        User::new("Someone".into(), format!("{}@example.com", Uuid::new_v4()), role, None, company_id)
    }

    fn expense_of(owner: &User) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            user_id: owner.id,
            company_id: owner.company_id,
            amount: Decimal::new(75, 0),
            currency: "USD".into(),
            category: ExpenseCategory::Food,
            description: "Client Lunch".into(),
            date: NaiveDate::from_ymd_opt(2024, 5, 12).unwrap(),
            status: ExpenseStatus::Pending,
            approval_history: vec![],
            vendor_name: None,
            line_items: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn manager_and_admin_in_same_company_can_decide() {
        let company = Uuid::new_v4();
        let expense = expense_of(&user(Role::Employee, company));

        assert!(can_decide(&user(Role::Manager, company), &expense));
        assert!(can_decide(&user(Role::Admin, company), &expense));
    }

    #[test]
    fn employee_never_decides() {
        let company = Uuid::new_v4();
        let expense = expense_of(&user(Role::Employee, company));
        assert!(!can_decide(&user(Role::Employee, company), &expense));
    }

    #[test]
    fn other_company_cannot_decide() {
        let expense = expense_of(&user(Role::Employee, Uuid::new_v4()));
        assert!(!can_decide(&user(Role::Admin, Uuid::new_v4()), &expense));
        assert!(!can_view(&user(Role::Admin, Uuid::new_v4()), &expense));
    }

    #[test]
    fn owner_cannot_decide_own_expense_whatever_the_role() {
        let company = Uuid::new_v4();
        for role in [Role::Employee, Role::Manager, Role::Admin] {
            let owner = user(role, company);
            let expense = expense_of(&owner);
            assert!(!can_decide(&owner, &expense));
            assert!(can_view(&owner, &expense));
        }
    }

    #[test]
    fn employee_cannot_view_colleague_expense() {
        let company = Uuid::new_v4();
        let expense = expense_of(&user(Role::Employee, company));
        assert!(!can_view(&user(Role::Employee, company), &expense));
    }

    #[test]
    fn only_admin_manages_team() {
        let company = Uuid::new_v4();
        assert!(can_manage_team(&user(Role::Admin, company)));
        assert!(!can_manage_team(&user(Role::Manager, company)));
    }
}
