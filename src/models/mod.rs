pub mod user;
pub mod role;
pub mod expense;

pub use user::{User, Company, CreateUser, Signup, LoginRequest};
pub use role::Role;
pub use expense::{
    Expense, ExpenseDraft, ExpenseFilter,
    ExpenseCategory, ExpenseStatus,
    ApprovalEntry, Decision
};
