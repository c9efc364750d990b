pub mod dashboard;
pub mod engine;
pub mod policy;

pub use dashboard::{DashboardSummary, MonthlyTotals};
pub use engine::WorkflowEngine;
pub use policy::{can_decide, can_manage_team, can_view};
