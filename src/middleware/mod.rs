pub mod permission;

pub use permission::{CurrentUser, AUTH_COOKIE};
