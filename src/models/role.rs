use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Approval authority of a user. Ordered so that `Admin > Manager > Employee`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Employee,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "Employee",
            Role::Manager => "Manager",
            Role::Admin => "Admin",
        }
    }

    /// True when this role carries every capability of `other`.
    pub fn includes(&self, other: Role) -> bool {
        *self >= other
    }

    pub fn can_approve(&self) -> bool {
        self.includes(Role::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Employee" => Ok(Role::Employee),
            "Manager" => Ok(Role::Manager),
            "Admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
