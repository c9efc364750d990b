use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use super::role::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub manager_id: Option<Uuid>,
    pub company_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signup {
    pub company_name: String,
    pub currency: String,
    pub user_name: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

impl User {
    pub fn new(name: String, email: String, role: Role, manager_id: Option<Uuid>, company_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            role,
            manager_id,
            company_id,
            created_at: Utc::now(),
        }
    }
}

impl Company {
    pub fn new(name: String, currency: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            currency,
            created_at: Utc::now(),
        }
    }
}
