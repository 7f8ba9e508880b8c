use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type AdminId = i64;
pub type RoleId = i64;

/// Admin role as stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub code: String,
}

/// Inactive admin account created on behalf of one import row.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub password_hash: String, // never the plaintext
    pub is_active: bool,
    pub roles: Vec<RoleId>,
    pub registration_token: String,
}
