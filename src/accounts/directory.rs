use axum::async_trait;

use super::repo_types::{AdminId, NewAccount, Role, RoleId};

#[derive(Debug, thiserror::Error)]
pub enum CreateAccountError {
    #[error("Admin user already exists")]
    AlreadyExists,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Creates admin accounts. Implementations must make the email uniqueness
/// check and the insert a single atomic step.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn create_account(&self, account: NewAccount) -> Result<AdminId, CreateAccountError>;
}

#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn find_role(&self, id: RoleId) -> anyhow::Result<Option<Role>>;
    /// All roles, ordered by name.
    async fn list_roles(&self) -> anyhow::Result<Vec<Role>>;
    async fn has_role_code(&self, admin_id: AdminId, code: &str) -> anyhow::Result<bool>;
}
