use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;

use super::directory::{AccountDirectory, CreateAccountError, RoleDirectory};
use super::repo_types::{AdminId, NewAccount, Role, RoleId};

/// Postgres-backed account and role directory.
#[derive(Clone)]
pub struct PgDirectory {
    db: PgPool,
}

impl PgDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountDirectory for PgDirectory {
    async fn create_account(&self, account: NewAccount) -> Result<AdminId, CreateAccountError> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        // The unique index on email decides races between concurrent imports.
        let id: Option<AdminId> = sqlx::query_scalar(
            r#"
            INSERT INTO admin_users
                (email, firstname, lastname, password_hash, is_active, registration_token)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&account.email)
        .bind(&account.firstname)
        .bind(&account.lastname)
        .bind(&account.password_hash)
        .bind(account.is_active)
        .bind(&account.registration_token)
        .fetch_optional(&mut *tx)
        .await
        .context("insert admin user")?;

        let Some(id) = id else {
            return Err(CreateAccountError::AlreadyExists);
        };

        for role_id in &account.roles {
            sqlx::query(r#"INSERT INTO admin_users_roles (user_id, role_id) VALUES ($1, $2)"#)
                .bind(id)
                .bind(role_id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("link role {}", role_id))?;
        }

        tx.commit().await.context("commit tx")?;
        Ok(id)
    }
}

#[async_trait]
impl RoleDirectory for PgDirectory {
    async fn find_role(&self, id: RoleId) -> anyhow::Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name, code
              FROM admin_roles
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find role")?;
        Ok(role)
    }

    async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name, code
              FROM admin_roles
             ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list roles")?;
        Ok(roles)
    }

    async fn has_role_code(&self, admin_id: AdminId, code: &str) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                  FROM admin_users_roles ur
                  JOIN admin_roles r ON r.id = ur.role_id
                 WHERE ur.user_id = $1 AND r.code = $2
            )
            "#,
        )
        .bind(admin_id)
        .bind(code)
        .fetch_one(&self.db)
        .await
        .context("check admin role")?;
        Ok(found)
    }
}
