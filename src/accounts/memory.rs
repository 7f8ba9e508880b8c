use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use axum::async_trait;

use super::directory::{AccountDirectory, CreateAccountError, RoleDirectory};
use super::repo_types::{AdminId, NewAccount, Role, RoleId};
use crate::auth::password::PasswordHashing;

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, (AdminId, NewAccount)>,
    grants: HashMap<AdminId, Vec<RoleId>>,
    next_id: AdminId,
}

/// In-process directory for tests.
#[derive(Default)]
pub struct MemoryDirectory {
    tables: Mutex<Tables>,
    roles: Vec<Role>,
    failing: HashSet<String>,
}

impl MemoryDirectory {
    pub fn with_roles(roles: Vec<Role>) -> Self {
        Self { roles, ..Self::default() }
    }

    /// Makes `create_account` fail with a backend error for `email`.
    pub fn failing_for(mut self, email: &str) -> Self {
        self.failing.insert(email.to_string());
        self
    }

    pub fn grant(&self, admin_id: AdminId, role_id: RoleId) {
        let mut tables = self.tables.lock().unwrap();
        tables.grants.entry(admin_id).or_default().push(role_id);
    }

    pub fn account(&self, email: &str) -> Option<NewAccount> {
        let tables = self.tables.lock().unwrap();
        tables.accounts.get(email).map(|(_, a)| a.clone())
    }

    pub fn account_count(&self) -> usize {
        self.tables.lock().unwrap().accounts.len()
    }
}

#[async_trait]
impl AccountDirectory for MemoryDirectory {
    async fn create_account(&self, account: NewAccount) -> Result<AdminId, CreateAccountError> {
        if self.failing.contains(&account.email) {
            return Err(anyhow::anyhow!("database unavailable").into());
        }
        let mut tables = self.tables.lock().unwrap();
        if tables.accounts.contains_key(&account.email) {
            return Err(CreateAccountError::AlreadyExists);
        }
        tables.next_id += 1;
        let id = 1000 + tables.next_id;
        tables.grants.insert(id, account.roles.clone());
        tables.accounts.insert(account.email.clone(), (id, account));
        Ok(id)
    }
}

#[async_trait]
impl RoleDirectory for MemoryDirectory {
    async fn find_role(&self, id: RoleId) -> anyhow::Result<Option<Role>> {
        Ok(self.roles.iter().find(|r| r.id == id).cloned())
    }

    async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        let mut roles = self.roles.clone();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn has_role_code(&self, admin_id: AdminId, code: &str) -> anyhow::Result<bool> {
        let tables = self.tables.lock().unwrap();
        let granted = tables.grants.get(&admin_id).cloned().unwrap_or_default();
        Ok(self
            .roles
            .iter()
            .any(|r| r.code == code && granted.contains(&r.id)))
    }
}

/// Cheap stand-in for Argon2 so tests stay fast.
pub struct PlainHasher;

impl PasswordHashing for PlainHasher {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        Ok(format!("plain${}", plain.len()))
    }
}
