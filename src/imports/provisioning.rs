use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::records::{ImportBatch, ProvisionOutcome, UserRecord};
use crate::accounts::repo_types::{NewAccount, RoleId};
use crate::accounts::{AccountDirectory, CreateAccountError};
use crate::auth::password::{random_hex, PasswordHashing};

const PASSWORD_BYTES: usize = 16;
const TOKEN_BYTES: usize = 20;
const REGISTER_PATH: &str = "/admin/auth/register";

/// Creates one inactive account per record and collects an outcome for each.
#[derive(Clone)]
pub struct Provisioner {
    accounts: Arc<dyn AccountDirectory>,
    hasher: Arc<dyn PasswordHashing>,
    public_url: String,
    concurrency: usize,
}

impl Provisioner {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        hasher: Arc<dyn PasswordHashing>,
        public_url: &str,
        concurrency: usize,
    ) -> Self {
        Self {
            accounts,
            hasher,
            public_url: public_url.trim_end_matches('/').to_string(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn invitation_link(&self, registration_token: &str) -> String {
        format!(
            "{}{}?registrationToken={}",
            self.public_url, REGISTER_PATH, registration_token
        )
    }

    /// Returns exactly one outcome per record, in batch order. A failing record
    /// never prevents the others from being attempted.
    pub async fn provision(&self, batch: ImportBatch, role_id: RoleId) -> Vec<ProvisionOutcome> {
        let records = batch.into_records();
        let mut slots: Vec<Option<ProvisionOutcome>> = records.iter().map(|_| None).collect();

        // Later repeats of an email never reach the directory, so concurrent
        // tasks cannot race each other on the same address.
        let mut seen = HashSet::new();
        let limit = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, record) in records.iter().enumerate() {
            if !seen.insert(record.email.as_str()) {
                warn!(email = %record.email, "duplicate email within import file");
                slots[index] = Some(ProvisionOutcome::duplicate(record.clone()));
                continue;
            }

            let this = self.clone();
            let limit = Arc::clone(&limit);
            let record = record.clone();
            tasks.spawn(async move {
                let _permit = limit.acquire_owned().await;
                (index, this.provision_one(record, role_id).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!(error = %e, "provisioning task failed"),
            }
        }

        slots
            .into_iter()
            .zip(records)
            .map(|(slot, record)| {
                slot.unwrap_or_else(|| ProvisionOutcome::failed(record, "provisioning task failed"))
            })
            .collect()
    }

    async fn provision_one(&self, record: UserRecord, role_id: RoleId) -> ProvisionOutcome {
        match self.create_account(&record, role_id).await {
            Ok(link) => {
                info!(email = %record.email, role_id, "admin user provisioned");
                ProvisionOutcome::success(record, link)
            }
            Err(CreateAccountError::AlreadyExists) => {
                warn!(email = %record.email, "admin user already exists");
                ProvisionOutcome::duplicate(record)
            }
            Err(CreateAccountError::Backend(e)) => {
                error!(error = %e, email = %record.email, "failed to create admin user");
                ProvisionOutcome::failed(record, e.to_string())
            }
        }
    }

    async fn create_account(
        &self,
        record: &UserRecord,
        role_id: RoleId,
    ) -> Result<String, CreateAccountError> {
        let password = random_hex(PASSWORD_BYTES).context("generate password")?;
        let hasher = Arc::clone(&self.hasher);
        // The plaintext is dropped inside the blocking task once hashed.
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .context("password hashing task")??;
        let registration_token = random_hex(TOKEN_BYTES).context("generate registration token")?;

        self.accounts
            .create_account(NewAccount {
                email: record.email.clone(),
                firstname: record.firstname.clone(),
                lastname: record.lastname.clone(),
                password_hash,
                is_active: false,
                roles: vec![role_id],
                registration_token: registration_token.clone(),
            })
            .await?;

        Ok(self.invitation_link(&registration_token))
    }
}
