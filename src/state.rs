use crate::accounts::repo::PgDirectory;
use crate::accounts::{AccountDirectory, RoleDirectory};
use crate::auth::password::{Argon2Hasher, PasswordHashing};
use crate::config::AppConfig;
use crate::imports::results::ResultCache;
use crate::imports::Provisioner;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub roles: Arc<dyn RoleDirectory>,
    pub provisioner: Provisioner,
    pub results: Arc<ResultCache>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        // Run migrations if present
        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let directory = Arc::new(PgDirectory::new(db));
        Ok(Self::from_parts(
            config,
            directory.clone(),
            directory,
            Arc::new(Argon2Hasher),
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        accounts: Arc<dyn AccountDirectory>,
        roles: Arc<dyn RoleDirectory>,
        hasher: Arc<dyn PasswordHashing>,
    ) -> Self {
        let provisioner = Provisioner::new(
            accounts,
            hasher,
            &config.public_url,
            config.import.concurrency,
        );
        let ttl = time::Duration::seconds(config.import.result_ttl_secs as i64);
        Self {
            roles,
            provisioner,
            results: Arc::new(ResultCache::new(ttl)),
            config,
        }
    }

    #[cfg(test)]
    pub fn fake(directory: Arc<crate::accounts::memory::MemoryDirectory>) -> Self {
        use crate::accounts::memory::PlainHasher;

        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            directory.clone(),
            directory,
            Arc::new(PlainHasher),
        )
    }
}
