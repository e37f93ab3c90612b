//! Shared application state handed to every handler.

use std::sync::Arc;

use anyhow::Context as _;

use tasklane_auth::{Hs256JwtValidator, PasswordHasher};
use tasklane_infra::Database;

use crate::app::errors::ApiError;
use crate::config::Config;

#[derive(Clone)]
pub struct AppServices {
    pub db: Database,
    pub tokens: Arc<Hs256JwtValidator>,
    pub hasher: PasswordHasher,
    /// Check for taken usernames/emails before inserting. The unique
    /// constraints stay authoritative either way.
    pub precheck_duplicates: bool,
}

impl AppServices {
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let db = Database::connect(&config.database_url, config.db_max_connections)
            .await
            .with_context(|| format!("failed to open database {}", config.database_url))?;
        Ok(Self::new(db, config))
    }

    pub fn new(db: Database, config: &Config) -> Self {
        let tokens = Hs256JwtValidator::new(
            config.jwt_secret.as_bytes(),
            chrono::Duration::minutes(config.token_ttl_minutes),
        );
        Self {
            db,
            tokens: Arc::new(tokens),
            hasher: PasswordHasher::new(config.bcrypt_cost),
            precheck_duplicates: config.precheck_duplicates,
        }
    }

    /// bcrypt is CPU-bound; keep it off the async workers.
    pub async fn hash_password(&self, plain: String) -> Result<String, ApiError> {
        let hasher = self.hasher;
        let hashed = tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .context("password hashing task failed")??;
        Ok(hashed)
    }

    pub async fn verify_password(&self, plain: String, hashed: String) -> Result<bool, ApiError> {
        let hasher = self.hasher;
        let ok = tokio::task::spawn_blocking(move || hasher.verify(&plain, &hashed))
            .await
            .context("password verification task failed")??;
        Ok(ok)
    }
}
