//! Application state

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use crate::BoxError;
use crate::config::Config;
use crate::db::{PgRetentionStore, RetentionStore};
use crate::retention::RetentionRules;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Retention storage (PostgreSQL in production)
    pub store: Arc<dyn RetentionStore>,
    /// Validated rule table
    pub rules: Arc<RetentionRules>,
    /// JWT secret for caller authentication
    pub jwt_secret: Arc<str>,
}

impl AppState {
    /// Connect to PostgreSQL, run migrations and load the rule table
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let rules = RetentionRules::load(config.retention_rules_path.as_deref())?;

        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");

        Ok(Self::with_store(
            Arc::new(PgRetentionStore::new(pool)),
            rules,
            &config.jwt_secret,
        ))
    }

    /// Build state around an existing store
    pub fn with_store(
        store: Arc<dyn RetentionStore>,
        rules: RetentionRules,
        jwt_secret: &str,
    ) -> Self {
        Self {
            store,
            rules: Arc::new(rules),
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}
