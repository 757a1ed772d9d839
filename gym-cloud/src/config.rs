//! Service configuration

use std::time::Duration;

use crate::BoxError;

/// Default evaluator sweep interval (6 hours)
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 6 * 60 * 60;

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Upper bound on pooled connections
    pub database_max_connections: u32,
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// JWT secret shared with the identity provider
    pub jwt_secret: String,
    /// Optional JSON file overriding the default retention rules
    pub retention_rules_path: Option<String>,
    /// Interval between background evaluations (None = disabled)
    pub sweep_interval: Option<Duration>,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let sweep_secs = match std::env::var("RETENTION_SWEEP_INTERVAL_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                format!("RETENTION_SWEEP_INTERVAL_SECS must be a whole number of seconds, got {raw:?}")
            })?,
            Err(_) => DEFAULT_SWEEP_INTERVAL_SECS,
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            database_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: environment.clone(),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            retention_rules_path: std::env::var("RETENTION_RULES_PATH")
                .ok()
                .filter(|s| !s.is_empty()),
            sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
        })
    }
}
