use platform_core::config as core_config;
use platform_core::error::AppError;
use secrecy::Secret;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;

#[derive(Debug, Clone)]
pub struct SalesdocsConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub cron_secret: Secret<String>,
    /// Immutable allowlist loaded once at startup; admin access never
    /// changes at runtime.
    pub super_admin_emails: HashSet<String>,
    pub webhook_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl SalesdocsConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let super_admin_emails = env::var("SUPER_ADMIN_EMAILS")
            .unwrap_or_default()
            .split(',')
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();

        Ok(SalesdocsConfig {
            common,
            service_name: "salesdocs-service".to_string(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: core_config::require_env("DATABASE_URL", None)?,
                max_connections: parse_env("DB_MAX_CONNECTIONS", 10)?,
                min_connections: parse_env("DB_MIN_CONNECTIONS", 1)?,
            },
            cron_secret: Secret::new(core_config::require_env(
                "CRON_SECRET",
                Some("dev-cron-secret"),
            )?),
            super_admin_emails,
            webhook_timeout_secs: parse_env("WEBHOOK_TIMEOUT_SECS", 10)?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(val) => val.parse().map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("{} is not a valid number", key))
        }),
        Err(_) => Ok(default),
    }
}
