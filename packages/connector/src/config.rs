use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::job::{SourceDatabaseConfig, WorkerConfig};

/// Runs every day at midnight.
pub const DEFAULT_CRON_SCHEDULE: &str = "0 0 * * *";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub personal_access_token: String,
    pub log_level: String,
    pub log_format: String,
    pub health_check_port: u16,
    pub base_url: String,
    /// Dataset the query results are pushed to
    pub dataset_id: String,
    pub cron_schedule: String,
    pub source_database: SourceDatabaseSettings,
}

/// Connection settings and query for the source database
#[derive(Debug, Clone)]
pub struct SourceDatabaseSettings {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub name: String,
    /// `postgres` or `mysql`
    pub db_type: String,
    pub sql_query: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => bail!("{} must be set", key),
            }
        };
        let with_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            personal_access_token: required("PERSONAL_ACCESS_TOKEN")?,
            log_level: with_default("LOG_LEVEL", "info"),
            log_format: with_default("LOG_FORMAT", "text"),
            health_check_port: with_default("HEALTH_CHECK_PORT", "8080")
                .parse()
                .context("HEALTH_CHECK_PORT must be a valid port number")?,
            base_url: with_default("POLYTEIA_BASE_URL", dataset_client::DEFAULT_BASE_URL),
            dataset_id: required("DATASET_ID")?,
            cron_schedule: with_default("CRON_SCHEDULE", DEFAULT_CRON_SCHEDULE),
            source_database: SourceDatabaseSettings {
                host: required("SOURCE_DATABASE_HOST")?,
                port: required("SOURCE_DATABASE_PORT")?,
                user: required("SOURCE_DATABASE_USER")?,
                password: lookup("SOURCE_DATABASE_PASSWORD").unwrap_or_default(),
                name: required("SOURCE_DATABASE_NAME")?,
                db_type: required("SOURCE_DATABASE_TYPE")?,
                sql_query: required("SOURCE_DATABASE_SQL_QUERY")?,
            },
        })
    }

    /// The subset of settings a job worker needs.
    pub fn worker_config(&self) -> WorkerConfig {
        let source = &self.source_database;
        WorkerConfig {
            dataset_id: self.dataset_id.clone(),
            sql_query: source.sql_query.clone(),
            source_database: SourceDatabaseConfig {
                host: source.host.clone(),
                port: source.port.clone(),
                user: source.user.clone(),
                password: source.password.clone(),
                name: source.name.clone(),
                db_type: source.db_type.clone(),
            },
        }
    }
}
