//! Export configuration, read from environment variables.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::error::AppError;

/// Settings for one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// PostgreSQL connection string (`DATABASE_URL`).
    pub database_url: String,
    /// Pool size (`DATABASE_MAX_CONNECTIONS`).
    pub max_connections: u32,
    /// How long to wait for a pooled connection (`DATABASE_ACQUIRE_TIMEOUT_SECS`).
    pub acquire_timeout: Duration,
    /// Server-side limit per statement (`STATEMENT_TIMEOUT_MS`).
    pub statement_timeout_ms: u64,
    /// Events fetched per page (`EXPORT_PAGE_SIZE`).
    pub page_size: i64,
}

impl ExportConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a numeric
    /// setting does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a numeric
    /// setting does not parse or is out of range.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config("DATABASE_URL environment variable must be set".into())
            })?;

        let max_connections: u32 = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        let acquire_timeout_secs: u64 = parse_or(&lookup, "DATABASE_ACQUIRE_TIMEOUT_SECS", 5)?;
        let statement_timeout_ms: u64 = parse_or(&lookup, "STATEMENT_TIMEOUT_MS", 5_000)?;
        let page_size: i64 = parse_or(&lookup, "EXPORT_PAGE_SIZE", 500)?;

        if max_connections == 0 {
            return Err(AppError::Config(
                "DATABASE_MAX_CONNECTIONS must be at least 1".into(),
            ));
        }
        if page_size <= 0 {
            return Err(AppError::Config("EXPORT_PAGE_SIZE must be at least 1".into()));
        }

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            statement_timeout_ms,
            page_size,
        })
    }

    /// Opens a connection pool with the configured limits.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the URL is malformed or the server
    /// cannot be reached.
    pub async fn connect(&self) -> Result<PgPool, AppError> {
        let options = PgConnectOptions::from_str(&self.database_url)?
            .options([("statement_timeout", self.statement_timeout_ms)]);

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(options)
            .await?;
        Ok(pool)
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} must be a valid number: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        let config =
            ExportConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/db")]))
                .unwrap();

        assert_eq!(config.database_url, "postgres://localhost/db");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.statement_timeout_ms, 5_000);
        assert_eq!(config.page_size, 500);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = ExportConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("DATABASE_MAX_CONNECTIONS", "3"),
            ("DATABASE_ACQUIRE_TIMEOUT_SECS", "30"),
            ("STATEMENT_TIMEOUT_MS", " 250 "),
            ("EXPORT_PAGE_SIZE", "1000"),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 3);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.statement_timeout_ms, 250);
        assert_eq!(config.page_size, 1_000);
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = ExportConfig::from_lookup(lookup_from(&[("EXPORT_PAGE_SIZE", "10")]));

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("DATABASE_URL")));
    }

    #[test]
    fn test_unparseable_number_names_the_variable() {
        let result = ExportConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("STATEMENT_TIMEOUT_MS", "soon"),
        ]));

        assert!(
            matches!(result, Err(AppError::Config(msg)) if msg.starts_with("STATEMENT_TIMEOUT_MS"))
        );
    }

    #[test]
    fn test_non_positive_page_size_is_rejected() {
        let result = ExportConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("EXPORT_PAGE_SIZE", "0"),
        ]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
