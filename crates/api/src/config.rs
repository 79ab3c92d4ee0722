//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::ExternalId;
use domain::StatusPolicy;
use purchase::RetryPolicy;
use store::PostgresStoreOptions;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — PostgreSQL URL; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `DATABASE_ACQUIRE_TIMEOUT_SECS` — pool acquire timeout (default: `5`)
/// - `DATABASE_STATEMENT_TIMEOUT_MS` — statement and lock timeout (default: `5000`)
/// - `PURCHASE_MAX_ATTEMPTS` — attempts per purchase on transient failures (default: `3`)
/// - `PURCHASE_RETRY_BACKOFF_MS` — linear backoff step between attempts (default: `25`)
/// - `ADMIN_EXTERNAL_IDS` — comma-separated external ids granted admin on first contact
/// - `ORDER_STATUS_POLICY` — `overwrite` or `transitions` (default: `overwrite`)
/// - `FRONTEND_TOKEN` — shared secret required on `POST /users`; unset leaves it open
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub database_acquire_timeout: Duration,
    pub database_statement_timeout: Duration,
    pub purchase_max_attempts: u32,
    pub purchase_retry_backoff: Duration,
    pub admin_external_ids: Vec<ExternalId>,
    pub order_status_policy: StatusPolicy,
    pub frontend_token: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup. Unparseable values
    /// fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            database_acquire_timeout: parsed("DATABASE_ACQUIRE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.database_acquire_timeout),
            database_statement_timeout: parsed("DATABASE_STATEMENT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.database_statement_timeout),
            purchase_max_attempts: lookup("PURCHASE_MAX_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.purchase_max_attempts),
            purchase_retry_backoff: parsed("PURCHASE_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.purchase_retry_backoff),
            admin_external_ids: lookup("ADMIN_EXTERNAL_IDS")
                .map(|ids| parse_external_ids(&ids))
                .unwrap_or_default(),
            order_status_policy: match lookup("ORDER_STATUS_POLICY").as_deref().map(str::trim) {
                Some(p) if p.eq_ignore_ascii_case("transitions") => StatusPolicy::TransitionTable,
                _ => StatusPolicy::Overwrite,
            },
            frontend_token: lookup("FRONTEND_TOKEN").filter(|token| !token.trim().is_empty()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn store_options(&self) -> PostgresStoreOptions {
        PostgresStoreOptions {
            max_connections: self.database_max_connections,
            acquire_timeout: self.database_acquire_timeout,
            statement_timeout: self.database_statement_timeout,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.purchase_max_attempts, self.purchase_retry_backoff)
    }
}

fn parse_external_ids(raw: &str) -> Vec<ExternalId> {
    raw.split(',')
        .filter_map(|id| id.trim().parse::<i64>().ok())
        .map(ExternalId::new)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            database_acquire_timeout: Duration::from_secs(5),
            database_statement_timeout: Duration::from_millis(5000),
            purchase_max_attempts: 3,
            purchase_retry_backoff: Duration::from_millis(25),
            admin_external_ids: Vec::new(),
            order_status_policy: StatusPolicy::Overwrite,
            frontend_token: None,
        }
    }
}
