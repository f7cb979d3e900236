use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Default seconds between polls for queued entities.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default number of entities claimed per poll.
pub const DEFAULT_BATCH_SIZE: i64 = 20;

/// Default number of resolve-and-create attempts per entity.
pub const DEFAULT_MAX_CREATE_ATTEMPTS: u32 = 3;

/// Default seconds after which a `started` entity is considered abandoned.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 600;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub poll_interval: Duration,
    pub batch_size: i64,
    /// How many times a lost creation race is retried with fresh names.
    pub max_create_attempts: u32,
    /// Entities left `started` longer than this are claimed again.
    pub stale_after: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `DATABASE_URL`               | required |
    /// | `DATABASE_MAX_CONNECTIONS`   | `10`    |
    /// | `IMPORT_POLL_INTERVAL_SECS`  | `5`     |
    /// | `IMPORT_BATCH_SIZE`          | `20`    |
    /// | `IMPORT_MAX_CREATE_ATTEMPTS` | `3`     |
    /// | `IMPORT_STALE_AFTER_SECS`    | `600`   |
    ///
    /// Unparseable optional values fall back to their default. Poll
    /// interval, stale window, batch size and attempts are clamped to at
    /// least 1.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_vars<F>(var: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = var("DATABASE_URL")
            .ok_or_else(|| WorkerError::Config("DATABASE_URL must be set".into()))?;

        Ok(Self {
            database_url,
            max_connections: parse_or(
                var("DATABASE_MAX_CONNECTIONS"),
                transit_db::DEFAULT_MAX_CONNECTIONS,
            ),
            poll_interval: Duration::from_secs(
                parse_or(var("IMPORT_POLL_INTERVAL_SECS"), DEFAULT_POLL_INTERVAL_SECS).max(1),
            ),
            batch_size: parse_or(var("IMPORT_BATCH_SIZE"), DEFAULT_BATCH_SIZE).max(1),
            max_create_attempts: parse_or(
                var("IMPORT_MAX_CREATE_ATTEMPTS"),
                DEFAULT_MAX_CREATE_ATTEMPTS,
            )
            .max(1),
            stale_after: Duration::from_secs(
                parse_or(var("IMPORT_STALE_AFTER_SECS"), DEFAULT_STALE_AFTER_SECS).max(1),
            ),
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> WorkerResult<WorkerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn database_url_is_required() {
        assert_matches!(config(&[]), Err(WorkerError::Config(_)));
    }

    #[test]
    fn defaults_apply_when_unset_or_unparseable() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://localhost/transit"),
            ("IMPORT_BATCH_SIZE", "many"),
        ])
        .unwrap();
        assert_eq!(cfg.max_connections, transit_db::DEFAULT_MAX_CONNECTIONS);
        assert_eq!(cfg.poll_interval, Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS));
        assert_eq!(cfg.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(cfg.max_create_attempts, DEFAULT_MAX_CREATE_ATTEMPTS);
        assert_eq!(cfg.stale_after, Duration::from_secs(DEFAULT_STALE_AFTER_SECS));
    }

    #[test]
    fn zero_values_are_clamped_to_one() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://localhost/transit"),
            ("IMPORT_POLL_INTERVAL_SECS", "0"),
            ("IMPORT_BATCH_SIZE", "0"),
            ("IMPORT_MAX_CREATE_ATTEMPTS", "0"),
            ("IMPORT_STALE_AFTER_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.batch_size, 1);
        assert_eq!(cfg.max_create_attempts, 1);
        assert_eq!(cfg.stale_after, Duration::from_secs(1));
    }
}
