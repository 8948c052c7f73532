//! Connection and retry settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How to reach the server.
///
/// Every field is optional; unset fields fall back to psql's own defaults
/// (`PGHOST`, `PGPORT`, `~/.pgpass`, ...).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Path to the psql executable
    #[serde(default)]
    pub psql: Option<String>,
    /// Server host or socket directory
    #[serde(default)]
    pub host: Option<String>,
    /// Server port
    #[serde(default)]
    pub port: Option<u16>,
    /// Role used to connect
    #[serde(default)]
    pub user: Option<String>,
    /// Database to connect to
    #[serde(default)]
    pub maintenance_db: Option<String>,
    /// Password for the connecting role, passed through `PGPASSWORD`
    #[serde(default)]
    pub password: Option<String>,
    /// OS user to run psql as, through `sudo -u`
    #[serde(default)]
    pub runas: Option<String>,
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("psql", &self.psql)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("maintenance_db", &self.maintenance_db)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("runas", &self.runas)
            .finish()
    }
}

/// Configuration for retry behavior on transient errors.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_backoff() {
        let config = RetryConfig::new(5, Duration::from_secs(1), 2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn test_retry_delay_capped() {
        let config = RetryConfig::new(10, Duration::from_secs(10), 3.0);
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(30));
    }

    #[test]
    fn test_settings_debug_redacts_password() {
        let settings = ConnectionSettings {
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    #[test]
    fn test_settings_from_json() {
        let settings: ConnectionSettings =
            serde_json::from_str(r#"{"host": "db.internal", "port": 5433}"#).unwrap();
        assert_eq!(settings.host.as_deref(), Some("db.internal"));
        assert_eq!(settings.port, Some(5433));
        assert_eq!(settings.user, None);
    }
}
