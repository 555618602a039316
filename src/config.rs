//! Application configuration loaded from environment variables.

use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

/// Default listen port for the web placeholder.
pub const DEFAULT_WEB_PORT: u16 = 3000;

/// Default listen port for the API service.
pub const DEFAULT_API_PORT: u16 = 8000;

/// Filter used by `--verbose`.
pub const VERBOSE_LOG_FILTER: &str = "climsys_agent=debug,info";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Server Configuration ===
    /// Listen port. Each service falls back to its own default when unset.
    #[serde(default)]
    pub port: Option<u16>,

    /// Base URL of the API service, linked from the web page.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Tracing filter directives, e.g. `info` or `climsys_agent=debug,info`.
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    // === Worker Configuration ===
    /// Lock owner recorded on claimed jobs.
    #[serde(default)]
    pub worker_id: Option<String>,

    /// Idle sleep between empty polls, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub worker_poll_interval_ms: u64,

    /// Sleep after a store error outside a claimed job, in milliseconds.
    #[serde(default = "default_error_backoff")]
    pub worker_error_backoff_ms: u64,

    /// Attempts before a job is marked failed.
    #[serde(default = "default_max_attempts")]
    pub job_max_attempts: u32,

    /// Spawn the worker inside the API process.
    #[serde(default = "default_true")]
    pub embedded_worker: bool,
}

fn default_api_base() -> String {
    format!("http://localhost:{}", DEFAULT_API_PORT)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_error_backoff() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: None,
            api_base: default_api_base(),
            rust_log: default_log_level(),
            worker_id: None,
            worker_poll_interval_ms: default_poll_interval(),
            worker_error_backoff_ms: default_error_backoff(),
            job_max_attempts: default_max_attempts(),
            embedded_worker: true,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Load and validate configuration.
    pub fn load_validated() -> crate::Result<Self> {
        let config = Self::load()?;
        config.validate().map_err(AppError::InvalidConfig)?;
        Ok(config)
    }

    /// Load configuration from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_base.trim().is_empty() {
            return Err("API_BASE must not be empty".to_string());
        }

        if self.job_max_attempts == 0 {
            return Err("JOB_MAX_ATTEMPTS must be at least 1".to_string());
        }

        if self.worker_poll_interval_ms == 0 {
            return Err("WORKER_POLL_INTERVAL_MS must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Port for the web placeholder.
    pub fn web_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_WEB_PORT)
    }

    /// Port for the API service.
    pub fn api_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_API_PORT)
    }

    /// Tracing filter directives; `verbose` overrides `RUST_LOG`.
    pub fn log_directives(&self, verbose: bool) -> String {
        if verbose {
            VERBOSE_LOG_FILTER.to_string()
        } else {
            self.rust_log.clone()
        }
    }

    /// Worker identity: `WORKER_ID`, then `HOSTNAME`, then the pid.
    pub fn worker_identity(&self) -> String {
        resolve_worker_identity(
            self.worker_id.as_deref(),
            std::env::var("HOSTNAME").ok(),
            std::process::id(),
        )
    }

    /// Idle poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }

    /// Sleep after a store error.
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.worker_error_backoff_ms)
    }
}

fn resolve_worker_identity(
    worker_id: Option<&str>,
    hostname: Option<String>,
    pid: u32,
) -> String {
    worker_id
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| hostname.filter(|h| !h.is_empty()))
        .unwrap_or_else(|| format!("worker-{}", pid))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn default_values_are_sensible() {
        let config = Config::from_vars(Vec::new()).unwrap();
        assert_eq!(config.port, None);
        assert_eq!(config.api_base, "http://localhost:8000");
        assert_eq!(config.job_max_attempts, 3);
        assert!(config.embedded_worker);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn web_port_defaults_to_3000() {
        let config = Config::from_vars(Vec::new()).unwrap();
        assert_eq!(config.web_port(), 3000);
        assert_eq!(config.api_port(), 8000);
    }

    #[test]
    fn port_and_api_base_are_read_from_vars() {
        let config = Config::from_vars(vars(&[
            ("PORT", "4100"),
            ("API_BASE", "https://api.example.test"),
        ]))
        .unwrap();

        assert_eq!(config.web_port(), 4100);
        assert_eq!(config.api_port(), 4100);
        assert_eq!(config.api_base, "https://api.example.test");
    }

    #[test]
    fn invalid_port_is_a_load_error() {
        assert!(Config::from_vars(vars(&[("PORT", "not-a-port")])).is_err());
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let config = Config {
            job_max_attempts: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_api_base() {
        let config = Config {
            api_base: "  ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_worker_id_wins() {
        let config = Config {
            worker_id: Some("worker-a".to_string()),
            ..Config::default()
        };
        assert_eq!(config.worker_identity(), "worker-a");
    }

    #[test]
    fn worker_identity_falls_back_to_hostname_then_pid() {
        assert_eq!(
            resolve_worker_identity(None, Some("api-7f9c".to_string()), 42),
            "api-7f9c"
        );
        assert_eq!(
            resolve_worker_identity(Some(""), Some("api-7f9c".to_string()), 42),
            "api-7f9c"
        );
        assert_eq!(resolve_worker_identity(None, None, 42), "worker-42");
        assert_eq!(
            resolve_worker_identity(None, Some(String::new()), 42),
            "worker-42"
        );
    }

    #[test]
    fn log_filter_comes_from_rust_log() {
        let config = Config::from_vars(Vec::new()).unwrap();
        assert_eq!(config.log_directives(false), "info");

        let config = Config::from_vars(vars(&[("RUST_LOG", "warn,climsys_agent=trace")])).unwrap();
        assert_eq!(config.log_directives(false), "warn,climsys_agent=trace");
        assert_eq!(config.log_directives(true), VERBOSE_LOG_FILTER);
    }
}
