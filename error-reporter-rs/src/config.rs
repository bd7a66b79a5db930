//! # Reporter Configuration
//!
//! Static settings consumed by the pipeline. Loaded from an optional file
//! plus `ERROR_REPORTER_*` environment variables, or built in code.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::ErrorType;
use crate::record::Environment;
use crate::types::{ReporterError, Result};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "ERROR_REPORTER";

/// Configuration for the error reporter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Collector endpoint records are POSTed to (required)
    pub error_server_url: String,
    /// Master on/off switch
    pub enabled: bool,
    /// Host run mode, resolved once into an [`Environment`]
    pub mode: String,
    /// When non-empty, only these types are reported
    pub enabled_error_types: HashSet<ErrorType>,
    /// Types never reported; wins over `enabled_error_types`
    pub disabled_error_types: HashSet<ErrorType>,
    /// File path patterns (regex, or literal text if not a valid regex)
    pub ignore_patterns: Vec<String>,
    /// Global budget per 60s window; `<= 0` disables
    pub max_errors_per_minute: i64,
    /// Per-type budget per 60s window; `<= 0` disables
    pub max_errors_per_type: i64,
    pub enable_in_production: bool,
    pub enable_in_development: bool,
    /// Retries after the first delivery attempt
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Backoff jitter factor, clamped to `[0.0, 0.25]`
    pub retry_jitter: f64,
    /// Deadline for a single delivery attempt
    pub request_timeout_ms: u64,
    /// Extra HTTP headers sent with every delivery
    pub headers: HashMap<String, String>,
    pub include_stack: bool,
    pub include_frame: bool,
    /// Scrub credentials and emails from message, stack and frame
    pub redact_sensitive: bool,
    /// Log every captured error through `tracing`
    pub log_errors: bool,
    /// Cap on concurrently running deliveries; unbounded when unset
    pub max_concurrent_deliveries: Option<usize>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            error_server_url: String::new(),
            enabled: true,
            mode: "development".to_string(),
            enabled_error_types: HashSet::new(),
            disabled_error_types: HashSet::new(),
            ignore_patterns: Vec::new(),
            max_errors_per_minute: 60,
            max_errors_per_type: 10,
            enable_in_production: true,
            enable_in_development: true,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
            retry_jitter: 0.1,
            request_timeout_ms: 10_000,
            headers: HashMap::new(),
            include_stack: true,
            include_frame: true,
            redact_sensitive: false,
            log_errors: true,
            max_concurrent_deliveries: None,
        }
    }
}

impl ReporterConfig {
    /// Creates a default configuration pointed at the given collector
    pub fn new<S: Into<String>>(error_server_url: S) -> Self {
        Self {
            error_server_url: error_server_url.into(),
            ..Default::default()
        }
    }

    /// Loads configuration from an optional file and the environment.
    ///
    /// A `.env` file is honoured if present. Environment variables take the
    /// form `ERROR_REPORTER_<FIELD>`, e.g. `ERROR_REPORTER_ERROR_SERVER_URL`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config: ReporterConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            endpoint = %config.error_server_url,
            mode = %config.mode,
            "Reporter configuration loaded"
        );

        Ok(config)
    }

    /// Checks the values the pipeline cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.error_server_url.trim().is_empty() {
            return Err(ReporterError::Config("error_server_url is required".to_string()));
        }
        reqwest::Url::parse(&self.error_server_url).map_err(|e| {
            ReporterError::Config(format!(
                "error_server_url '{}' is not a valid URL: {}",
                self.error_server_url, e
            ))
        })?;

        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            return Err(ReporterError::Config(
                "retry_max_delay_ms must not be smaller than retry_base_delay_ms".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ReporterError::Config("request_timeout_ms must be positive".to_string()));
        }
        if !self.retry_jitter.is_finite() || self.retry_jitter < 0.0 {
            return Err(ReporterError::Config(
                "retry_jitter must be a non-negative number".to_string(),
            ));
        }
        if self.max_concurrent_deliveries == Some(0) {
            return Err(ReporterError::Config(
                "max_concurrent_deliveries must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Environment derived from `mode`
    pub fn environment(&self) -> Environment {
        Environment::from_mode(&self.mode)
    }

    /// Whether reporting is switched on for the given environment
    pub fn enabled_for(&self, environment: Environment) -> bool {
        match environment {
            Environment::Production => self.enable_in_production,
            Environment::Development => self.enable_in_development,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ReporterConfig::new("http://localhost:4000/errors");
        assert!(config.validate().is_ok());
        assert!(config.enabled);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.environment(), Environment::Development);
        assert!(config.enabled_for(Environment::Production));
    }

    #[test]
    fn test_validation_rejects_missing_url() {
        let config = ReporterConfig::default();
        assert!(matches!(config.validate(), Err(ReporterError::Config(_))));

        let config = ReporterConfig::new("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_inverted_delays() {
        let config = ReporterConfig {
            retry_base_delay_ms: 5_000,
            retry_max_delay_ms: 1_000,
            ..ReporterConfig::new("http://localhost/errors")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "error_server_url": "https://collector.example.com/api/errors",
                "mode": "production",
                "disabled_error_types": ["vite-hmr-error"],
                "ignore_patterns": ["node_modules"],
                "max_errors_per_minute": 5
            }}"#
        )
        .unwrap();

        let config = ReporterConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.error_server_url, "https://collector.example.com/api/errors");
        assert_eq!(config.environment(), Environment::Production);
        assert!(config.disabled_error_types.contains(&ErrorType::HmrError));
        assert_eq!(config.ignore_patterns, vec!["node_modules".to_string()]);
        assert_eq!(config.max_errors_per_minute, 5);
        assert_eq!(config.max_errors_per_type, 10);
    }

    #[test]
    fn test_load_rejects_unknown_error_type() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{ "error_server_url": "http://localhost/errors",
                 "enabled_error_types": ["vite-bogus"] }}"#
        )
        .unwrap();

        assert!(ReporterConfig::load(Some(file.path())).is_err());
    }
}
