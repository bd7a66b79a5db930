//! # Structured Logging
//!
//! Subscriber setup for hosts that do not install their own, and the console
//! side channel that echoes every captured build error through `tracing`.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::catalog::Severity;
use crate::record::ErrorRecord;
use crate::types::{ReporterError, Result};

// Keeps the file writer flushing for the lifetime of the process
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Configuration for the logging system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback level when `RUST_LOG` is not set
    pub level: String,
    /// Used as the log file name prefix
    pub service_name: String,
    pub json_format: bool,
    /// Directory for daily rolling log files; no file output when unset
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "error-reporter".to_string(),
            json_format: false,
            log_dir: None,
        }
    }
}

/// Installs the global subscriber. Calling it again is a no-op.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let json_layer = config.json_format.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(true)
    });
    let text_layer = (!config.json_format).then(|| fmt::layer().with_target(true));

    let file_layer = config.log_dir.as_ref().map(|dir| {
        let file_name = format!("{}.log", config.service_name);
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().with_writer(writer).with_ansi(false)
    });

    let subscriber = Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ReporterError::Config(format!("Failed to set global subscriber: {}", e)))?;
    let _ = INITIALIZED.set(());

    info!(
        service = %config.service_name,
        level = %config.level,
        json = config.json_format,
        "Structured logging initialized"
    );

    Ok(())
}

/// Echoes a captured record at a level matching its severity
pub fn log_captured(record: &ErrorRecord) {
    match record.severity {
        Severity::Critical | Severity::High => {
            error!(
                error_type = %record.error_type,
                category = %record.category,
                severity = %record.severity,
                source = %record.source,
                file = ?record.file,
                line = ?record.line,
                plugin = ?record.plugin,
                "{}",
                record.message
            );
        }
        Severity::Medium => {
            warn!(
                error_type = %record.error_type,
                category = %record.category,
                source = %record.source,
                file = ?record.file,
                line = ?record.line,
                "{}",
                record.message
            );
        }
        Severity::Low => {
            info!(
                error_type = %record.error_type,
                category = %record.category,
                source = %record.source,
                file = ?record.file,
                "{}",
                record.message
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            level: "debug".to_string(),
            log_dir: Some(dir.path().to_string_lossy().into_owned()),
            ..Default::default()
        };

        assert!(init_logging(config.clone()).is_ok());
        assert!(init_logging(config).is_ok());
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: LoggingConfig = serde_json::from_str(r#"{ "json_format": true }"#).unwrap();
        assert!(config.json_format);
        assert_eq!(config.level, "info");
        assert!(config.log_dir.is_none());
    }
}
