//! # Reporter Error Types
//!
//! Errors raised while constructing or running the reporter, and the
//! reasons handed to the `on_error_failed` callback.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A type alias for Result with the error type defaulting to ReporterError
pub type Result<T, E = ReporterError> = std::result::Result<T, E>;

/// Errors produced by the reporter itself
///
/// None of these ever reach the code that captured a build error. They are
/// returned from constructors and used internally by the delivery engine.
#[derive(Error, Debug)]
pub enum ReporterError {
    /// Invalid or missing configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration source could not be read
    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Record could not be encoded to the wire format
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level failure (connect, DNS, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// A single delivery attempt exceeded its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The collector answered with a non-success status
    #[error("Collector responded with HTTP {status}")]
    Http {
        /// HTTP status code
        status: u16,
    },

    /// A user hook failed
    #[error("Hook '{hook}' failed: {message}")]
    Hook {
        /// Which hook failed
        hook: HookKind,
        /// Failure description
        message: String,
    },

    /// No Tokio runtime was available to run the pipeline
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<reqwest::Error> for ReporterError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ReporterError::Http { status: status.as_u16() }
        } else if err.is_timeout() {
            ReporterError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ReporterError::Network(format!("Connection error: {}", err))
        } else {
            ReporterError::Network(format!("HTTP client error: {}", err))
        }
    }
}

/// Identifies a user-supplied hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookKind {
    /// Pre-classification gate
    BeforeCapture,
    /// `shouldReportError` predicate
    ShouldReportError,
    /// `transformError` mutation
    TransformError,
    /// `onError` observer
    OnError,
    /// `onErrorSent` success callback
    OnErrorSent,
    /// `onErrorFailed` failure callback
    OnErrorFailed,
}

impl HookKind {
    /// Stable name used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::BeforeCapture => "beforeCapture",
            HookKind::ShouldReportError => "shouldReportError",
            HookKind::TransformError => "transformError",
            HookKind::OnError => "onError",
            HookKind::OnErrorSent => "onErrorSent",
            HookKind::OnErrorFailed => "onErrorFailed",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a record ended up in `on_error_failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FailureReason {
    /// Transport failure or per-attempt timeout on the final attempt
    Network {
        /// Last transport error
        message: String,
    },
    /// Collector rejected the record with a 4xx status
    ClientRejected {
        /// HTTP status code
        status: u16,
    },
    /// Collector failed with a 5xx (or otherwise non-2xx) status
    ServerRejected {
        /// HTTP status code
        status: u16,
    },
    /// The record could not be encoded
    Serialization {
        /// Encoder error
        message: String,
    },
    /// A user hook failed; the record itself may still be delivered
    Hook {
        /// Which hook failed
        hook: HookKind,
        /// Failure description
        message: String,
    },
}

impl FailureReason {
    /// Short label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            FailureReason::Network { .. } => "network",
            FailureReason::ClientRejected { .. } => "client_rejected",
            FailureReason::ServerRejected { .. } => "server_rejected",
            FailureReason::Serialization { .. } => "serialization",
            FailureReason::Hook { .. } => "hook",
        }
    }

    /// Maps a status code to the matching rejection reason
    pub fn from_status(status: u16) -> Self {
        if (400..500).contains(&status) {
            FailureReason::ClientRejected { status }
        } else {
            FailureReason::ServerRejected { status }
        }
    }
}

impl From<&ReporterError> for FailureReason {
    fn from(err: &ReporterError) -> Self {
        match err {
            ReporterError::Http { status } => FailureReason::from_status(*status),
            ReporterError::Serialization(e) => FailureReason::Serialization {
                message: e.to_string(),
            },
            ReporterError::Hook { hook, message } => FailureReason::Hook {
                hook: *hook,
                message: message.clone(),
            },
            other => FailureReason::Network { message: other.to_string() },
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Network { message } => write!(f, "network failure: {}", message),
            FailureReason::ClientRejected { status } => {
                write!(f, "collector rejected record (HTTP {})", status)
            }
            FailureReason::ServerRejected { status } => {
                write!(f, "collector error (HTTP {})", status)
            }
            FailureReason::Serialization { message } => {
                write!(f, "serialization failure: {}", message)
            }
            FailureReason::Hook { hook, message } => write!(f, "hook {} failed: {}", hook, message),
        }
    }
}
