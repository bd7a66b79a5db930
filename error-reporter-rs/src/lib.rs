//! # Error Reporter
//!
//! Captures errors raised by a front-end build tool and its dev server,
//! classifies them against a static catalog, filters and rate limits them,
//! and delivers the survivors to a remote collector over HTTP.
//!
//! ## Features
//!
//! - Static catalog of build and dev-server error types with category and
//!   default severity
//! - Allow/deny lists, file ignore patterns and environment gating
//! - Global and per-type rate limiting in 60 second windows
//! - User hooks that can never break the pipeline
//! - Retrying delivery with exponential backoff and per-attempt timeouts
//! - Optional redaction of credentials before anything leaves the machine
//!
//! ```no_run
//! use error_reporter::{ErrorReporter, RawCapture, ReporterConfig, ReporterHooks};
//!
//! # async fn run() -> error_reporter::Result<()> {
//! let reporter = ErrorReporter::new(
//!     ReporterConfig::new("https://collector.example.com/api/errors"),
//!     ReporterHooks::new(),
//! )?;
//!
//! reporter.capture(
//!     RawCapture::new("syntax-hook")
//!         .message("Unexpected token")
//!         .file("src/main.ts"),
//! );
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod delivery;
pub mod filter;
pub mod hooks;
pub mod logging;
pub mod monitoring;
pub mod rate_limit;
pub mod record;
pub mod reporter;
pub mod sanitization;
pub mod transform;
pub mod types;

// Re-export commonly used types
pub use catalog::{Category, ErrorType, Severity};
pub use classifier::classify;
pub use crate::config::ReporterConfig;
pub use delivery::{DeliveryConfig, DeliveryEngine, DeliveryOutcome, HttpTransport, Transport};
pub use filter::RejectReason;
pub use hooks::ReporterHooks;
pub use logging::{init_logging, LoggingConfig};
pub use rate_limit::{RateDecision, RateLimiter};
pub use record::{Environment, ErrorRecord, RawCapture};
pub use reporter::{ErrorReporter, PipelineOutcome};
pub use types::{FailureReason, HookKind, ReporterError, Result};

/// Loads configuration from `path` and the environment and builds a reporter
pub fn init_with_config(
    path: Option<&std::path::Path>,
    hooks: ReporterHooks,
) -> Result<ErrorReporter> {
    let config = ReporterConfig::load(path)?;
    ErrorReporter::new(config, hooks)
}
