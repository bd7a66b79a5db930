//! # Filter Chain
//!
//! Decides whether a classified record is worth reporting. Checks run in a
//! fixed order and stop at the first rejection:
//!
//! 1. allow-list of error types (only when non-empty)
//! 2. deny-list of error types
//! 3. file path ignore patterns
//! 4. environment gating
//! 5. the user `should_report_error` predicate (fails open)

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use tracing::warn;

use crate::catalog::ErrorType;
use crate::config::ReporterConfig;
use crate::hooks::ReporterHooks;
use crate::rate_limit::RateDecision;
use crate::record::{Environment, ErrorRecord};
use crate::types::ReporterError;

/// Why a capture was not reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Reporting is switched off for this reporter or environment
    Disabled,
    /// The `before_capture` gate returned false
    BeforeCapture,
    /// Type not in a non-empty allow-list
    TypeNotEnabled,
    /// Type in the deny-list
    TypeDisabled,
    /// File matched the given ignore pattern
    IgnoredPath(String),
    /// Reporting is off for the record's environment
    EnvironmentDisabled(Environment),
    /// `should_report_error` returned false
    Predicate,
    /// A rate limit budget is spent
    RateLimited(RateDecision),
}

impl RejectReason {
    /// Short label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::Disabled => "disabled",
            RejectReason::BeforeCapture => "before_capture",
            RejectReason::TypeNotEnabled => "type_not_enabled",
            RejectReason::TypeDisabled => "type_disabled",
            RejectReason::IgnoredPath(_) => "ignored_path",
            RejectReason::EnvironmentDisabled(_) => "environment_disabled",
            RejectReason::Predicate => "predicate",
            RejectReason::RateLimited(RateDecision::TypeLimited) => "rate_limited_type",
            RejectReason::RateLimited(_) => "rate_limited_global",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::IgnoredPath(pattern) => {
                write!(f, "file matches ignore pattern '{}'", pattern)
            }
            RejectReason::EnvironmentDisabled(env) => write!(f, "reporting disabled in {}", env),
            other => f.write_str(other.label()),
        }
    }
}

/// Result of running the filter chain
#[derive(Debug)]
pub enum Admission {
    /// Record passes; `hook_error` carries a failed predicate invocation
    Admitted { hook_error: Option<ReporterError> },
    Rejected(RejectReason),
}

#[derive(Debug)]
struct IgnorePattern {
    source: String,
    regex: Regex,
}

/// Static filters compiled from the configuration
#[derive(Debug)]
pub struct FilterChain {
    enabled_types: HashSet<ErrorType>,
    disabled_types: HashSet<ErrorType>,
    ignore_patterns: Vec<IgnorePattern>,
    enable_in_production: bool,
    enable_in_development: bool,
}

impl FilterChain {
    /// Compiles the filters. A pattern that is not a valid regex is matched
    /// as literal text.
    pub fn new(config: &ReporterConfig) -> Self {
        let ignore_patterns = config
            .ignore_patterns
            .iter()
            .filter(|p| !p.is_empty())
            .filter_map(|pattern| {
                let regex = Regex::new(pattern).or_else(|err| {
                    warn!(
                        pattern = %pattern,
                        error = %err,
                        "Ignore pattern is not a regex, matching literally"
                    );
                    Regex::new(&regex::escape(pattern))
                });
                regex.ok().map(|regex| IgnorePattern {
                    source: pattern.clone(),
                    regex,
                })
            })
            .collect();

        Self {
            enabled_types: config.enabled_error_types.clone(),
            disabled_types: config.disabled_error_types.clone(),
            ignore_patterns,
            enable_in_production: config.enable_in_production,
            enable_in_development: config.enable_in_development,
        }
    }

    /// Runs the static checks (steps 1 to 4)
    pub fn check_static(&self, record: &ErrorRecord) -> Option<RejectReason> {
        if !self.enabled_types.is_empty() && !self.enabled_types.contains(&record.error_type) {
            return Some(RejectReason::TypeNotEnabled);
        }

        if self.disabled_types.contains(&record.error_type) {
            return Some(RejectReason::TypeDisabled);
        }

        if let Some(file) = &record.file {
            if let Some(pattern) = self.ignore_patterns.iter().find(|p| p.regex.is_match(file)) {
                return Some(RejectReason::IgnoredPath(pattern.source.clone()));
            }
        }

        let environment_enabled = match record.environment {
            Environment::Production => self.enable_in_production,
            Environment::Development => self.enable_in_development,
        };
        if !environment_enabled {
            return Some(RejectReason::EnvironmentDisabled(record.environment));
        }

        None
    }

    /// Runs the whole chain including the user predicate
    pub async fn admit(&self, record: &ErrorRecord, hooks: &ReporterHooks) -> Admission {
        if let Some(reason) = self.check_static(record) {
            return Admission::Rejected(reason);
        }

        match hooks.run_should_report(record).await {
            None | Some(Ok(true)) => Admission::Admitted { hook_error: None },
            Some(Ok(false)) => Admission::Rejected(RejectReason::Predicate),
            Some(Err(err)) => {
                warn!(
                    error_type = %record.error_type,
                    error = %err,
                    "shouldReportError failed, reporting anyway"
                );
                Admission::Admitted { hook_error: Some(err) }
            }
        }
    }
}
