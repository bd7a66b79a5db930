//! Pipeline counters for error-reporter-rs
//!
//! Thin wrappers over the `metrics` facade so every stage records outcomes
//! under the same names. No recorder is installed here; hosts pick their own
//! exporter.

use metrics::counter;

use crate::catalog::ErrorType;
use crate::filter::RejectReason;
use crate::types::{FailureReason, HookKind};

pub const CAPTURED: &str = "error_reporter.captured";
pub const REJECTED: &str = "error_reporter.rejected";
pub const DELIVERED: &str = "error_reporter.delivered";
pub const FAILED: &str = "error_reporter.failed";
pub const ATTEMPTS: &str = "error_reporter.attempts";
pub const HOOK_FAILURES: &str = "error_reporter.hook_failures";

/// Label for a capture's source tag, bounded by the catalog
pub fn captured_label(source: &str) -> &'static str {
    ErrorType::from_source(source).as_str()
}

pub fn record_captured(source: &str) {
    counter!(CAPTURED, 1, "type" => captured_label(source));
}

pub fn record_rejected(reason: &RejectReason) {
    counter!(REJECTED, 1, "reason" => reason.label());
}

/// Counts one delivery attempt against the collector
pub fn record_attempt(error_type: &'static str) {
    counter!(ATTEMPTS, 1, "type" => error_type);
}

pub fn record_delivered(error_type: &'static str) {
    counter!(DELIVERED, 1, "type" => error_type);
}

pub fn record_failed(reason: &FailureReason) {
    counter!(FAILED, 1, "reason" => reason.label());
}

pub fn record_hook_failure(hook: HookKind) {
    counter!(HOOK_FAILURES, 1, "hook" => hook.as_str());
}
