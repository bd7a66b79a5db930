//! # Classifier
//!
//! Turns a raw capture into a canonical record using only the static
//! catalog tables. Never fails.

use chrono::Utc;

use crate::catalog::ErrorType;
use crate::record::{Environment, ErrorRecord, RawCapture, FALLBACK_MESSAGE};

/// Classifies a capture taken in the given environment
pub fn classify(raw: RawCapture, environment: Environment) -> ErrorRecord {
    let error_type = ErrorType::from_source(&raw.source);

    let message = raw
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());

    ErrorRecord {
        error_type,
        message,
        plugin: raw.plugin,
        file: raw.file,
        line: raw.line,
        column: raw.column,
        stack: raw.stack,
        frame: raw.frame,
        severity: error_type.default_severity(),
        category: error_type.category(),
        timestamp: Utc::now(),
        environment,
        source: raw.source,
    }
}
