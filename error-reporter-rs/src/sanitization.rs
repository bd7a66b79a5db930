//! # Record Sanitization
//!
//! Scrubs credentials and personal data out of the free-text fields of a
//! record before it leaves the machine, and drops stack/frame fields the
//! configuration asks to exclude.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::ReporterConfig;
use crate::record::ErrorRecord;

const REDACTED: &str = "[REDACTED]";

// Static regex patterns for sensitive information detection
static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // api keys, tokens, passwords assigned in code or URLs
        concat!(
            r#"(?i)\b(api[_-]?key|access[_-]?token|token|secret|password|passwd|credential)s?"#,
            r#"(["']?\s*[=:]\s*["']?)([^"'\s&]+)"#,
        ),
        // bearer tokens
        r"(?i)(bearer\s+)([a-z0-9._\-~+/]+=*)",
        // JWTs
        r"eyJ[a-zA-Z0-9\-_]+\.eyJ[a-zA-Z0-9\-_]+\.[a-zA-Z0-9\-_]+",
        // email addresses
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Replaces sensitive fragments of `text`, keeping assignment keys intact
pub fn sanitize_text(text: &str) -> String {
    let mut sanitized = text.to_string();

    for pattern in SENSITIVE_PATTERNS.iter() {
        sanitized = pattern
            .replace_all(&sanitized, |caps: &Captures| match caps.len() {
                // key, separator, value
                4 => format!("{}{}{}", &caps[1], &caps[2], REDACTED),
                // prefix, value
                3 => format!("{}{}", &caps[1], REDACTED),
                _ => REDACTED.to_string(),
            })
            .into_owned();
    }

    sanitized
}

/// Applies the configured field exclusions and redaction to a record
pub fn sanitize_record(mut record: ErrorRecord, config: &ReporterConfig) -> ErrorRecord {
    if !config.include_stack {
        record.stack = None;
    }
    if !config.include_frame {
        record.frame = None;
    }

    if config.redact_sensitive {
        record.message = sanitize_text(&record.message);
        record.stack = record.stack.as_deref().map(sanitize_text);
        record.frame = record.frame.as_deref().map(sanitize_text);
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::record::{Environment, RawCapture};

    #[test]
    fn test_sanitize_assignments() {
        let text = "request failed: api_key=abc123 password: hunter2";
        let sanitized = sanitize_text(text);

        assert!(!sanitized.contains("abc123"));
        assert!(!sanitized.contains("hunter2"));
        assert!(sanitized.contains("api_key=[REDACTED]"));
        assert!(sanitized.contains("password: [REDACTED]"));
    }

    #[test]
    fn test_sanitize_bearer_and_email() {
        let sanitized = sanitize_text("Authorization: Bearer sk.live.0123 sent by dev@example.com");

        assert!(sanitized.contains("Bearer [REDACTED]"));
        assert!(!sanitized.contains("sk.live.0123"));
        assert!(!sanitized.contains("dev@example.com"));
    }

    #[test]
    fn test_plain_text_untouched() {
        let text = "Unexpected token '<' in src/App.tsx";
        assert_eq!(sanitize_text(text), text);
    }

    #[test]
    fn test_sanitize_record_respects_config() {
        let raw = RawCapture::new("transform")
            .message("token=deadbeef")
            .stack("at transform (plugin.js:1:1)")
            .frame("> 1 | x");
        let record = classify(raw, Environment::Development);

        let config = ReporterConfig {
            include_frame: false,
            redact_sensitive: true,
            ..ReporterConfig::new("http://localhost/errors")
        };
        let record = sanitize_record(record, &config);

        assert_eq!(record.message, "token=[REDACTED]");
        assert!(record.stack.is_some());
        assert!(record.frame.is_none());
    }
}
