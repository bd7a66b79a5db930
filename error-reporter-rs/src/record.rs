//! # Capture and Record Types
//!
//! `RawCapture` is what the build integration hands over; `ErrorRecord` is
//! the canonical shape every later stage works on and the wire format sent
//! to the collector.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::catalog::{Category, ErrorType, Severity};

/// Message used when the captured error carries no text
pub const FALLBACK_MESSAGE: &str = "Unknown error";

/// Host run mode a reporter is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Resolves the environment from a host mode string.
    ///
    /// `production` and `build` map to production, everything else to
    /// development.
    pub fn from_mode(mode: &str) -> Self {
        match mode.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" | "build" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated capture request from the build integration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCapture {
    /// Tag of the lifecycle hook that fired
    pub source: String,
    /// Text of the underlying error
    pub message: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub plugin: Option<String>,
    pub stack: Option<String>,
    /// Code frame around the failing location
    pub frame: Option<String>,
}

impl RawCapture {
    /// Creates a capture for the given source tag
    pub fn new<S: Into<String>>(source: S) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Creates a capture from any error value, using its display text
    pub fn from_error<S, E>(source: S, error: &E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + ?Sized,
    {
        Self::new(source).message(error.to_string())
    }

    pub fn message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn file<S: Into<String>>(mut self, file: S) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Sets the 1-based line and column of the failure
    pub fn location(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }

    pub fn plugin<S: Into<String>>(mut self, plugin: S) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn stack<S: Into<String>>(mut self, stack: S) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn frame<S: Into<String>>(mut self, frame: S) -> Self {
        self.frame = Some(frame.into());
        self
    }
}

/// Canonical error record
///
/// Serializes to exactly the collector's field set; absent optional fields
/// are omitted rather than sent as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
    pub severity: Severity,
    pub category: Category,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub environment: Environment,
    pub source: String,
}

impl ErrorRecord {
    /// Encodes the record as the JSON body posted to the collector
    pub fn to_wire(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// ISO 8601 rendering of the capture time
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// `2024-01-01T00:00:00.000Z` style timestamps
mod iso_millis {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
