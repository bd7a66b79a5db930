//! # Delivery Engine
//!
//! Posts records to the collector with per-attempt timeouts and exponential
//! backoff between attempts. The engine never calls user hooks; it returns a
//! [`DeliveryOutcome`] and leaves callbacks to the coordinator.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::ReporterConfig;
use crate::monitoring;
use crate::record::ErrorRecord;
use crate::types::{FailureReason, ReporterError, Result};

/// Upper bound applied to the configured jitter factor.
///
/// With a factor of at most 0.25 the largest delay for attempt `n` stays
/// below the smallest delay for attempt `n + 1`.
pub const MAX_JITTER: f64 = 0.25;

/// Sends an encoded record somewhere and reports the response status
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request body; `Err` means no status was received
    async fn send(&self, body: Vec<u8>) -> Result<u16>;
}

/// Default transport: JSON POST through reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpTransport {
    pub fn new(config: &ReporterConfig) -> Result<Self> {
        let url = reqwest::Url::parse(&config.error_server_url)
            .map_err(|e| ReporterError::Config(format!("invalid error_server_url: {}", e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ReporterError::Config(format!("invalid header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ReporterError::Config(format!("invalid value for header '{}': {}", name, e))
            })?;
            headers.insert(name, value);
        }

        // A 3xx is an answer from the collector, not a hop to follow: a
        // followed redirect would turn the POST into a bodiless GET.
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, body: Vec<u8>) -> Result<u16> {
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        Ok(response.status().as_u16())
    }
}

/// Retry and timeout settings for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Jitter factor, clamped to `[0.0, MAX_JITTER]` when used
    pub jitter: f64,
    /// Deadline for each individual attempt
    pub attempt_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self::from(&ReporterConfig::default())
    }
}

impl From<&ReporterConfig> for DeliveryConfig {
    fn from(config: &ReporterConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            jitter: config.retry_jitter,
            attempt_timeout: config.request_timeout(),
        }
    }
}

impl DeliveryConfig {
    /// Delay before retry number `attempt` (0 for the first retry)
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        let exp_backoff = base_ms * 2.0_f64.powi(attempt.min(62) as i32);

        let jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, MAX_JITTER)
        } else {
            0.0
        };
        let factor = if jitter > 0.0 {
            rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter))
        } else {
            1.0
        };

        let backoff_ms = (exp_backoff * factor).min(max_ms).max(0.0);
        Duration::from_millis(backoff_ms as u64)
    }
}

/// Final result of delivering one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The collector answered 2xx
    Delivered { attempts: u32 },
    /// Delivery was given up
    Failed { reason: FailureReason, attempts: u32 },
}

impl DeliveryOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Delivered { attempts }
            | DeliveryOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Delivers records through a [`Transport`] with retries
#[derive(Clone)]
pub struct DeliveryEngine {
    transport: Arc<dyn Transport>,
    config: DeliveryConfig,
}

impl fmt::Debug for DeliveryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryEngine").field("config", &self.config).finish()
    }
}

impl DeliveryEngine {
    pub fn new(transport: Arc<dyn Transport>, config: DeliveryConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Delivers one record, retrying transport failures and non-2xx answers
    pub async fn deliver(&self, record: &ErrorRecord) -> DeliveryOutcome {
        let error_type = record.error_type.as_str();

        let body = match record.to_wire() {
            Ok(body) => body,
            Err(err) => {
                let reason = FailureReason::Serialization { message: err.to_string() };
                warn!(error_type = %error_type, error = %err, "Record could not be serialized");
                monitoring::record_failed(&reason);
                return DeliveryOutcome::Failed { reason, attempts: 0 };
            }
        };

        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            monitoring::record_attempt(error_type);

            let send = self.transport.send(body.clone());
            let sent = timeout(self.config.attempt_timeout, send).await;
            let err = match sent {
                Ok(Ok(status)) if (200..300).contains(&status) => {
                    info!(
                        error_type = %error_type,
                        status = status,
                        attempts = attempt,
                        "Error record delivered"
                    );
                    monitoring::record_delivered(error_type);
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Ok(Ok(status)) => ReporterError::Http { status },
                Ok(Err(err)) => err,
                Err(_) => ReporterError::Timeout(self.config.attempt_timeout),
            };

            if attempt >= max_attempts {
                let reason = FailureReason::from(&err);
                warn!(
                    error_type = %error_type,
                    attempts = attempt,
                    error = %err,
                    "Giving up on error record delivery"
                );
                monitoring::record_failed(&reason);
                return DeliveryOutcome::Failed { reason, attempts: attempt };
            }

            let delay = self.config.calculate_backoff(attempt - 1);
            debug!(
                error_type = %error_type,
                attempt = attempt,
                max_attempts = max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Delivery attempt failed, retrying"
            );
            sleep(delay).await;
        }
    }
}
