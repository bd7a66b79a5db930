//! # Pipeline Coordinator
//!
//! `ErrorReporter` owns every stage and drives each capture through
//! classify, filter, rate limit, transform and deliver on its own task.
//! Nothing in here ever hands an error back to the code that captured a
//! build failure.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classifier::classify;
use crate::config::ReporterConfig;
use crate::delivery::{
    DeliveryConfig, DeliveryEngine, DeliveryOutcome, HttpTransport, Transport,
};
use crate::filter::{Admission, FilterChain, RejectReason};
use crate::hooks::ReporterHooks;
use crate::logging::log_captured;
use crate::monitoring;
use crate::rate_limit::RateLimiter;
use crate::record::{Environment, ErrorRecord, RawCapture};
use crate::sanitization::sanitize_record;
use crate::transform::{transform, Transformed};
use crate::types::{FailureReason, ReporterError, Result};

/// Terminal state of one capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The collector accepted the record
    Delivered { attempts: u32 },
    /// Delivery was given up; `on_error_failed` has been called
    Failed { reason: FailureReason, attempts: u32 },
    /// Dropped before delivery
    Rejected(RejectReason),
}

impl PipelineOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, PipelineOutcome::Delivered { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, PipelineOutcome::Rejected(_))
    }
}

struct Inner {
    config: ReporterConfig,
    environment: Environment,
    hooks: ReporterHooks,
    filters: FilterChain,
    rate_limiter: RateLimiter,
    delivery: DeliveryEngine,
    delivery_permits: Option<Semaphore>,
    enabled: AtomicBool,
    accepting: AtomicBool,
    in_flight: AtomicUsize,
    drained: Notify,
    runtime: Handle,
}

/// Counts a running pipeline task until dropped
struct InFlight(Arc<Inner>);

impl InFlight {
    fn enter(inner: &Arc<Inner>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(inner))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.drained.notify_waiters();
        }
    }
}

/// Error reporting pipeline bound to one configuration
#[derive(Clone)]
pub struct ErrorReporter {
    inner: Arc<Inner>,
}

impl ErrorReporter {
    /// Creates a reporter that delivers over HTTP.
    ///
    /// Must be called from within a Tokio runtime; the runtime handle is kept
    /// so that `capture` works from any thread afterwards.
    pub fn new(config: ReporterConfig, hooks: ReporterHooks) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_transport(config, hooks, transport)
    }

    /// Creates a reporter that delivers through a custom transport
    pub fn with_transport(
        config: ReporterConfig,
        hooks: ReporterHooks,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| ReporterError::Runtime(e.to_string()))?;

        let environment = config.environment();
        let inner = Inner {
            environment,
            hooks,
            filters: FilterChain::new(&config),
            rate_limiter: RateLimiter::new(
                config.max_errors_per_minute,
                config.max_errors_per_type,
            ),
            delivery: DeliveryEngine::new(transport, DeliveryConfig::from(&config)),
            delivery_permits: config.max_concurrent_deliveries.map(Semaphore::new),
            enabled: AtomicBool::new(config.enabled),
            accepting: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
            drained: Notify::new(),
            runtime,
            config,
        };

        info!(
            endpoint = %inner.config.error_server_url,
            environment = %environment,
            enabled = inner.config.enabled,
            "Error reporter created"
        );

        Ok(Self { inner: Arc::new(inner) })
    }

    /// Starts the pipeline for a capture without waiting for it.
    ///
    /// The returned handle may be dropped; the pipeline still runs to
    /// completion.
    pub fn capture(&self, raw: RawCapture) -> JoinHandle<PipelineOutcome> {
        let guard = InFlight::enter(&self.inner);
        let accepted = self.inner.accepting.load(Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            let _guard = guard;
            inner.run(raw, accepted).await
        })
    }

    /// Runs the pipeline for a capture and waits for its outcome
    pub async fn process(&self, raw: RawCapture) -> PipelineOutcome {
        let _guard = InFlight::enter(&self.inner);
        let accepted = self.inner.accepting.load(Ordering::SeqCst);
        self.inner.run(raw, accepted).await
    }

    /// Toggles reporting at runtime
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled = enabled, "Error reporting toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    pub fn environment(&self) -> Environment {
        self.inner.environment
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.inner.config
    }

    /// Number of pipelines and `on_error` hooks still running
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Stops accepting captures and waits up to `timeout` for running
    /// pipelines to finish. Returns whether everything drained.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.inner.accepting.store(false, Ordering::SeqCst);

        let inner = &self.inner;
        let drain = async {
            loop {
                let notified = inner.drained.notified();
                if inner.in_flight.load(Ordering::SeqCst) == 0 {
                    return;
                }
                notified.await;
            }
        };

        let drained = tokio::time::timeout(timeout, drain).await.is_ok();
        if drained {
            info!("Error reporter shut down");
        } else {
            warn!(
                in_flight = self.in_flight(),
                timeout_ms = timeout.as_millis() as u64,
                "Error reporter shut down with pipelines still running"
            );
        }
        drained
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("endpoint", &self.inner.config.error_server_url)
            .field("environment", &self.inner.environment)
            .field("enabled", &self.is_enabled())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Inner {
    fn is_active(&self) -> bool {
        self.enabled.load(Ordering::SeqCst) && self.config.enabled_for(self.environment)
    }

    /// `accepted` is whether the reporter was still open when the capture
    /// was handed over
    async fn run(self: &Arc<Self>, raw: RawCapture, accepted: bool) -> PipelineOutcome {
        let span = info_span!("capture", capture_id = %Uuid::new_v4(), source = %raw.source);
        self.pipeline(raw, accepted).instrument(span).await
    }

    async fn pipeline(self: &Arc<Self>, raw: RawCapture, accepted: bool) -> PipelineOutcome {
        monitoring::record_captured(&raw.source);

        if !accepted || !self.is_active() {
            return self.reject(RejectReason::Disabled);
        }

        let gate_error = match self.hooks.run_before_capture(&raw) {
            Ok(true) => None,
            Ok(false) => return self.reject(RejectReason::BeforeCapture),
            Err(err) => {
                warn!(error = %err, "beforeCapture failed, capturing anyway");
                Some(err)
            }
        };

        let record = sanitize_record(classify(raw, self.environment), &self.config);
        if let Some(err) = gate_error {
            self.report_hook_failure(&record, err);
        }
        if self.config.log_errors {
            log_captured(&record);
        }

        match self.filters.admit(&record, &self.hooks).await {
            Admission::Rejected(reason) => return self.reject(reason),
            Admission::Admitted { hook_error } => {
                if let Some(err) = hook_error {
                    self.report_hook_failure(&record, err);
                }
            }
        }

        let decision = self.rate_limiter.check(record.error_type);
        if !decision.is_allowed() {
            return self.reject(RejectReason::RateLimited(decision));
        }

        let Transformed { record, hook_error } = transform(record, &self.hooks).await;
        if let Some(err) = hook_error {
            self.report_hook_failure(&record, err);
        }

        self.spawn_on_error(&record);

        let _permit = match &self.delivery_permits {
            Some(permits) => permits.acquire().await.ok(),
            None => None,
        };

        match self.delivery.deliver(&record).await {
            DeliveryOutcome::Delivered { attempts } => {
                self.hooks.notify_sent(&record);
                PipelineOutcome::Delivered { attempts }
            }
            DeliveryOutcome::Failed { reason, attempts } => {
                self.hooks.notify_failed(&record, &reason);
                PipelineOutcome::Failed { reason, attempts }
            }
        }
    }

    /// Runs `on_error` on its own task so it never delays delivery
    fn spawn_on_error(self: &Arc<Self>, record: &ErrorRecord) {
        let task = match self.hooks.on_error_task(record.clone()) {
            Some(task) => task,
            None => return,
        };

        let guard = InFlight::enter(self);
        let record = record.clone();
        self.runtime.spawn(
            async move {
                if let Err(err) = task.await {
                    guard.0.report_hook_failure(&record, err);
                }
            }
            .in_current_span(),
        );
    }

    fn reject(&self, reason: RejectReason) -> PipelineOutcome {
        debug!(reason = %reason, "Capture rejected");
        monitoring::record_rejected(&reason);
        PipelineOutcome::Rejected(reason)
    }

    fn report_hook_failure(&self, record: &ErrorRecord, err: ReporterError) {
        let reason = FailureReason::from(&err);
        if let FailureReason::Hook { hook, .. } = &reason {
            monitoring::record_hook_failure(*hook);
        }
        warn!(error_type = %record.error_type, error = %err, "User hook failed");
        self.hooks.notify_failed(record, &reason);
    }
}
