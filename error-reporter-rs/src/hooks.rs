//! # User Hooks
//!
//! Optional callbacks a host can plug into the pipeline. Every slot is
//! independent. Each invocation is wrapped so that a returned error or a
//! panic inside user code becomes a [`ReporterError::Hook`] value and never
//! unwinds into the pipeline.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::error;

use crate::record::{ErrorRecord, RawCapture};
use crate::types::{FailureReason, HookKind, ReporterError, Result};

/// Future returned by asynchronous hooks
pub type HookFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

type BeforeCaptureFn = Arc<dyn Fn(&RawCapture) -> bool + Send + Sync>;
type ShouldReportFn = Arc<dyn Fn(ErrorRecord) -> HookFuture<bool> + Send + Sync>;
type TransformFn = Arc<dyn Fn(ErrorRecord) -> HookFuture<ErrorRecord> + Send + Sync>;
type OnErrorFn = Arc<dyn Fn(ErrorRecord) -> HookFuture<()> + Send + Sync>;
type OnSentFn = Arc<dyn Fn(&ErrorRecord) + Send + Sync>;
type OnFailedFn = Arc<dyn Fn(&ErrorRecord, &FailureReason) + Send + Sync>;

/// Set of optional user callbacks
#[derive(Clone, Default)]
pub struct ReporterHooks {
    before_capture: Option<BeforeCaptureFn>,
    should_report_error: Option<ShouldReportFn>,
    transform_error: Option<TransformFn>,
    on_error: Option<OnErrorFn>,
    on_error_sent: Option<OnSentFn>,
    on_error_failed: Option<OnFailedFn>,
}

impl ReporterHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate evaluated before classification; `false` drops the capture
    pub fn before_capture<F>(mut self, f: F) -> Self
    where
        F: Fn(&RawCapture) -> bool + Send + Sync + 'static,
    {
        self.before_capture = Some(Arc::new(f));
        self
    }

    /// Predicate deciding whether a record is reported
    pub fn should_report_error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ErrorRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.should_report_error = Some(Arc::new(move |record| f(record).boxed()));
        self
    }

    /// Rewrites an admitted record before delivery
    pub fn transform_error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ErrorRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ErrorRecord>> + Send + 'static,
    {
        self.transform_error = Some(Arc::new(move |record| f(record).boxed()));
        self
    }

    /// Observer run once per record alongside delivery
    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ErrorRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_error = Some(Arc::new(move |record| f(record).boxed()));
        self
    }

    /// Called after the collector accepted a record
    pub fn on_error_sent<F>(mut self, f: F) -> Self
    where
        F: Fn(&ErrorRecord) + Send + Sync + 'static,
    {
        self.on_error_sent = Some(Arc::new(f));
        self
    }

    /// Called when delivery is given up or a hook failed for a record
    pub fn on_error_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&ErrorRecord, &FailureReason) + Send + Sync + 'static,
    {
        self.on_error_failed = Some(Arc::new(f));
        self
    }

    /// Runs the pre-classification gate; a missing gate admits
    pub(crate) fn run_before_capture(&self, raw: &RawCapture) -> Result<bool> {
        match &self.before_capture {
            Some(hook) => panic::catch_unwind(AssertUnwindSafe(|| hook(raw)))
                .map_err(|payload| panic_error(HookKind::BeforeCapture, payload)),
            None => Ok(true),
        }
    }

    /// `None` when no predicate is configured
    pub(crate) async fn run_should_report(&self, record: &ErrorRecord) -> Option<Result<bool>> {
        let hook = self.should_report_error.as_ref()?;
        let record = record.clone();
        Some(guarded(HookKind::ShouldReportError, || hook(record)).await)
    }

    /// `None` when no transform is configured
    pub(crate) async fn run_transform(&self, record: ErrorRecord) -> Option<Result<ErrorRecord>> {
        let hook = self.transform_error.as_ref()?;
        Some(guarded(HookKind::TransformError, || hook(record)).await)
    }

    /// Builds the `on_error` invocation so it can be spawned on its own task
    pub(crate) fn on_error_task(
        &self,
        record: ErrorRecord,
    ) -> Option<impl Future<Output = Result<()>> + Send + 'static> {
        let hook = Arc::clone(self.on_error.as_ref()?);
        Some(async move { guarded(HookKind::OnError, move || hook(record)).await })
    }

    pub(crate) fn notify_sent(&self, record: &ErrorRecord) {
        if let Some(hook) = &self.on_error_sent {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook(record))) {
                error!(
                    hook = %HookKind::OnErrorSent,
                    error_type = %record.error_type,
                    panic = %panic_message(payload.as_ref()),
                    "Success callback panicked"
                );
            }
        }
    }

    pub(crate) fn notify_failed(&self, record: &ErrorRecord, reason: &FailureReason) {
        if let Some(hook) = &self.on_error_failed {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook(record, reason))) {
                error!(
                    hook = %HookKind::OnErrorFailed,
                    error_type = %record.error_type,
                    reason = %reason,
                    panic = %panic_message(payload.as_ref()),
                    "Failure callback panicked"
                );
            }
        }
    }
}

impl fmt::Debug for ReporterHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterHooks")
            .field("before_capture", &self.before_capture.is_some())
            .field("should_report_error", &self.should_report_error.is_some())
            .field("transform_error", &self.transform_error.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_error_sent", &self.on_error_sent.is_some())
            .field("on_error_failed", &self.on_error_failed.is_some())
            .finish()
    }
}

/// Invokes an async hook, converting errors and panics into hook errors
async fn guarded<T, C>(hook: HookKind, call: C) -> Result<T>
where
    C: FnOnce() -> HookFuture<T>,
{
    let future =
        panic::catch_unwind(AssertUnwindSafe(call)).map_err(|payload| panic_error(hook, payload))?;

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(ReporterError::Hook {
            hook,
            message: format!("{:#}", err),
        }),
        Err(payload) => Err(panic_error(hook, payload)),
    }
}

fn panic_error(hook: HookKind, payload: Box<dyn Any + Send>) -> ReporterError {
    ReporterError::Hook {
        hook,
        message: format!("panicked: {}", panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
