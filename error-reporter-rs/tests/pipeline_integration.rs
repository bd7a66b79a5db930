//! End-to-end tests for the reporting pipeline
//!
//! A wiremock server stands in for the collector; everything between the
//! capture and the HTTP request is the real pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use error_reporter::{
    ErrorRecord, ErrorReporter, FailureReason, PipelineOutcome, RawCapture, RejectReason,
    ReporterConfig, ReporterHooks,
};

fn config_for(server: &MockServer) -> ReporterConfig {
    ReporterConfig {
        retry_base_delay_ms: 5,
        retry_max_delay_ms: 40,
        request_timeout_ms: 2_000,
        log_errors: false,
        ..ReporterConfig::new(format!("{}/api/errors", server.uri()))
    }
}

async fn received_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_syntax_error_is_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/errors"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "type": "vite-syntax-error",
            "category": "syntax",
            "severity": "high",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sent = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&sent);
    let hooks = ReporterHooks::new().on_error_sent(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let reporter = ErrorReporter::new(config_for(&server), hooks).unwrap();

    let outcome = reporter
        .capture(
            RawCapture::new("syntax-hook")
                .message("Unexpected token")
                .file("a.ts"),
        )
        .await
        .unwrap();
    assert_eq!(outcome, PipelineOutcome::Delivered { attempts: 1 });
    assert_eq!(sent.load(Ordering::SeqCst), 1);

    let bodies = received_bodies(&server).await;
    let body = bodies[0].as_object().unwrap();
    assert_eq!(body["message"], "Unexpected token");
    assert_eq!(body["file"], "a.ts");
    assert_eq!(body["source"], "syntax-hook");
    assert_eq!(body["environment"], "development");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    for absent in ["line", "column", "plugin", "stack", "frame"] {
        assert!(!body.contains_key(absent), "{} should be omitted", absent);
    }
}

#[tokio::test]
async fn test_retries_until_collector_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let reporter = ErrorReporter::new(config_for(&server), ReporterHooks::new()).unwrap();
    let outcome = reporter.process(RawCapture::new("hmr").message("update failed")).await;

    assert_eq!(outcome, PipelineOutcome::Delivered { attempts: 3 });
    assert_eq!(received_bodies(&server).await.len(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_report_failure_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    let hooks = ReporterHooks::new().on_error_failed(
        move |record: &ErrorRecord, reason: &FailureReason| {
            sink.lock().unwrap().push((record.error_type, reason.clone()));
        },
    );
    let reporter = ErrorReporter::new(config_for(&server), hooks).unwrap();

    let outcome = reporter.process(RawCapture::new("css").message("Unclosed block")).await;
    assert!(matches!(outcome, PipelineOutcome::Failed { attempts: 4, .. }));

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].1, FailureReason::ServerRejected { status: 503 });
}

#[tokio::test]
async fn test_redirect_is_not_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/errors"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/moved", server.uri()).as_str()),
        )
        .expect(4)
        .mount(&server)
        .await;
    Mock::given(path("/moved"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sent = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&sent);
    let hooks = ReporterHooks::new().on_error_sent(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let reporter = ErrorReporter::new(config_for(&server), hooks).unwrap();

    let outcome = reporter.process(RawCapture::new("css").message("Unclosed block")).await;
    assert_eq!(
        outcome,
        PipelineOutcome::Failed {
            reason: FailureReason::ServerRejected { status: 302 },
            attempts: 4,
        }
    );
    assert_eq!(sent.load(Ordering::SeqCst), 0);

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 4);
    assert!(requests.iter().all(|request| request.url.path() == "/api/errors"));
}

#[tokio::test]
async fn test_unreachable_collector_is_a_network_failure() {
    // nothing listens on the discard port
    let config = ReporterConfig {
        max_retries: 1,
        retry_base_delay_ms: 5,
        log_errors: false,
        ..ReporterConfig::new("http://127.0.0.1:9/api/errors")
    };

    let reporter = ErrorReporter::new(config, ReporterHooks::new()).unwrap();
    match reporter.process(RawCapture::new("load").message("ENOENT")).await {
        PipelineOutcome::Failed {
            reason: FailureReason::Network { .. },
            attempts,
        } => assert_eq!(attempts, 2),
        other => panic!("expected network failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_configured_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-project-key", "web-app"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.headers.insert("X-Project-Key".to_string(), "web-app".to_string());
    let reporter = ErrorReporter::new(config, ReporterHooks::new()).unwrap();

    assert!(reporter.process(RawCapture::new("transform")).await.is_delivered());
}

#[tokio::test]
async fn test_filters_keep_records_off_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = ReporterConfig {
        ignore_patterns: vec!["node_modules".to_string()],
        max_errors_per_minute: 2,
        ..config_for(&server)
    };
    let reporter = ErrorReporter::new(config, ReporterHooks::new()).unwrap();

    let ignored = reporter
        .process(RawCapture::new("load").file("node_modules/pkg/index.js"))
        .await;
    assert_eq!(
        ignored,
        PipelineOutcome::Rejected(RejectReason::IgnoredPath("node_modules".to_string()))
    );

    assert!(reporter.process(RawCapture::new("css")).await.is_delivered());
    assert!(reporter.process(RawCapture::new("hmr")).await.is_delivered());
    assert!(reporter.process(RawCapture::new("load")).await.is_rejected());

    assert_eq!(received_bodies(&server).await.len(), 2);
}

#[tokio::test]
async fn test_redaction_before_delivery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = ReporterConfig {
        redact_sensitive: true,
        include_stack: false,
        ..config_for(&server)
    };
    let reporter = ErrorReporter::new(config, ReporterHooks::new()).unwrap();

    let raw = RawCapture::new("transform")
        .message("fetch failed: token=abc123")
        .stack("at load (src/api.ts:3:9)");
    assert!(reporter.process(raw).await.is_delivered());

    let bodies = received_bodies(&server).await;
    assert_eq!(bodies[0]["message"], "fetch failed: token=[REDACTED]");
    assert!(bodies[0].get("stack").is_none());
}

#[tokio::test]
async fn test_shutdown_waits_for_detached_captures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
        .expect(3)
        .mount(&server)
        .await;

    let reporter = ErrorReporter::new(config_for(&server), ReporterHooks::new()).unwrap();
    for source in ["css", "hmr", "load"] {
        // handles are dropped on purpose
        let _ = reporter.capture(RawCapture::new(source));
    }

    assert!(reporter.shutdown(Duration::from_secs(5)).await);
    assert_eq!(reporter.in_flight(), 0);
}
