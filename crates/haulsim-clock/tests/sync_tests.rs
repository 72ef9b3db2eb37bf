//! Sync behaviour of the simulation clock against a local time authority.
//!
//! Each test starts an Axum server on an ephemeral port that plays the
//! external time authority, with one route per failure mode.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use haulsim_clock::{Clock, ClockConfig, ClockMode, ManualTimeSource, SyncError, TimeSource};
use serde_json::{Value, json};

const AUTHORITY_TIME: &str = "2024-12-25T15:30:00Z";

fn authority_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 25, 15, 30, 0).unwrap()
}

async fn time_handler(State(hits): State<Arc<AtomicUsize>>) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "currentSimTime": AUTHORITY_TIME }))
}

async fn broken_handler(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn missing_handler() -> Json<Value> {
    Json(json!({ "simTime": AUTHORITY_TIME }))
}

async fn garbage_handler() -> Json<Value> {
    Json(json!({ "currentSimTime": "not a date" }))
}

async fn slow_handler() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({ "currentSimTime": AUTHORITY_TIME }))
}

/// A running stand-in for the time authority.
struct Authority {
    base: String,
    hits: Arc<AtomicUsize>,
}

impl Authority {
    async fn spawn() -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route("/time", get(time_handler))
            .route("/broken", get(broken_handler))
            .route("/missing", get(missing_handler))
            .route("/garbage", get(garbage_handler))
            .route("/slow", get(slow_handler))
            .with_state(Arc::clone(&hits));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            hits,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn frozen_clock(config: &ClockConfig) -> Clock {
    let source = Arc::new(ManualTimeSource::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    ));
    Clock::with_time_source(config, source as Arc<dyn TimeSource>).unwrap()
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..250 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

#[tokio::test]
async fn sync_sets_exact_authority_time() {
    let authority = Authority::spawn().await;
    let clock = frozen_clock(&ClockConfig::default());

    let synced = clock.sync(&authority.url("/time")).await.unwrap();

    assert_eq!(synced, authority_time());
    assert_eq!(clock.now(), authority_time());
}

#[tokio::test]
async fn http_error_status_is_reported_and_state_untouched() {
    let authority = Authority::spawn().await;
    let clock = frozen_clock(&ClockConfig::default());
    let before = clock.now();

    let err = clock.sync(&authority.url("/broken")).await.unwrap_err();

    assert!(matches!(err, SyncError::HttpStatus { status: 500, .. }));
    assert_eq!(clock.now(), before);
    assert_eq!(clock.sync_status().failed_attempts, 0);
}

#[tokio::test]
async fn malformed_payloads_are_validation_errors() {
    let authority = Authority::spawn().await;
    let clock = frozen_clock(&ClockConfig::default());
    let before = clock.now();

    let missing = clock.sync(&authority.url("/missing")).await.unwrap_err();
    let garbage = clock.sync(&authority.url("/garbage")).await.unwrap_err();

    assert!(matches!(missing, SyncError::Validation(_)));
    assert!(matches!(garbage, SyncError::Validation(_)));
    assert_eq!(clock.now(), before);
}

#[tokio::test]
async fn slow_authority_times_out() {
    let authority = Authority::spawn().await;
    let clock = frozen_clock(&ClockConfig {
        sync_timeout_ms: 200,
        ..ClockConfig::default()
    });

    let err = clock.sync(&authority.url("/slow")).await.unwrap_err();

    assert!(matches!(err, SyncError::Timeout { timeout_ms: 200, .. }));
}

#[tokio::test]
async fn closed_port_is_no_response() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let clock = frozen_clock(&ClockConfig::default());

    let err = clock.sync(&format!("http://{addr}/time")).await.unwrap_err();

    assert!(matches!(err, SyncError::NoResponse { .. }));
}

#[tokio::test]
async fn auto_sync_applies_authority_time() {
    let authority = Authority::spawn().await;
    let clock = frozen_clock(&ClockConfig::default());

    clock
        .start(None, Some(&authority.url("/time")), Duration::from_millis(20))
        .unwrap();

    assert!(wait_until(|| clock.now() == authority_time()).await);
    assert_eq!(clock.mode(), ClockMode::RunningWithSync);
}

#[tokio::test]
async fn repeated_failures_open_the_circuit_but_keep_running() {
    let authority = Authority::spawn().await;
    let clock = frozen_clock(&ClockConfig::default());

    clock
        .start(None, Some(&authority.url("/broken")), Duration::from_millis(20))
        .unwrap();

    assert!(wait_until(|| !clock.sync_status().enabled).await);
    let status = clock.sync_status();
    assert_eq!(status.failed_attempts, status.max_failures);
    assert!(clock.is_running());
    assert_eq!(clock.mode(), ClockMode::Running);

    // The task has exited: no further requests reach the authority.
    let hits = authority.hits();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(authority.hits(), hits);
}

#[tokio::test]
async fn successful_sync_clears_failure_count() {
    let authority = Authority::spawn().await;
    let clock = frozen_clock(&ClockConfig {
        max_sync_failures: 1000,
        ..ClockConfig::default()
    });

    clock
        .start(None, Some(&authority.url("/broken")), Duration::from_millis(20))
        .unwrap();
    assert!(wait_until(|| clock.sync_status().failed_attempts >= 2).await);

    clock.stop();
    clock.sync(&authority.url("/time")).await.unwrap();

    assert_eq!(clock.sync_status().failed_attempts, 0);
}

#[tokio::test]
async fn stop_cancels_auto_sync() {
    let authority = Authority::spawn().await;
    let clock = frozen_clock(&ClockConfig::default());

    clock
        .start(None, Some(&authority.url("/time")), Duration::from_millis(20))
        .unwrap();
    assert!(wait_until(|| authority.hits() >= 2).await);

    clock.stop();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let hits = authority.hits();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(authority.hits(), hits);
    assert!(!clock.sync_status().enabled);
}

#[tokio::test]
async fn reset_cancels_auto_sync_and_clears_endpoint() {
    let authority = Authority::spawn().await;
    let clock = frozen_clock(&ClockConfig::default());

    clock
        .start(None, Some(&authority.url("/broken")), Duration::from_millis(20))
        .unwrap();
    assert!(wait_until(|| authority.hits() >= 1).await);

    clock.reset();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let hits = authority.hits();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(authority.hits(), hits);
    let status = clock.sync_status();
    assert_eq!(status.endpoint, None);
    assert_eq!(status.failed_attempts, 0);
    assert_eq!(clock.mode(), ClockMode::Stopped);
}
