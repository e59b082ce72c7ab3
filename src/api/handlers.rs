//! HTTP API handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::arbitrage::ScanReport;

/// Detector counters exposed on the status endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectorStats {
    /// Completed passes.
    pub passes: u64,
    /// Passes that flagged at least one path.
    pub passes_with_opportunity: u64,
    /// Opportunities flagged across all passes.
    pub opportunities: u64,
    /// Last pass summary.
    pub last_pass: Option<LastPass>,
}

/// Summary of the most recent pass.
#[derive(Debug, Clone, Serialize)]
pub struct LastPass {
    /// Whether an opportunity was found.
    pub found: bool,
    /// Paths evaluated.
    pub evaluated: usize,
    /// Paths skipped for missing prices.
    pub skipped: usize,
    /// When the pass finished.
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

impl DetectorStats {
    /// Fold one pass into the counters.
    pub fn record(&mut self, report: &ScanReport) {
        self.passes += 1;
        if report.found() {
            self.passes_with_opportunity += 1;
        }
        self.opportunities += report.opportunities.len() as u64;
        self.last_pass = Some(LastPass {
            found: report.found(),
            evaluated: report.evaluated,
            skipped: report.skipped,
            at: OffsetDateTime::now_utc(),
        });
    }
}

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Set after the first detector pass.
    pub ready: Arc<AtomicBool>,
    /// Detector counters.
    pub stats: Arc<RwLock<DetectorStats>>,
    /// Symbols being streamed.
    pub stream_symbols: usize,
    /// Paths being scanned.
    pub paths: usize,
    /// Prometheus renderer, when a recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(stream_symbols: usize, paths: usize) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(RwLock::new(DetectorStats::default())),
            stream_symbols,
            paths,
            prometheus: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Record a detector pass and mark the service ready.
    pub async fn record_pass(&self, report: &ScanReport) {
        self.stats.write().await.record(report);
        self.set_ready(true);
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether the detector has completed a pass.
    pub ready: bool,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Symbols being streamed.
    pub stream_symbols: usize,
    /// Paths being scanned.
    pub paths: usize,
    /// Detector counters.
    pub detector: DetectorStats,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse { ready: is_ready };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns pipeline size and detector statistics.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let detector = state.stats.read().await.clone();
    let status = if state.is_ready() { "running" } else { "starting" };

    Json(StatusResponse {
        status,
        stream_symbols: state.stream_symbols,
        paths: state.paths,
        detector,
    })
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}
