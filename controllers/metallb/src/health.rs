//! Health probes and Prometheus metrics.
//!
//! Serves `/healthz` (process is up), `/readyz` (every pipeline is still
//! running) and `/metrics` on the probe bind address.

use crate::error::ControllerError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Readiness shared between the pipelines and the probe server
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    failures: Arc<Mutex<BTreeMap<String, String>>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a pipeline stopped for good
    pub fn mark_failed(&self, pipeline: &str, reason: impl Into<String>) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pipeline.to_string(), reason.into());
    }

    pub fn is_ready(&self) -> bool {
        self.failures().is_empty()
    }

    /// Stopped pipelines and why
    pub fn failures(&self) -> BTreeMap<String, String> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Operator metrics
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconcile_total: IntCounterVec,
    artifact_writes_total: IntCounterVec,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();
        let reconcile_total = IntCounterVec::new(
            Opts::new("metallb_operator_reconcile_total", "Reconciles by pipeline and result"),
            &["pipeline", "result"],
        )?;
        let artifact_writes_total = IntCounterVec::new(
            Opts::new(
                "metallb_operator_artifact_writes_total",
                "Writes to the merged MetalLB ConfigMap by operation",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(artifact_writes_total.clone()))?;

        Ok(Self {
            registry,
            reconcile_total,
            artifact_writes_total,
        })
    }

    pub fn record_reconcile(&self, pipeline: &str, result: &str) {
        self.reconcile_total.with_label_values(&[pipeline, result]).inc();
    }

    pub fn record_artifact_write(&self, operation: &str) {
        self.artifact_writes_total.with_label_values(&[operation]).inc();
    }

    /// Prometheus text exposition of every registered metric
    pub fn export(&self) -> Result<String, ControllerError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ControllerError::Metrics(prometheus::Error::Msg(e.to_string())))
    }
}

#[derive(Clone)]
struct ProbeState {
    health: HealthState,
    metrics: Metrics,
}

/// Router exposing the probe and metrics endpoints
pub fn router(health: HealthState, metrics: Metrics) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(ProbeState { health, metrics })
}

async fn readyz(State(state): State<ProbeState>) -> Response {
    let failures = state.health.failures();
    if failures.is_empty() {
        return (StatusCode::OK, "ok").into_response();
    }
    let body = failures
        .iter()
        .map(|(pipeline, reason)| format!("{}: {}", pipeline, reason))
        .collect::<Vec<_>>()
        .join("\n");
    (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
}

async fn metrics_handler(State(state): State<ProbeState>) -> Response {
    match state.metrics.export() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Serve the probe endpoints until the listener fails
pub async fn serve(address: SocketAddr, health: HealthState, metrics: Metrics) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Health probes listening on {}", address);
    axum::serve(listener, router(health, metrics)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_path(router: Router, path: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_readyz_reports_stopped_pipelines() {
        let health = HealthState::new();
        let metrics = Metrics::new().unwrap();

        let (status, _) = get_path(router(health.clone(), metrics.clone()), "/readyz").await;
        assert_eq!(status, StatusCode::OK);

        health.mark_failed("addresspool", "AddressPool kind is not registered");
        let (status, body) = get_path(router(health.clone(), metrics.clone()), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("addresspool"));

        // Liveness is unaffected
        let (status, _) = get_path(router(health, metrics), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_exports_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_reconcile("addresspool", "success");
        metrics.record_artifact_write("create");

        let (status, body) = get_path(router(HealthState::new(), metrics), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("metallb_operator_reconcile_total{pipeline=\"addresspool\",result=\"success\"} 1"));
        assert!(body.contains("metallb_operator_artifact_writes_total{operation=\"create\"} 1"));
    }
}
