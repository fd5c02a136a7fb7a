//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics  - Prometheus text format
//!   GET /healthz  - Liveness probe (always 200 if process is running)
//!   GET /readyz   - Readiness probe (200 if the blob store is reachable)

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus_client::{encoding::text::encode, metrics::counter::Counter, registry::Registry};
use std::sync::Arc;

/// File API counters, shared by every request handler
#[derive(Clone, Default)]
pub struct Metrics {
    pub uploads: Counter,
    pub downloads: Counter,
    pub deletes: Counter,
    pub decrypt_failures: Counter,
    pub legacy_reads: Counter,
}

impl Metrics {
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "lockbox_uploads",
            "Files encrypted and stored",
            metrics.uploads.clone(),
        );
        registry.register(
            "lockbox_downloads",
            "Files successfully retrieved",
            metrics.downloads.clone(),
        );
        registry.register(
            "lockbox_deletes",
            "Files deleted",
            metrics.deletes.clone(),
        );
        registry.register(
            "lockbox_decrypt_failures",
            "Retrievals rejected by tag verification",
            metrics.decrypt_failures.clone(),
        );
        registry.register(
            "lockbox_legacy_reads",
            "Retrievals served from unencrypted legacy payloads",
            metrics.legacy_reads.clone(),
        );
        metrics
    }
}

#[derive(Clone)]
pub struct HealthState {
    pub registry: Arc<Registry>,
    pub operator: opendal::Operator,
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
}

/// Serve Prometheus metrics and health endpoints on `addr` (e.g. "127.0.0.1:9100")
pub async fn serve(addr: String, state: HealthState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("metrics bind {addr}: {e}"))?;

    tracing::info!(addr = %addr, "metrics: listening on /metrics, /healthz, /readyz");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| anyhow::anyhow!("metrics server: {e}"))
}

async fn metrics_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz_handler(State(state): State<HealthState>) -> impl IntoResponse {
    match lockbox_storage::check_health(&state.operator).await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!("readiness check failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "storage unreachable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state_with(metrics: &mut Option<Metrics>) -> HealthState {
        let mut registry = Registry::default();
        *metrics = Some(Metrics::new(&mut registry));
        HealthState {
            registry: Arc::new(registry),
            operator: lockbox_storage::memory_operator().unwrap(),
        }
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_exposes_counters() {
        let mut metrics = None;
        let app = router(state_with(&mut metrics));
        let metrics = metrics.unwrap();
        metrics.uploads.inc();
        metrics.uploads.inc();
        metrics.decrypt_failures.inc();

        let (status, body) = get_text(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("lockbox_uploads_total 2"), "{body}");
        assert!(body.contains("lockbox_decrypt_failures_total 1"), "{body}");
        assert!(body.contains("lockbox_legacy_reads_total 0"), "{body}");
    }

    #[tokio::test]
    async fn test_probes() {
        let mut metrics = None;
        let app = router(state_with(&mut metrics));

        let (status, body) = get_text(app.clone(), "/healthz").await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "ok"));

        let (status, body) = get_text(app, "/readyz").await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "ready"));
    }
}
