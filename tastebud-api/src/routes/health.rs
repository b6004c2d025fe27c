use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use tastebud_shared::types::api::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

/// Probes Postgres, Redis and the object store.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let db = state.db.get().map(|_| ());
    let redis = state.redis.ping().await;
    let storage = state.storage.check().await;

    let checks = vec![
        HealthCheck::probe("postgres", db),
        // Presence and rate limits degrade gracefully without Redis
        match redis {
            Err(e) => HealthCheck::degraded("redis", e.to_string()),
            ok => HealthCheck::probe("redis", ok),
        },
        HealthCheck::probe("storage", storage),
    ];

    let response = HealthResponse::healthy("tastebud-api", env!("CARGO_PKG_VERSION")).with_checks(checks);

    (status_for(&response.status), Json(response)).into_response()
}

fn status_for(status: &HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unhealthy_is_unavailable() {
        assert_eq!(status_for(&HealthStatus::Healthy), StatusCode::OK);
        assert_eq!(status_for(&HealthStatus::Degraded), StatusCode::OK);
        assert_eq!(status_for(&HealthStatus::Unhealthy), StatusCode::SERVICE_UNAVAILABLE);
    }
}
