//! HTTP API for the matchmaking engine
//!
//! This module maps the engine's logical operations onto an Axum router.
//! The transport layer is deliberately thin: handlers validate nothing
//! beyond the path, call one engine method, and wrap the outcome in the
//! response envelope. Health and metrics endpoints ride on the same
//! listener.

use crate::http::responses::{error_status, ApiResponse};
use crate::matchmaker::MatchEngine;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::types::{MatchId, QueueStatus, SessionId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Shared state for the API router
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<MatchEngine>,
    pub service_name: String,
}

/// Build the API router with all endpoints
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/connect", post(connect_handler))
        .route(
            "/sessions/{id}",
            get(info_handler).delete(disconnect_handler),
        )
        .route("/sessions/{id}/ping", post(ping_handler))
        .route(
            "/sessions/{id}/queue",
            post(join_queue_handler)
                .get(queue_status_handler)
                .delete(exit_queue_handler),
        )
        .route("/matches/{id}/end", post(end_match_handler))
        .route("/healthz", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

fn reply_ok<T: serde::Serialize>(
    request: &'static str,
    message: impl Into<String>,
    data: Option<T>,
) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::ok(request, message, data)),
    )
        .into_response()
}

fn reply_err(request: &'static str, error: anyhow::Error) -> Response {
    let status = error_status(&error);
    (
        status,
        Json(ApiResponse::<serde_json::Value>::failure(
            request,
            error.to_string(),
        )),
    )
        .into_response()
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let info = json!({
        "service": state.service_name,
        "version": crate::VERSION,
        "endpoints": [
            "/connect",
            "/sessions/{id}",
            "/sessions/{id}/ping",
            "/sessions/{id}/queue",
            "/matches/{id}/end",
            "/healthz",
            "/stats",
            "/metrics"
        ]
    });

    Json(info)
}

async fn connect_handler(State(state): State<ApiState>) -> Response {
    match state.engine.connect() {
        Ok(snapshot) => reply_ok(
            "connect",
            format!("session connected: {}", snapshot.id),
            Some(snapshot),
        ),
        Err(e) => reply_err("connect", e),
    }
}

async fn info_handler(State(state): State<ApiState>, Path(id): Path<SessionId>) -> Response {
    match state.engine.session_info(id) {
        Ok(snapshot) => reply_ok(
            "info",
            format!("session information: {}", id),
            Some(snapshot),
        ),
        Err(e) => reply_err("info", e),
    }
}

async fn disconnect_handler(State(state): State<ApiState>, Path(id): Path<SessionId>) -> Response {
    match state.engine.disconnect(id) {
        Ok(()) => reply_ok::<serde_json::Value>(
            "disconnect",
            format!("disconnected: {}", id),
            None,
        ),
        Err(e) => reply_err("disconnect", e),
    }
}

async fn ping_handler(State(state): State<ApiState>, Path(id): Path<SessionId>) -> Response {
    match state.engine.ping(id) {
        Ok(remaining) => reply_ok(
            "ping",
            format!("connection ok: {}", id),
            Some(json!({ "remaining_ttl_seconds": remaining })),
        ),
        Err(e) => reply_err("ping", e),
    }
}

async fn join_queue_handler(State(state): State<ApiState>, Path(id): Path<SessionId>) -> Response {
    match state.engine.join_queue(id) {
        Ok(()) => {
            reply_ok::<serde_json::Value>("joinQueue", format!("added to queue: {}", id), None)
        }
        Err(e) => reply_err("joinQueue", e),
    }
}

async fn exit_queue_handler(State(state): State<ApiState>, Path(id): Path<SessionId>) -> Response {
    match state.engine.exit_queue(id) {
        Ok(()) => {
            reply_ok::<serde_json::Value>("exitQueue", format!("removed from queue: {}", id), None)
        }
        Err(e) => reply_err("exitQueue", e),
    }
}

async fn queue_status_handler(
    State(state): State<ApiState>,
    Path(id): Path<SessionId>,
) -> Response {
    match state.engine.queue_status(id) {
        Ok(status) => {
            let message = match &status {
                QueueStatus::Matched { .. } => "match found",
                QueueStatus::Queued { .. } => "in queue",
                QueueStatus::Idle => "not in queue",
            };
            reply_ok("queueStatus", message, Some(status))
        }
        Err(e) => reply_err("queueStatus", e),
    }
}

async fn end_match_handler(State(state): State<ApiState>, Path(id): Path<MatchId>) -> Response {
    match state.engine.end_match(id) {
        Ok(()) => {
            reply_ok::<serde_json::Value>("endMatch", format!("match ended: {}", id), None)
        }
        Err(e) => reply_err("endMatch", e),
    }
}

/// Lightweight health check endpoint handler
async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    debug!("Health check requested");

    let status = HealthCheck::liveness(&state.engine);
    let code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(json!({
            "status": status,
            "service": state.service_name,
            "version": crate::VERSION
        })),
    )
}

/// Detailed service statistics endpoint handler
async fn stats_handler(State(state): State<ApiState>) -> Response {
    match HealthCheck::check(&state.engine, &state.service_name) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "error": e.to_string()
            })),
        )
            .into_response(),
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<ApiState>) -> Response {
    let registry = state.engine.metrics().registry();
    let metric_families = registry.gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", encoder.format_type().to_string())],
            output,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchmakingSettings;
    use crate::provision::MockProvisioner;
    use crate::types::SessionSnapshot;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt; // for oneshot

    fn test_state() -> ApiState {
        let provisioner = Arc::new(MockProvisioner::new());
        let engine = MatchEngine::new(MatchmakingSettings::default(), provisioner);
        ApiState {
            engine,
            service_name: "rally-point".to_string(),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_connect_returns_session() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/connect")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["request"], "connect");
        assert_eq!(body["success"], true);

        let snapshot: SessionSnapshot = serde_json::from_value(body["data"].clone()).unwrap();
        assert_eq!(snapshot.remaining_ttl_seconds, 300);
    }

    #[tokio::test]
    async fn test_info_unknown_session_is_404() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/sessions/{}", crate::utils::generate_session_id()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_double_join_is_conflict() {
        let state = test_state();
        let session = state.engine.connect().unwrap();
        let app = create_router(state);

        let first = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/sessions/{}/queue", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/sessions/{}/queue", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_queue_status_reports_queue_length() {
        let state = test_state();
        let session = state.engine.connect().unwrap();
        state.engine.join_queue(session.id).unwrap();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/sessions/{}/queue", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "in queue");
        assert_eq!(body["data"]["state"], "queued");
        assert_eq!(body["data"]["players_in_queue"], 1);
    }

    #[tokio::test]
    async fn test_end_match_unknown_id_is_404() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/matches/{}/end", crate::utils::generate_match_id()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_healthz_and_metrics_endpoints() {
        let app = create_router(test_state());

        let health = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let metrics = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(metrics.status(), StatusCode::OK);
        let content_type = metrics.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));
    }

    #[tokio::test]
    async fn test_disconnect_then_info_is_404() {
        let state = test_state();
        let session = state.engine.connect().unwrap();
        let app = create_router(state);

        let disconnect = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/sessions/{}", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(disconnect.status(), StatusCode::OK);

        let info = app
            .oneshot(
                Request::builder()
                    .uri(format!("/sessions/{}", session.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(info.status(), StatusCode::NOT_FOUND);
    }
}
