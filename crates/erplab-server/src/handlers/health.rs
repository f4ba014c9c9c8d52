use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{SecondsFormat, Utc};
use erplab_db_postgres::test_connection;
use serde::Serialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::metrics::{
    BackgroundActivity, EndpointCount, EndpointDuration, RequestRecord, SystemMetrics,
    render_metrics,
};
use crate::server::AppState;

const SLOW_REQUESTS_LIMIT: usize = 50;
const ENDPOINTS_LIMIT: usize = 10;

#[derive(Serialize)]
struct ProbeResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub database: &'static str,
    pub port: u16,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/metrics", get(system_metrics))
        .route("/metrics/slow-requests", get(slow_requests))
        .route("/metrics/slowest-endpoints", get(slowest_endpoints))
        .route("/metrics/most-called", get(most_called))
        .route("/metrics/background-activity", get(background_activity))
        .route("/metrics/reset", post(reset))
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "ERP Laboratório Backend",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(ProbeResponse { status: "ok" }))
}

/// Ready once the database answers.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    match test_connection(&state.pool).await {
        Ok(()) => (StatusCode::OK, Json(ProbeResponse { status: "ready" })),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ProbeResponse { status: "unavailable" }),
            )
        }
    }
}

pub async fn prometheus() -> impl IntoResponse {
    match render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "metrics recorder not installed".to_string(),
        ),
    }
}

/// Always 200; `database` reports whether PostgreSQL answered.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match test_connection(&state.pool).await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            "disconnected"
        }
    };
    Json(HealthResponse {
        status: "ok",
        message: "ERP Laboratório Backend está funcionando!",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        database,
        port: state.config.server.port,
    })
}

async fn system_metrics(State(state): State<AppState>) -> Json<SystemMetrics> {
    Json(state.metrics.system_metrics())
}

async fn slow_requests(State(state): State<AppState>) -> Json<Vec<RequestRecord>> {
    Json(state.metrics.slow_requests(SLOW_REQUESTS_LIMIT))
}

async fn slowest_endpoints(State(state): State<AppState>) -> Json<Vec<EndpointDuration>> {
    Json(state.metrics.slowest_endpoints(ENDPOINTS_LIMIT))
}

async fn most_called(State(state): State<AppState>) -> Json<Vec<EndpointCount>> {
    Json(state.metrics.most_called(ENDPOINTS_LIMIT))
}

async fn background_activity(State(state): State<AppState>) -> Json<BackgroundActivity> {
    Json(state.metrics.background_activity())
}

async fn reset(State(state): State<AppState>, user: AuthUser) -> impl IntoResponse {
    state.metrics.reset();
    tracing::info!(user_id = %user.id, "Request metrics reset");
    Json(json!({ "message": "Métricas resetadas com sucesso" }))
}
