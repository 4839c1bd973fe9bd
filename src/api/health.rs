use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: DateTime<Utc>,
    checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    store: ComponentHealth,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ComponentHealth {
    fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            error: Some(error),
        }
    }
}

/// GET /health — liveness: the process is up and able to serve requests.
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

/// GET /health/ready — readiness: the persisted state is actually
/// reachable, not just that the HTTP listener accepted the connection.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let store_health = match state.engine.snapshot().await {
        Ok(_) => ComponentHealth::healthy(),
        Err(err) => ComponentHealth::unhealthy(err.to_string()),
    };
    let healthy = store_health.status == "healthy";

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: Utc::now(),
        checks: HealthChecks { store: store_health },
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
