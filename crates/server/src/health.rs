use axum::{routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::bootstrap::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub checked_at: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Liveness only. The CRM, messaging provider and workflow engine are
/// remote; their availability is reported per request, not here.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "voltquote-server runtime initialized".to_string(),
        },
        checked_at: Utc::now().to_rfc3339(),
    })
}
