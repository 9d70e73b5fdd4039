use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
}

/// `GET /health` for liveness probes; the service's own `/` stays untouched.
pub fn router(service: &'static str) -> Router {
    Router::new().route(
        "/health",
        get(move || async move {
            Json(HealthResponse {
                status: "ok",
                service,
                timestamp: chrono::Utc::now().to_rfc3339(),
            })
        }),
    )
}
