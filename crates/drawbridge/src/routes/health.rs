//! Health check endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    captcha_enabled: bool,
    captcha_pool: usize,
}

/// Readiness check: sessions can run every configured stage
pub async fn ready_check(
    State(state): State<AppState>,
) -> Result<Json<ReadyResponse>, StatusCode> {
    if state.is_ready() {
        Ok(Json(ReadyResponse {
            status: "ready",
            captcha_enabled: state.config.captcha.enabled,
            captcha_pool: state.captcha_pool.len(),
        }))
    } else {
        // Return 503 while the first CAPTCHA set is being built
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
