mod check;

pub use check::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::rate_limit;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(rate_limit: RateLimitConfig) -> Router<AppState> {
    Router::new()
        .route(
            "/health",
            get(health).layer(rate_limit::relaxed_layer(rate_limit.relaxed_rpm)),
        )
        .route(
            "/license/check",
            post(check_license).layer(rate_limit::check_layer(rate_limit.check_rpm)),
        )
}
