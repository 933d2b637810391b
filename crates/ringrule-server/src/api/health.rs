//! Liveness check.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Liveness plus a little engine state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `ok` when the server answers.
    #[schema(example = "ok")]
    pub status: String,

    /// Crate version.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Rules currently stored, enabled or not.
    #[schema(example = 2)]
    pub rule_count: usize,

    /// Whether rules and overrides are written to disk.
    pub persistent: bool,
}

/// Routes under `/health`.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(health_check))
}

/// Report that the server is up.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Liveness check",
    responses(
        (status = 200, description = "Server is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let guard = state.read().await;
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        rule_count: guard.engine.rules().len(),
        persistent: guard.engine.is_persistent(),
    })
}
