//! Effective ringer mode endpoints.
//!
//! `GET /api/mode` evaluates the current context and caches the result;
//! `GET /api/mode/latest` returns the cached decision without re-evaluating.
//! `POST /api/mode/evaluate` runs the resolver on a caller-supplied snapshot
//! and changes nothing.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use ringrule_core::{ContextSnapshot, Decision};

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::ApiJson;
use crate::state::SharedState;

/// Creates the mode router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_mode))
        .route("/latest", get(get_latest_mode))
        .route("/evaluate", post(evaluate_snapshot))
}

/// Evaluate the current context.
#[utoipa::path(
    get,
    path = "/api/mode",
    tag = "mode",
    operation_id = "getMode",
    summary = "Get the effective ringer mode",
    description = "Evaluates active overrides, geofence membership and time rules \
        at the current time and returns the resulting mode with the full \
        candidate trail.",
    responses(
        (status = 200, description = "Decision computed", body = Decision)
    )
)]
pub async fn get_mode(State(state): State<SharedState>) -> Json<Decision> {
    let mut state_guard = state.write().await;
    Json(state_guard.engine.evaluate(Utc::now()))
}

/// Return the last computed decision.
#[utoipa::path(
    get,
    path = "/api/mode/latest",
    tag = "mode",
    operation_id = "getLatestMode",
    summary = "Get the last computed decision",
    description = "Returns the most recent decision without re-evaluating.",
    responses(
        (status = 200, description = "Cached decision", body = Decision),
        (status = 404, description = "Nothing has been evaluated yet", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn get_latest_mode(State(state): State<SharedState>) -> ApiResult<Json<Decision>> {
    let state_guard = state.read().await;
    state_guard
        .engine
        .latest_decision()
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound {
            error_code: "no_decision".to_string(),
            message: "No decision has been evaluated yet".to_string(),
        })
}

/// Evaluate an explicit snapshot.
#[utoipa::path(
    post,
    path = "/api/mode/evaluate",
    tag = "mode",
    operation_id = "evaluateSnapshot",
    summary = "Evaluate a hypothetical context",
    description = "Runs the resolver against the current rules and the supplied \
        snapshot. Nothing is cached or changed.",
    request_body = ContextSnapshot,
    responses(
        (status = 200, description = "Decision computed", body = Decision)
    )
)]
pub async fn evaluate_snapshot(
    State(state): State<SharedState>,
    ApiJson(snapshot): ApiJson<ContextSnapshot>,
) -> Json<Decision> {
    let state_guard = state.read().await;
    Json(state_guard.engine.evaluate_snapshot(&snapshot))
}
