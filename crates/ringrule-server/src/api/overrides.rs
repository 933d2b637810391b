//! Override flag endpoints.
//!
//! The manual override is the user picking a mode on the home screen. It
//! persists across restarts until cleared or replaced, and each choice is
//! also recorded as learning feedback when learning is enabled.

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use ringrule_core::{ActiveOverride, ManualOverride, RingerMode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::api::extract::ApiJson;
use crate::state::SharedState;

/// Creates the overrides router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_overrides))
        .route("/manual", put(set_manual_override).delete(clear_manual_override))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Overrides currently in force.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "active": [
        {"flag": "manual_override", "mode": "vibrate", "since": "2025-01-13T10:15:00Z"}
    ]
}))]
pub struct OverridesResponse {
    /// Active overrides, highest precedence first.
    pub active: Vec<ActiveOverride>,
}

/// Request to set the manual override.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({"mode": "vibrate"}))]
pub struct SetManualRequest {
    /// Mode to force.
    pub mode: RingerMode,
}

/// Response after clearing the manual override.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClearManualResponse {
    /// Whether a manual override was set.
    pub cleared: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// List active overrides.
#[utoipa::path(
    get,
    path = "/api/overrides",
    tag = "overrides",
    operation_id = "getOverrides",
    summary = "List active overrides",
    responses(
        (status = 200, description = "Overrides retrieved", body = OverridesResponse)
    )
)]
pub async fn get_overrides(State(state): State<SharedState>) -> Json<OverridesResponse> {
    let state_guard = state.read().await;
    Json(OverridesResponse {
        active: state_guard.engine.overrides(),
    })
}

/// Set (or replace) the manual override.
#[utoipa::path(
    put,
    path = "/api/overrides/manual",
    tag = "overrides",
    operation_id = "setManualOverride",
    summary = "Set the manual override",
    description = "Forces a mode above every rule until cleared. Emergency and \
        spam overrides still take precedence while a call is active.",
    request_body = SetManualRequest,
    responses(
        (status = 200, description = "Manual override set", body = ManualOverride),
        (status = 500, description = "Could not persist", body = ErrorResponse)
    )
)]
pub async fn set_manual_override(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<SetManualRequest>,
) -> ApiResult<Json<ManualOverride>> {
    let mut state_guard = state.write().await;
    Ok(Json(
        state_guard
            .engine
            .set_manual_override(request.mode, Utc::now())?,
    ))
}

/// Clear the manual override.
#[utoipa::path(
    delete,
    path = "/api/overrides/manual",
    tag = "overrides",
    operation_id = "clearManualOverride",
    summary = "Clear the manual override",
    responses(
        (status = 200, description = "Manual override cleared", body = ClearManualResponse),
        (status = 500, description = "Could not persist", body = ErrorResponse)
    )
)]
pub async fn clear_manual_override(
    State(state): State<SharedState>,
) -> ApiResult<Json<ClearManualResponse>> {
    let mut state_guard = state.write().await;
    let cleared = state_guard.engine.clear_manual_override()?;
    Ok(Json(ClearManualResponse { cleared }))
}
