//! Configuration API endpoints.
//!
//! Exposes the effective configuration and lets the settings screen flip the
//! four feature toggles. Changes apply immediately and are written back to
//! the configuration file.

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use ringrule_core::{RingerMode, Settings, SettingsUpdate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::extract::ApiJson;
use crate::state::SharedState;

/// Creates the config router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_config))
        .route("/settings", put(update_settings))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Current configuration response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "timezone": "America/Los_Angeles",
    "default_mode": "normal",
    "hysteresis_ratio": 0.1,
    "staleness_secs": 120,
    "emergency_mode": "normal",
    "spam_mode": "silent",
    "settings": {
        "emergency_enabled": true,
        "spam_enabled": true,
        "learning_enabled": true,
        "suggestions_enabled": true
    }
}))]
pub struct ConfigResponse {
    /// Timezone time rules are evaluated in (IANA format).
    #[schema(example = "America/Los_Angeles")]
    pub timezone: String,

    /// Mode used when nothing applies.
    pub default_mode: RingerMode,

    /// Geofence hysteresis margin as a fraction of the radius.
    #[schema(example = 0.1)]
    pub hysteresis_ratio: f64,

    /// Location samples older than this are ignored.
    #[schema(example = 120)]
    pub staleness_secs: u64,

    /// Mode forced while an emergency contact is calling.
    pub emergency_mode: RingerMode,

    /// Mode forced during a suspected spam call.
    pub spam_mode: RingerMode,

    /// Feature toggles.
    pub settings: Settings,
}

/// Response after updating settings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateSettingsResponse {
    /// Whether the update was successful.
    pub success: bool,

    /// Settings after the update.
    pub settings: Settings,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get current configuration.
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "config",
    operation_id = "getConfig",
    summary = "Get current configuration",
    description = "Returns the effective configuration, including the feature \
        toggles shown on the settings screen.",
    responses(
        (status = 200, description = "Configuration retrieved", body = ConfigResponse)
    )
)]
pub async fn get_config(State(state): State<SharedState>) -> Json<ConfigResponse> {
    let state_guard = state.read().await;
    let engine = &state_guard.engine;
    let config = engine.config();

    Json(ConfigResponse {
        timezone: config.system.timezone.name().to_string(),
        default_mode: config.engine.default_mode,
        hysteresis_ratio: config.geofence.hysteresis_ratio,
        staleness_secs: config.geofence.staleness_secs,
        emergency_mode: config.overrides.emergency_mode,
        spam_mode: config.overrides.spam_mode,
        settings: engine.settings(),
    })
}

/// Update feature toggles.
#[utoipa::path(
    put,
    path = "/api/config/settings",
    tag = "config",
    operation_id = "updateSettings",
    summary = "Update feature toggles",
    description = "Changes only the supplied toggles. Turning off emergency or \
        spam handling clears a raised flag immediately.",
    request_body = SettingsUpdate,
    responses(
        (status = 200, description = "Settings updated", body = UpdateSettingsResponse),
        (status = 500, description = "Configuration could not be saved; settings unchanged", body = ErrorResponse)
    )
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<SettingsUpdate>,
) -> ApiResult<Json<UpdateSettingsResponse>> {
    let mut state_guard = state.write().await;
    let settings = state_guard.update_settings(request).map_err(|e| ApiError::InternalError {
        error_code: "config_save_failed".to_string(),
        message: "Failed to save configuration".to_string(),
        details: Some(e.to_string()),
    })?;

    Ok(Json(UpdateSettingsResponse {
        success: true,
        settings,
    }))
}
