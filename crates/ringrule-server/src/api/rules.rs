//! Rule management API endpoints.
//!
//! Location rules (geofences) and time rules (weekly windows) share one id
//! space. Creation and updates are validated by the core; an invalid request
//! leaves the rule list untouched and answers 400 with the offending field.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use ringrule_core::{
    LocationRule, LocationRulePatch, NewLocationRule, Rule, RuleId, TimeRule,
    TimeRulePatchRequest, TimeRuleRequest,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::api::extract::ApiJson;
use crate::state::SharedState;

/// Creates the rules router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_rules))
        .route("/{id}", get(get_rule).delete(delete_rule))
        .route("/locations", post(create_location_rule))
        .route("/locations/{id}", patch(update_location_rule))
        .route("/schedules", post(create_time_rule))
        .route("/schedules/{id}", patch(update_time_rule))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// All rules, in creation order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RulesResponse {
    /// Location and time rules.
    pub rules: Vec<Rule>,
    /// Total number of rules.
    #[schema(example = 2)]
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// List every rule.
#[utoipa::path(
    get,
    path = "/api/rules",
    tag = "rules",
    operation_id = "listRules",
    summary = "List rules",
    description = "Returns every location and time rule in creation order.",
    responses(
        (status = 200, description = "Rules retrieved", body = RulesResponse)
    )
)]
pub async fn list_rules(State(state): State<SharedState>) -> Json<RulesResponse> {
    let state_guard = state.read().await;
    let rules = state_guard.engine.list_rules();
    Json(RulesResponse {
        total: rules.len(),
        rules,
    })
}

/// Get one rule.
#[utoipa::path(
    get,
    path = "/api/rules/{id}",
    tag = "rules",
    operation_id = "getRule",
    summary = "Get a rule",
    params(("id" = String, Path, description = "Rule id")),
    responses(
        (status = 200, description = "Rule found", body = Rule),
        (status = 404, description = "No such rule", body = ErrorResponse)
    )
)]
pub async fn get_rule(
    State(state): State<SharedState>,
    Path(id): Path<RuleId>,
) -> ApiResult<Json<Rule>> {
    let state_guard = state.read().await;
    Ok(Json(state_guard.engine.get_rule(id)?))
}

/// Create a location rule.
#[utoipa::path(
    post,
    path = "/api/rules/locations",
    tag = "rules",
    operation_id = "createLocationRule",
    summary = "Create a location rule",
    description = "Adds a geofence. Overlapping geofences are allowed; priority \
        decides between them.",
    request_body = NewLocationRule,
    responses(
        (status = 201, description = "Rule created", body = LocationRule),
        (status = 400, description = "Invalid field", body = ErrorResponse)
    )
)]
pub async fn create_location_rule(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<NewLocationRule>,
) -> ApiResult<(StatusCode, Json<LocationRule>)> {
    let mut state_guard = state.write().await;
    let rule = state_guard.engine.add_location_rule(request)?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Patch a location rule.
#[utoipa::path(
    patch,
    path = "/api/rules/locations/{id}",
    tag = "rules",
    operation_id = "updateLocationRule",
    summary = "Update a location rule",
    description = "Changes only the supplied fields. Moving the center or \
        changing the radius resets the rule's geofence state until the next \
        location sample; other edits keep it.",
    params(("id" = String, Path, description = "Rule id")),
    request_body = LocationRulePatch,
    responses(
        (status = 200, description = "Rule updated", body = LocationRule),
        (status = 400, description = "Invalid field", body = ErrorResponse),
        (status = 404, description = "No such location rule", body = ErrorResponse)
    )
)]
pub async fn update_location_rule(
    State(state): State<SharedState>,
    Path(id): Path<RuleId>,
    ApiJson(request): ApiJson<LocationRulePatch>,
) -> ApiResult<Json<LocationRule>> {
    let mut state_guard = state.write().await;
    Ok(Json(state_guard.engine.update_location_rule(id, request)?))
}

/// Create a time rule.
#[utoipa::path(
    post,
    path = "/api/rules/schedules",
    tag = "rules",
    operation_id = "createTimeRule",
    summary = "Create a time rule",
    description = "Adds a weekly window. A window whose end is before its start \
        wraps past midnight and belongs to the day it starts on.",
    request_body = TimeRuleRequest,
    responses(
        (status = 201, description = "Rule created", body = TimeRule),
        (status = 400, description = "Invalid field", body = ErrorResponse)
    )
)]
pub async fn create_time_rule(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<TimeRuleRequest>,
) -> ApiResult<(StatusCode, Json<TimeRule>)> {
    let rule = request.parse()?;
    let mut state_guard = state.write().await;
    let rule = state_guard.engine.add_time_rule(rule)?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Patch a time rule.
#[utoipa::path(
    patch,
    path = "/api/rules/schedules/{id}",
    tag = "rules",
    operation_id = "updateTimeRule",
    summary = "Update a time rule",
    params(("id" = String, Path, description = "Rule id")),
    request_body = TimeRulePatchRequest,
    responses(
        (status = 200, description = "Rule updated", body = TimeRule),
        (status = 400, description = "Invalid field", body = ErrorResponse),
        (status = 404, description = "No such time rule", body = ErrorResponse)
    )
)]
pub async fn update_time_rule(
    State(state): State<SharedState>,
    Path(id): Path<RuleId>,
    ApiJson(request): ApiJson<TimeRulePatchRequest>,
) -> ApiResult<Json<TimeRule>> {
    let patch = request.parse()?;
    let mut state_guard = state.write().await;
    Ok(Json(state_guard.engine.update_time_rule(id, patch)?))
}

/// Delete a rule.
#[utoipa::path(
    delete,
    path = "/api/rules/{id}",
    tag = "rules",
    operation_id = "deleteRule",
    summary = "Delete a rule",
    params(("id" = String, Path, description = "Rule id")),
    responses(
        (status = 200, description = "Rule deleted", body = Rule),
        (status = 404, description = "No such rule", body = ErrorResponse)
    )
)]
pub async fn delete_rule(
    State(state): State<SharedState>,
    Path(id): Path<RuleId>,
) -> ApiResult<Json<Rule>> {
    let mut state_guard = state.write().await;
    Ok(Json(state_guard.engine.remove_rule(id)?))
}
