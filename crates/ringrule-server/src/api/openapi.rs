//! OpenAPI document generation for the ringrule API.
//!
//! The document is served at `/api/openapi.json`, browsable through Swagger UI
//! at `/swagger-ui`, and written to `openapi.json` by the `gen-openapi`
//! binary for client generation.

use axum::Json;
use ringrule_core::{
    ActiveOverride, CallStateChanged, CandidateSource, ContextSnapshot, Decision, GeoPoint,
    GeofenceEvent, IngestOutcome, LocationRule, LocationRulePatch, LocationSample,
    ManualOverride, NewLocationRule, NewTimeRule, OverrideFlag, RingerMode, Rule, RuleKind,
    Settings, SettingsUpdate, Suggestion, TimeRule, TimeRulePatch, TimeRulePatchRequest,
    TimeRuleRequest, TrailEntry, Transition,
};
use utoipa::OpenApi;

use super::config::{ConfigResponse, UpdateSettingsResponse};
use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::overrides::{ClearManualResponse, OverridesResponse, SetManualRequest};
use super::rules::RulesResponse;
use super::suggestion::{FeedbackRequest, FeedbackResponse, SuggestionResponse};

/// Serve the OpenAPI document as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI document as a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for ringrule.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ringrule API",
        version = "0.1.0",
        description = r#"
# ringrule API

ringrule decides which ringer mode (normal, vibrate, silent) a phone should
be in, from the rules the user configured and the current context.

## Overview

1. **Rules**: geofenced location rules and weekly time rules, each with a target mode and a priority
2. **Inputs**: location samples and call state changes from the device
3. **Overrides**: emergency contacts ring through, suspected spam is silenced, and a manual choice beats every rule
4. **Decisions**: one effective mode plus the ranked trail of every candidate considered
5. **Suggestions**: an advisory mode learned from past manual choices

## Precedence

Emergency call > spam call > manual override > highest-priority active rule >
default mode. Equal priorities go to location rules over time rules, then to
the oldest rule.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local ringrule server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "mode", description = "Effective ringer mode and decision trail"),
        (name = "rules", description = "Location and time rule management"),
        (name = "inputs", description = "Location samples and call state from the device"),
        (name = "overrides", description = "Emergency, spam and manual overrides"),
        (name = "suggestion", description = "Advisory mode suggestions and learning feedback"),
        (name = "config", description = "Configuration and feature toggles")
    ),
    paths(
        // Health endpoints
        super::health::health_check,
        // Mode endpoints
        super::mode::get_mode,
        super::mode::get_latest_mode,
        super::mode::evaluate_snapshot,
        // Rule endpoints
        super::rules::list_rules,
        super::rules::get_rule,
        super::rules::create_location_rule,
        super::rules::update_location_rule,
        super::rules::create_time_rule,
        super::rules::update_time_rule,
        super::rules::delete_rule,
        // Input endpoints
        super::location::ingest_location,
        super::calls::call_state_changed,
        // Override endpoints
        super::overrides::get_overrides,
        super::overrides::set_manual_override,
        super::overrides::clear_manual_override,
        // Suggestion endpoints
        super::suggestion::get_suggestion,
        super::suggestion::record_feedback,
        // Config endpoints
        super::config::get_config,
        super::config::update_settings,
    ),
    components(
        schemas(
            // Error types
            ErrorResponse,
            // Health types
            HealthResponse,
            // Core types
            RingerMode,
            GeoPoint,
            RuleKind,
            // Rule types
            Rule,
            LocationRule,
            TimeRule,
            NewLocationRule,
            NewTimeRule,
            LocationRulePatch,
            TimeRulePatch,
            TimeRuleRequest,
            TimeRulePatchRequest,
            RulesResponse,
            // Decision types
            Decision,
            TrailEntry,
            CandidateSource,
            ContextSnapshot,
            // Input types
            LocationSample,
            IngestOutcome,
            GeofenceEvent,
            Transition,
            CallStateChanged,
            // Override types
            OverrideFlag,
            ActiveOverride,
            ManualOverride,
            OverridesResponse,
            SetManualRequest,
            ClearManualResponse,
            // Suggestion types
            Suggestion,
            SuggestionResponse,
            FeedbackRequest,
            FeedbackResponse,
            // Config types
            ConfigResponse,
            Settings,
            SettingsUpdate,
            UpdateSettingsResponse,
        )
    )
)]
pub struct ApiDoc;
