//! Advisory mode suggestions.
//!
//! Suggestions are never applied automatically; the presentation layer shows
//! them and the user decides.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use ringrule_core::{RingerMode, Suggestion};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::api::extract::ApiJson;
use crate::state::SharedState;

/// Creates the suggestion router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_suggestion))
        .route("/feedback", post(record_feedback))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Suggestion for the current context, if any.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuggestionResponse {
    /// `null` when suggestions are disabled or history is too thin.
    #[schema(nullable)]
    pub suggestion: Option<Suggestion>,
}

/// The mode the user actually wanted here and now.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({"mode": "silent"}))]
pub struct FeedbackRequest {
    /// Preferred mode.
    pub mode: RingerMode,
}

/// Response after recording feedback.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeedbackResponse {
    /// `false` when learning is disabled.
    pub recorded: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get a suggestion for the current context.
#[utoipa::path(
    get,
    path = "/api/suggestion",
    tag = "suggestion",
    operation_id = "getSuggestion",
    summary = "Get a suggested mode",
    description = "Suggests a mode based on what the user chose before at a \
        similar time and place. Advisory only.",
    responses(
        (status = 200, description = "Suggestion computed", body = SuggestionResponse)
    )
)]
pub async fn get_suggestion(State(state): State<SharedState>) -> Json<SuggestionResponse> {
    let state_guard = state.read().await;
    Json(SuggestionResponse {
        suggestion: state_guard.engine.suggest(Utc::now()),
    })
}

/// Record a preferred mode without setting an override.
#[utoipa::path(
    post,
    path = "/api/suggestion/feedback",
    tag = "suggestion",
    operation_id = "recordFeedback",
    summary = "Record mode feedback",
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback handled", body = FeedbackResponse),
        (status = 500, description = "Could not persist", body = ErrorResponse)
    )
)]
pub async fn record_feedback(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<FeedbackRequest>,
) -> ApiResult<Json<FeedbackResponse>> {
    let mut state_guard = state.write().await;
    let recorded = state_guard.engine.record_choice(request.mode, Utc::now())?;
    Ok(Json(FeedbackResponse { recorded }))
}
