//! Call state intake from telephony.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use ringrule_core::{CallStateChanged, Decision};

use crate::api::extract::ApiJson;
use crate::state::SharedState;

/// Creates the calls router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(call_state_changed))
}

/// Apply a call state change and return the resulting decision.
#[utoipa::path(
    post,
    path = "/api/calls",
    tag = "inputs",
    operation_id = "callStateChanged",
    summary = "Report a call state change",
    description = "An active call from an emergency contact raises the emergency \
        override; an active suspected spam call raises the spam override. Either \
        only applies when its feature is enabled. `active: false` clears both. \
        The returned decision reflects the new state.",
    request_body = CallStateChanged,
    responses(
        (status = 200, description = "Override state updated", body = Decision)
    )
)]
pub async fn call_state_changed(
    State(state): State<SharedState>,
    ApiJson(call): ApiJson<CallStateChanged>,
) -> Json<Decision> {
    let now = Utc::now();
    let mut state_guard = state.write().await;
    state_guard.engine.on_call_state(call, now);
    Json(state_guard.engine.evaluate(now))
}
