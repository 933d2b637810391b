//! Location sample intake.
//!
//! The location service posts fixes here. Samples that are too old, out of
//! order or malformed are logged and dropped; the response says so with
//! `accepted: false` instead of failing the request.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use ringrule_core::{IngestOutcome, LocationSample};

use crate::api::extract::ApiJson;
use crate::state::SharedState;

/// Creates the location router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(ingest_location))
}

/// Feed one location sample.
#[utoipa::path(
    post,
    path = "/api/location",
    tag = "inputs",
    operation_id = "ingestLocation",
    summary = "Report a location sample",
    description = "Updates geofence membership and returns any enter/exit \
        transitions. Stale samples are ignored and reported with \
        `accepted: false`.",
    request_body = LocationSample,
    responses(
        (status = 200, description = "Sample processed", body = IngestOutcome)
    )
)]
pub async fn ingest_location(
    State(state): State<SharedState>,
    ApiJson(sample): ApiJson<LocationSample>,
) -> Json<IngestOutcome> {
    let mut state_guard = state.write().await;
    Json(state_guard.engine.ingest_location(sample, Utc::now()))
}
