//! Endpoint tests against the real router.

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Utc;
use ringrule_core::{
    CandidateSource, Decision, IngestOutcome, LocationRule, OverrideFlag, RingerMode,
    RingruleConfig, TimeRule,
};
use ringrule_server::api::config::{ConfigResponse, UpdateSettingsResponse};
use ringrule_server::api::create_router;
use ringrule_server::api::overrides::{ClearManualResponse, OverridesResponse};
use ringrule_server::api::rules::RulesResponse;
use ringrule_server::api::suggestion::{FeedbackResponse, SuggestionResponse};
use ringrule_server::api::ErrorResponse;
use ringrule_server::state::AppState;
use serde_json::json;
use tempfile::TempDir;

fn server_in(dir: &TempDir) -> TestServer {
    let mut config = RingruleConfig::default();
    config.system.data_dir = Some(dir.path().join("data"));
    let state = AppState::new(config, Some(dir.path().join("config.toml")))
        .unwrap()
        .into_shared();
    TestServer::new(create_router(state)).unwrap()
}

fn library_body() -> serde_json::Value {
    json!({
        "name": "Library",
        "address": "789 Knowledge Rd",
        "center": {"lat": 37.7749, "lon": -122.4194},
        "radius_m": 30.0,
        "mode": "silent",
        "priority": 5
    })
}

fn window_body(start: &str, end: &str, mode: &str, priority: i32) -> serde_json::Value {
    json!({
        "name": format!("{start}-{end}"),
        "start": start,
        "end": end,
        "days": ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"],
        "mode": mode,
        "priority": priority
    })
}

#[tokio::test]
async fn test_health() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["persistent"], true);
}

#[tokio::test]
async fn test_default_mode_with_no_rules() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);

    server
        .get("/api/mode/latest")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let decision: Decision = server.get("/api/mode").await.json();
    assert_eq!(decision.mode, RingerMode::Normal);
    assert!(decision.winner.is_none());

    let latest: Decision = server.get("/api/mode/latest").await.json();
    assert_eq!(latest, decision);
}

#[tokio::test]
async fn test_rule_crud() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);

    let response = server.post("/api/rules/locations").json(&library_body()).await;
    response.assert_status(StatusCode::CREATED);
    let rule: LocationRule = response.json();
    assert_eq!(rule.name, "Library");
    assert!(rule.enabled);

    let updated: LocationRule = server
        .patch(&format!("/api/rules/locations/{}", rule.id))
        .json(&json!({"radius_m": 50.0, "priority": 7}))
        .await
        .json();
    assert!((updated.radius_m - 50.0).abs() < f64::EPSILON);
    assert_eq!(updated.priority, 7);
    assert_eq!(updated.id, rule.id);

    let list: RulesResponse = server.get("/api/rules").await.json();
    assert_eq!(list.total, 1);

    server
        .delete(&format!("/api/rules/{}", rule.id))
        .await
        .assert_status_ok();
    server
        .get(&format!("/api/rules/{}", rule.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_rule_is_rejected() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);

    let mut body = library_body();
    body["radius_m"] = json!(-5.0);
    let response = server.post("/api/rules/locations").json(&body).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let error: ErrorResponse = response.json();
    assert_eq!(error.error, "invalid_rule");
    assert_eq!(error.details.unwrap()["field"], "radius_m");

    let response = server
        .post("/api/rules/schedules")
        .json(&json!({
            "name": "Broken",
            "start": "09:00",
            "end": "09:00",
            "days": ["Mon"],
            "mode": "vibrate"
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let list: RulesResponse = server.get("/api/rules").await.json();
    assert_eq!(list.total, 0);
}

#[tokio::test]
async fn test_malformed_schedule_names_field() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);

    let mut body = window_body("25:00", "07:00", "silent", 0);
    let response = server.post("/api/rules/schedules").json(&body).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let error: ErrorResponse = response.json();
    assert_eq!(error.error, "invalid_rule");
    assert_eq!(error.details.unwrap()["field"], "start");

    body["start"] = json!("22:00");
    body["days"] = json!(["Mon", "Funday"]);
    let response = server.post("/api/rules/schedules").json(&body).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let error: ErrorResponse = response.json();
    assert_eq!(error.details.unwrap()["field"], "days");

    body["days"] = json!(["Mon"]);
    body["mode"] = json!("loud");
    let response = server.post("/api/rules/schedules").json(&body).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let error: ErrorResponse = response.json();
    assert_eq!(error.error, "invalid_request");

    let rule: TimeRule = server
        .post("/api/rules/schedules")
        .json(&window_body("22:00", "07:00", "silent", 0))
        .await
        .json();
    let response = server
        .patch(&format!("/api/rules/schedules/{}", rule.id))
        .json(&json!({"end": "7:5"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let error: ErrorResponse = response.json();
    assert_eq!(error.details.unwrap()["field"], "end");

    let list: RulesResponse = server.get("/api/rules").await.json();
    assert_eq!(list.total, 1);
}

#[tokio::test]
async fn test_rename_keeps_geofence_mode() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);
    let rule: LocationRule = server
        .post("/api/rules/locations")
        .json(&library_body())
        .await
        .json();
    server
        .post("/api/location")
        .json(&json!({
            "lat": 37.7749,
            "lon": -122.4194,
            "accuracy_m": 10.0,
            "timestamp": Utc::now()
        }))
        .await
        .assert_status_ok();

    server
        .patch(&format!("/api/rules/locations/{}", rule.id))
        .json(&json!({"name": "Main Library"}))
        .await
        .assert_status_ok();

    let decision: Decision = server.get("/api/mode").await.json();
    assert_eq!(decision.mode, RingerMode::Silent);
}

#[tokio::test]
async fn test_location_sample_enters_geofence() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);
    let rule: LocationRule = server
        .post("/api/rules/locations")
        .json(&library_body())
        .await
        .json();

    let outcome: IngestOutcome = server
        .post("/api/location")
        .json(&json!({
            "lat": 37.7749,
            "lon": -122.4194,
            "accuracy_m": 10.0,
            "timestamp": Utc::now()
        }))
        .await
        .json();
    assert!(outcome.accepted);
    assert_eq!(outcome.events.len(), 1);

    let decision: Decision = server.get("/api/mode").await.json();
    assert_eq!(decision.mode, RingerMode::Silent);
    assert_eq!(
        decision.winner,
        Some(CandidateSource::Rule {
            rule_kind: ringrule_core::RuleKind::Location,
            id: rule.id,
        })
    );
}

#[tokio::test]
async fn test_stale_sample_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);

    let response = server
        .post("/api/location")
        .json(&json!({
            "lat": 37.7749,
            "lon": -122.4194,
            "accuracy_m": 10.0,
            "timestamp": "2020-01-01T00:00:00Z"
        }))
        .await;
    response.assert_status_ok();
    let outcome: IngestOutcome = response.json();
    assert!(!outcome.accepted);
    assert!(outcome.reason.is_some());
}

#[tokio::test]
async fn test_emergency_call_rings_through() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);
    // Two windows that together cover every minute of every day
    for (start, end) in [("00:00", "12:00"), ("12:00", "00:00")] {
        let rule: TimeRule = server
            .post("/api/rules/schedules")
            .json(&window_body(start, end, "silent", 10))
            .await
            .json();
        assert_eq!(rule.priority, 10);
    }

    let decision: Decision = server
        .post("/api/calls")
        .json(&json!({
            "is_emergency_contact": true,
            "is_suspected_spam": false,
            "active": true
        }))
        .await
        .json();
    assert_eq!(decision.mode, RingerMode::Normal);
    assert_eq!(
        decision.winner,
        Some(CandidateSource::Override {
            flag: OverrideFlag::EmergencyActive
        })
    );

    let decision: Decision = server
        .post("/api/calls")
        .json(&json!({
            "is_emergency_contact": false,
            "is_suspected_spam": false,
            "active": false
        }))
        .await
        .json();
    assert_eq!(decision.mode, RingerMode::Silent);
}

#[tokio::test]
async fn test_manual_override_lifecycle() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);

    server
        .put("/api/overrides/manual")
        .json(&json!({"mode": "vibrate"}))
        .await
        .assert_status_ok();

    let overrides: OverridesResponse = server.get("/api/overrides").await.json();
    assert_eq!(overrides.active.len(), 1);
    assert_eq!(overrides.active[0].flag, OverrideFlag::ManualOverride);

    let decision: Decision = server.get("/api/mode").await.json();
    assert_eq!(decision.mode, RingerMode::Vibrate);

    let cleared: ClearManualResponse = server.delete("/api/overrides/manual").await.json();
    assert!(cleared.cleared);
    let cleared: ClearManualResponse = server.delete("/api/overrides/manual").await.json();
    assert!(!cleared.cleared);
}

#[tokio::test]
async fn test_manual_override_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let server = server_in(&dir);
        server
            .put("/api/overrides/manual")
            .json(&json!({"mode": "silent"}))
            .await
            .assert_status_ok();
        server
            .post("/api/rules/locations")
            .json(&library_body())
            .await
            .assert_status(StatusCode::CREATED);
    }

    let server = server_in(&dir);
    let list: RulesResponse = server.get("/api/rules").await.json();
    assert_eq!(list.total, 1);
    let decision: Decision = server.get("/api/mode").await.json();
    assert_eq!(decision.mode, RingerMode::Silent);
}

#[tokio::test]
async fn test_settings_toggle_is_saved() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);

    let response: UpdateSettingsResponse = server
        .put("/api/config/settings")
        .json(&json!({"spam_enabled": false, "learning_enabled": false}))
        .await
        .json();
    assert!(response.success);
    assert!(!response.settings.spam_enabled);
    assert!(response.settings.emergency_enabled);

    let config: ConfigResponse = server.get("/api/config").await.json();
    assert!(!config.settings.spam_enabled);
    assert_eq!(config.spam_mode, RingerMode::Silent);

    let saved = RingruleConfig::load(Some(&dir.path().join("config.toml"))).unwrap();
    assert!(!saved.overrides.spam_enabled);
    assert!(!saved.advisor.learning_enabled);

    // Spam calls no longer raise an override
    let decision: Decision = server
        .post("/api/calls")
        .json(&json!({
            "is_emergency_contact": false,
            "is_suspected_spam": true,
            "active": true
        }))
        .await
        .json();
    assert_eq!(decision.mode, RingerMode::Normal);

    let feedback: FeedbackResponse = server
        .post("/api/suggestion/feedback")
        .json(&json!({"mode": "silent"}))
        .await
        .json();
    assert!(!feedback.recorded);
}

#[tokio::test]
async fn test_unsaved_settings_are_not_applied() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();

    let mut config = RingruleConfig::default();
    config.system.data_dir = Some(dir.path().join("data"));
    let state = AppState::new(config, Some(blocker.join("config.toml")))
        .unwrap()
        .into_shared();
    let server = TestServer::new(create_router(state)).unwrap();

    let response = server
        .put("/api/config/settings")
        .json(&json!({"spam_enabled": false}))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = response.json();
    assert_eq!(error.error, "config_save_failed");

    let config: ConfigResponse = server.get("/api/config").await.json();
    assert!(config.settings.spam_enabled);
}

#[tokio::test]
async fn test_suggestion_after_feedback() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);

    let empty: SuggestionResponse = server.get("/api/suggestion").await.json();
    assert!(empty.suggestion.is_none());

    for _ in 0..3 {
        let feedback: FeedbackResponse = server
            .post("/api/suggestion/feedback")
            .json(&json!({"mode": "vibrate"}))
            .await
            .json();
        assert!(feedback.recorded);
    }

    let response: SuggestionResponse = server.get("/api/suggestion").await.json();
    let suggestion = response.suggestion.unwrap();
    assert_eq!(suggestion.mode, RingerMode::Vibrate);
    assert_eq!(suggestion.support, 3);
}

#[tokio::test]
async fn test_openapi_served() {
    let dir = TempDir::new().unwrap();
    let server = server_in(&dir);
    let response = server.get("/api/openapi.json").await;
    response.assert_status_ok();
    let doc: serde_json::Value = response.json();
    assert_eq!(doc["info"]["title"], "ringrule API");
}
