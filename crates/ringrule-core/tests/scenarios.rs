//! End-to-end scenarios driving the engine through its public API.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ringrule_core::types::EARTH_RADIUS_M;
use ringrule_core::{
    CallStateChanged, CandidateSource, Engine, GeoPoint, LocationSample, NewLocationRule,
    NewTimeRule, OverrideFlag, RingerMode, RingruleConfig, RuleKind, Storage, Transition,
    WeekdaySet,
};
use tempfile::TempDir;

const LIBRARY: GeoPoint = GeoPoint::new(37.7749, -122.4194);

// 2025-01-13 is a Monday
fn monday(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 13, hour, minute, 0).unwrap()
}

/// A point `meters` due north of `origin`.
fn north_of(origin: GeoPoint, meters: f64) -> GeoPoint {
    GeoPoint::new(origin.lat + (meters / EARTH_RADIUS_M).to_degrees(), origin.lon)
}

fn sample(point: GeoPoint, at: DateTime<Utc>) -> LocationSample {
    LocationSample {
        lat: point.lat,
        lon: point.lon,
        accuracy_m: 8.0,
        timestamp: at,
    }
}

fn library(radius_m: f64) -> NewLocationRule {
    NewLocationRule {
        name: "Library".into(),
        address: Some("789 Knowledge Rd".into()),
        center: LIBRARY,
        radius_m,
        mode: RingerMode::Silent,
        priority: 5,
        enabled: true,
    }
}

fn work_hours() -> NewTimeRule {
    NewTimeRule {
        name: "Work hours".into(),
        start: "09:00".parse().unwrap(),
        end: "17:00".parse().unwrap(),
        days: WeekdaySet::weekdays(),
        mode: RingerMode::Vibrate,
        priority: 5,
        enabled: true,
    }
}

#[test]
fn test_library_during_work_hours_is_silent() {
    let mut engine = Engine::new(RingruleConfig::default());
    let library = engine.add_location_rule(library(30.0)).unwrap();
    let work = engine.add_time_rule(work_hours()).unwrap();

    let now = monday(10, 15);
    engine.ingest_location(sample(LIBRARY, now), now);
    let decision = engine.evaluate(now);

    assert_eq!(decision.mode, RingerMode::Silent);
    assert_eq!(
        decision.winner,
        Some(CandidateSource::Rule {
            rule_kind: RuleKind::Location,
            id: library.id,
        })
    );
    assert_eq!(decision.trail.len(), 2);
    assert!(decision.trail[0].selected);
    assert_eq!(
        decision.trail[1].source,
        CandidateSource::Rule {
            rule_kind: RuleKind::Time,
            id: work.id,
        }
    );
    assert!(!decision.trail[1].selected);
}

#[test]
fn test_emergency_call_beats_every_rule() {
    let mut engine = Engine::new(RingruleConfig::default());
    engine.add_location_rule(library(30.0)).unwrap();
    engine.add_time_rule(work_hours()).unwrap();
    let now = monday(10, 15);
    engine.ingest_location(sample(LIBRARY, now), now);
    engine.set_manual_override(RingerMode::Vibrate, now).unwrap();

    engine.on_call_state(
        CallStateChanged {
            is_emergency_contact: true,
            is_suspected_spam: false,
            active: true,
        },
        now,
    );
    let decision = engine.evaluate(now);
    assert_eq!(decision.mode, RingerMode::Normal);
    assert_eq!(
        decision.winner,
        Some(CandidateSource::Override {
            flag: OverrideFlag::EmergencyActive
        })
    );
    // Both overrides and both rules are still listed
    assert_eq!(decision.trail.len(), 4);
    assert_eq!(decision.trail.iter().filter(|entry| entry.selected).count(), 1);

    // Call ends, the manual override takes over again
    engine.on_call_state(
        CallStateChanged {
            is_emergency_contact: true,
            is_suspected_spam: false,
            active: false,
        },
        now + Duration::seconds(40),
    );
    assert_eq!(engine.evaluate(now + Duration::seconds(40)).mode, RingerMode::Vibrate);
}

#[test]
fn test_boundary_jitter_produces_single_transitions() {
    let mut engine = Engine::new(RingruleConfig::default());
    engine.add_location_rule(library(100.0)).unwrap();

    let start = monday(12, 0);
    let mut entered = 0;
    let mut exited = 0;
    let mut count = |events: &[ringrule_core::GeofenceEvent]| {
        for event in events {
            match event.transition {
                Transition::Entered => entered += 1,
                Transition::Exited => exited += 1,
            }
        }
    };

    let mut at = start;
    count(&engine.ingest_location(sample(LIBRARY, at), at).events[..]);
    for i in 0..20 {
        at += Duration::seconds(5);
        let meters = if i % 2 == 0 { 99.0 } else { 101.0 };
        let outcome = engine.ingest_location(sample(north_of(LIBRARY, meters), at), at);
        assert!(outcome.accepted);
        count(&outcome.events[..]);
    }
    at += Duration::seconds(5);
    count(&engine.ingest_location(sample(north_of(LIBRARY, 500.0), at), at).events[..]);

    assert_eq!((entered, exited), (1, 1));
}

#[test]
fn test_overnight_window_belongs_to_start_day() {
    let mut engine = Engine::new(RingruleConfig::default());
    engine
        .add_time_rule(NewTimeRule {
            name: "Night".into(),
            start: "22:00".parse().unwrap(),
            end: "07:00".parse().unwrap(),
            days: [chrono::Weekday::Mon].into_iter().collect(),
            mode: RingerMode::Silent,
            priority: 1,
            enabled: true,
        })
        .unwrap();

    assert_eq!(engine.evaluate(monday(23, 30)).mode, RingerMode::Silent);
    assert_eq!(
        engine.evaluate(monday(23, 30) + Duration::hours(5) + Duration::minutes(30)).mode,
        RingerMode::Silent
    );
    assert_eq!(engine.evaluate(monday(5, 0)).mode, RingerMode::Normal);
}

#[test]
fn test_default_mode_when_nothing_applies() {
    let mut config = RingruleConfig::default();
    config.engine.default_mode = RingerMode::Vibrate;
    let mut engine = Engine::new(config);
    engine.add_time_rule(work_hours()).unwrap();

    let decision = engine.evaluate(monday(20, 0));
    assert_eq!(decision.mode, RingerMode::Vibrate);
    assert!(decision.winner.is_none());
    assert!(decision.trail.is_empty());
}

#[test]
fn test_same_snapshot_same_decision() {
    let mut engine = Engine::new(RingruleConfig::default());
    engine.add_location_rule(library(30.0)).unwrap();
    engine.add_time_rule(work_hours()).unwrap();
    let now = monday(10, 15);
    engine.ingest_location(sample(LIBRARY, now), now);

    let snapshot = engine.snapshot(now);
    let first = engine.evaluate_snapshot(&snapshot);
    let second = engine.evaluate_snapshot(&snapshot);
    assert_eq!(first, second);
    assert_eq!(first.evaluated_at, now);
}

#[test]
fn test_location_goes_stale_without_samples() {
    let mut engine = Engine::new(RingruleConfig::default());
    engine.add_location_rule(library(30.0)).unwrap();
    let now = monday(10, 15);
    engine.ingest_location(sample(LIBRARY, now), now);
    assert_eq!(engine.evaluate(now).mode, RingerMode::Silent);

    let later = now + Duration::minutes(5);
    assert_eq!(engine.evaluate(later).mode, RingerMode::Normal);
}

#[test]
fn test_restart_restores_rules_and_manual_override() {
    let dir = TempDir::new().unwrap();
    let now = monday(10, 15);
    {
        let mut engine = Engine::with_storage(
            RingruleConfig::default(),
            Storage::new(dir.path().join("data")),
        )
        .unwrap();
        engine.add_location_rule(library(30.0)).unwrap();
        engine.add_time_rule(work_hours()).unwrap();
        engine.set_manual_override(RingerMode::Silent, now).unwrap();
    }

    let mut engine = Engine::with_storage(
        RingruleConfig::default(),
        Storage::new(dir.path().join("data")),
    )
    .unwrap();
    let names: Vec<String> = engine
        .list_rules()
        .iter()
        .map(|rule| rule.name().to_string())
        .collect();
    assert_eq!(names, vec!["Library", "Work hours"]);

    let decision = engine.evaluate(now);
    assert_eq!(
        decision.winner,
        Some(CandidateSource::Override {
            flag: OverrideFlag::ManualOverride
        })
    );
    assert_eq!(decision.mode, RingerMode::Silent);
}
