//! Geofence membership tracking with hysteresis.
//!
//! The tracker turns irregular location samples into stable
//! [`GeofenceEvent`]s. A rule only flips to inside once a sample lands within
//! `radius - margin`, and only flips back once a sample lands beyond
//! `radius + margin`; anything in between keeps the previous state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::config::GeofenceConfig;
use crate::store::{RuleChange, RuleSet};
use crate::types::{GeoPoint, RuleId};

/// A position report from the location service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "lat": 37.7749,
    "lon": -122.4194,
    "accuracy_m": 12.5,
    "timestamp": "2025-01-13T10:15:00Z"
}))]
pub struct LocationSample {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Reported horizontal accuracy in meters.
    pub accuracy_m: f64,
    /// When the fix was taken.
    pub timestamp: DateTime<Utc>,
}

impl LocationSample {
    /// The sample's position.
    #[must_use]
    pub const fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// Direction of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// The device moved inside the geofence.
    Entered,
    /// The device left the geofence.
    Exited,
}

/// A single geofence state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GeofenceEvent {
    /// Rule whose geofence was crossed.
    pub rule_id: RuleId,
    /// Entered or exited.
    pub transition: Transition,
    /// Timestamp of the sample that caused it.
    pub at: DateTime<Utc>,
}

/// Why a sample was ignored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StaleInputError {
    /// The sample is older than the staleness window.
    #[error("location sample from {sample_at} is older than {max_age_secs}s (now {now})")]
    TooOld {
        /// Sample timestamp.
        sample_at: DateTime<Utc>,
        /// Evaluation time.
        now: DateTime<Utc>,
        /// Configured staleness window.
        max_age_secs: u64,
    },

    /// A newer sample has already been accepted.
    #[error("location sample from {sample_at} predates last accepted sample at {last_at}")]
    OutOfOrder {
        /// Sample timestamp.
        sample_at: DateTime<Utc>,
        /// Timestamp of the newest accepted sample.
        last_at: DateTime<Utc>,
    },

    /// The coordinates are not a valid position.
    #[error("location sample has invalid coordinates ({lat}, {lon})")]
    InvalidCoordinates {
        /// Reported latitude.
        lat: String,
        /// Reported longitude.
        lon: String,
    },
}

/// Per-rule inside/outside state derived from location samples.
#[derive(Debug, Clone)]
pub struct GeofenceTracker {
    hysteresis_ratio: f64,
    staleness: Duration,
    inside: BTreeMap<RuleId, bool>,
    last_sample: Option<LocationSample>,
}

impl GeofenceTracker {
    /// Create a tracker with no known membership.
    #[must_use]
    pub fn new(config: &GeofenceConfig) -> Self {
        Self {
            hysteresis_ratio: config.hysteresis_ratio,
            staleness: config.staleness(),
            inside: BTreeMap::new(),
            last_sample: None,
        }
    }

    /// Start tracking every enabled location rule in `rules`, all outside.
    pub fn sync_all(&mut self, rules: &RuleSet) {
        self.inside = rules
            .location_rules()
            .filter(|rule| rule.enabled)
            .map(|rule| (rule.id, false))
            .collect();
    }

    /// Refresh derived state after a rule-store mutation.
    ///
    /// New and reshaped rules start outside and are re-derived from the next
    /// sample. Other edits keep the current membership. Removed or disabled
    /// rules are dropped.
    pub fn apply_change(&mut self, change: RuleChange, rules: &RuleSet) {
        let id = match change {
            RuleChange::Removed(id) => {
                self.inside.remove(&id);
                return;
            }
            RuleChange::Added(id) | RuleChange::Updated(id) | RuleChange::Reshaped(id) => id,
        };
        if !rules.location_rule(id).is_some_and(|rule| rule.enabled) {
            self.inside.remove(&id);
            return;
        }
        if matches!(change, RuleChange::Updated(_)) {
            self.inside.entry(id).or_insert(false);
        } else if self.inside.insert(id, false) == Some(true) {
            debug!(rule_id = %id, "Geofence reset after rule reshape");
        }
    }

    /// Feed one sample, returning the transitions it caused.
    ///
    /// `now` is the caller's current time; the tracker never reads a clock.
    ///
    /// # Errors
    ///
    /// Returns [`StaleInputError`] when the sample is too old, arrives out of
    /// order or has impossible coordinates. State is left untouched.
    pub fn ingest(
        &mut self,
        sample: LocationSample,
        now: DateTime<Utc>,
        rules: &RuleSet,
    ) -> Result<Vec<GeofenceEvent>, StaleInputError> {
        self.check_sample(&sample, now)?;
        self.last_sample = Some(sample);

        let position = sample.point();
        let mut events = Vec::new();

        for rule in rules.location_rules().filter(|rule| rule.enabled) {
            let was_inside = self.inside.get(&rule.id).copied().unwrap_or(false);
            let distance = position.distance_m(&rule.center);
            let margin = rule.radius_m * self.hysteresis_ratio;

            let now_inside = if was_inside {
                distance <= rule.radius_m + margin
            } else {
                distance <= rule.radius_m - margin
            };
            self.inside.insert(rule.id, now_inside);

            if now_inside != was_inside {
                let transition = if now_inside {
                    Transition::Entered
                } else {
                    Transition::Exited
                };
                info!(
                    rule_id = %rule.id,
                    name = %rule.name,
                    ?transition,
                    distance_m = distance,
                    "Geofence transition"
                );
                events.push(GeofenceEvent {
                    rule_id: rule.id,
                    transition,
                    at: sample.timestamp,
                });
            }
        }

        Ok(events)
    }

    /// Rules currently inside, or nothing if the last sample has gone stale.
    #[must_use]
    pub fn inside_rules(&self, now: DateTime<Utc>) -> BTreeSet<RuleId> {
        if !self.has_fresh_sample(now) {
            return BTreeSet::new();
        }
        self.inside
            .iter()
            .filter_map(|(id, inside)| inside.then_some(*id))
            .collect()
    }

    /// Position of the last accepted sample, if still fresh.
    #[must_use]
    pub fn last_position(&self, now: DateTime<Utc>) -> Option<GeoPoint> {
        self.last_sample
            .filter(|_| self.has_fresh_sample(now))
            .map(|sample| sample.point())
    }

    /// Whether the given rule is currently considered inside.
    #[must_use]
    pub fn is_inside(&self, id: RuleId) -> bool {
        self.inside.get(&id).copied().unwrap_or(false)
    }

    fn has_fresh_sample(&self, now: DateTime<Utc>) -> bool {
        self.last_sample
            .is_some_and(|sample| now - sample.timestamp <= self.staleness)
    }

    fn check_sample(
        &self,
        sample: &LocationSample,
        now: DateTime<Utc>,
    ) -> Result<(), StaleInputError> {
        if !sample.point().is_valid() {
            return Err(StaleInputError::InvalidCoordinates {
                lat: sample.lat.to_string(),
                lon: sample.lon.to_string(),
            });
        }
        if now - sample.timestamp > self.staleness {
            return Err(StaleInputError::TooOld {
                sample_at: sample.timestamp,
                now,
                max_age_secs: u64::try_from(self.staleness.num_seconds()).unwrap_or(0),
            });
        }
        if let Some(last) = self.last_sample {
            if sample.timestamp < last.timestamp {
                return Err(StaleInputError::OutOfOrder {
                    sample_at: sample.timestamp,
                    last_at: last.timestamp,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{LocationRulePatch, NewLocationRule};
    use crate::store::RuleStore;
    use crate::types::{RingerMode, EARTH_RADIUS_M};
    use chrono::TimeZone;

    const CENTER: GeoPoint = GeoPoint::new(48.8566, 2.3522);

    /// A point `meters` due north of the test center.
    fn north_of_center(meters: f64) -> GeoPoint {
        let dlat = (meters / EARTH_RADIUS_M).to_degrees();
        GeoPoint::new(CENTER.lat + dlat, CENTER.lon)
    }

    fn sample_at(point: GeoPoint, at: DateTime<Utc>) -> LocationSample {
        LocationSample {
            lat: point.lat,
            lon: point.lon,
            accuracy_m: 5.0,
            timestamp: at,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 13, 10, 0, 0).unwrap()
    }

    fn setup(radius_m: f64) -> (RuleStore, RuleId, GeofenceTracker) {
        let mut store = RuleStore::new();
        let id = store
            .add_location(NewLocationRule {
                name: "Library".into(),
                address: None,
                center: CENTER,
                radius_m,
                mode: RingerMode::Silent,
                priority: 5,
                enabled: true,
            })
            .unwrap();
        let mut tracker = GeofenceTracker::new(&GeofenceConfig::default());
        tracker.sync_all(&store.snapshot());
        (store, id, tracker)
    }

    #[test]
    fn test_enter_and_exit_once() {
        let (store, id, mut tracker) = setup(100.0);
        let rules = store.snapshot();
        let now = t0();

        let events = tracker
            .ingest(sample_at(north_of_center(10.0), now), now, &rules)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transition, Transition::Entered);
        assert_eq!(events[0].rule_id, id);

        // Repeated samples in the same zone are idempotent
        let later = now + Duration::seconds(5);
        let events = tracker
            .ingest(sample_at(north_of_center(20.0), later), later, &rules)
            .unwrap();
        assert!(events.is_empty());

        let later = now + Duration::seconds(10);
        let events = tracker
            .ingest(sample_at(north_of_center(500.0), later), later, &rules)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transition, Transition::Exited);
        assert!(!tracker.is_inside(id));
    }

    #[test]
    fn test_boundary_jitter_does_not_flap() {
        let radius = 100.0;
        let (store, _, mut tracker) = setup(radius);
        let rules = store.snapshot();
        let mut now = t0();
        let mut entered = 0;
        let mut exited = 0;

        for i in 0..20 {
            let offset = if i % 2 == 0 { -1.0 } else { 1.0 };
            let sample = sample_at(north_of_center(radius + offset), now);
            for event in tracker.ingest(sample, now, &rules).unwrap() {
                match event.transition {
                    Transition::Entered => entered += 1,
                    Transition::Exited => exited += 1,
                }
            }
            now += Duration::seconds(3);
        }

        assert!(entered <= 1);
        assert!(exited <= 1);
    }

    #[test]
    fn test_hysteresis_band_keeps_inside() {
        let (store, id, mut tracker) = setup(100.0);
        let rules = store.snapshot();
        let now = t0();

        tracker
            .ingest(sample_at(north_of_center(50.0), now), now, &rules)
            .unwrap();
        assert!(tracker.is_inside(id));

        // 105 m is past the radius but within the 10 m margin
        let later = now + Duration::seconds(1);
        let events = tracker
            .ingest(sample_at(north_of_center(105.0), later), later, &rules)
            .unwrap();
        assert!(events.is_empty());
        assert!(tracker.is_inside(id));
    }

    #[test]
    fn test_stale_sample_is_ignored() {
        let (store, id, mut tracker) = setup(100.0);
        let rules = store.snapshot();
        let now = t0();
        let old = now - Duration::seconds(121);

        let err = tracker
            .ingest(sample_at(north_of_center(0.0), old), now, &rules)
            .unwrap_err();
        assert!(matches!(err, StaleInputError::TooOld { max_age_secs: 120, .. }));
        assert!(!tracker.is_inside(id));
    }

    #[test]
    fn test_out_of_order_sample_is_ignored() {
        let (store, id, mut tracker) = setup(100.0);
        let rules = store.snapshot();
        let now = t0();

        tracker
            .ingest(sample_at(north_of_center(500.0), now), now, &rules)
            .unwrap();
        let earlier = now - Duration::seconds(5);
        let err = tracker
            .ingest(sample_at(north_of_center(0.0), earlier), now, &rules)
            .unwrap_err();
        assert!(matches!(err, StaleInputError::OutOfOrder { .. }));
        assert!(!tracker.is_inside(id));
    }

    #[test]
    fn test_membership_degrades_when_samples_stop() {
        let (store, id, mut tracker) = setup(100.0);
        let rules = store.snapshot();
        let now = t0();

        tracker
            .ingest(sample_at(north_of_center(0.0), now), now, &rules)
            .unwrap();
        assert!(tracker.inside_rules(now).contains(&id));
        assert!(tracker.last_position(now).is_some());

        let much_later = now + Duration::seconds(300);
        assert!(tracker.inside_rules(much_later).is_empty());
        assert!(tracker.last_position(much_later).is_none());
    }

    #[test]
    fn test_rule_changes_refresh_state() {
        let (mut store, id, mut tracker) = setup(100.0);
        let now = t0();
        tracker
            .ingest(sample_at(north_of_center(0.0), now), now, &store.snapshot())
            .unwrap();
        assert!(tracker.is_inside(id));

        store
            .update_location(
                id,
                LocationRulePatch {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        for change in store.drain_changes() {
            tracker.apply_change(change, &store.snapshot());
        }
        assert!(!tracker.is_inside(id));
        assert!(tracker.inside_rules(now).is_empty());
    }

    fn apply_all(store: &mut RuleStore, tracker: &mut GeofenceTracker) {
        for change in store.drain_changes() {
            tracker.apply_change(change, &store.snapshot());
        }
    }

    #[test]
    fn test_rename_keeps_membership() {
        let (mut store, id, mut tracker) = setup(100.0);
        let now = t0();
        tracker
            .ingest(sample_at(CENTER, now), now, &store.snapshot())
            .unwrap();
        store.drain_changes();

        let rename = LocationRulePatch {
            name: Some("Main Library".into()),
            priority: Some(9),
            ..Default::default()
        };
        store.update_location(id, rename).unwrap();
        apply_all(&mut store, &mut tracker);
        assert!(tracker.is_inside(id));

        // Still inside, so the next sample is not a new entry
        let later = now + Duration::seconds(30);
        let events = tracker
            .ingest(sample_at(CENTER, later), later, &store.snapshot())
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_radius_change_resets_membership() {
        let (mut store, id, mut tracker) = setup(100.0);
        let now = t0();
        tracker
            .ingest(sample_at(CENTER, now), now, &store.snapshot())
            .unwrap();
        store.drain_changes();

        let grow = LocationRulePatch {
            radius_m: Some(200.0),
            ..Default::default()
        };
        store.update_location(id, grow).unwrap();
        apply_all(&mut store, &mut tracker);
        assert!(!tracker.is_inside(id));

        let later = now + Duration::seconds(30);
        let events = tracker
            .ingest(sample_at(CENTER, later), later, &store.snapshot())
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].transition, Transition::Entered);
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        let (store, _, mut tracker) = setup(100.0);
        let now = t0();
        let bad = sample_at(GeoPoint::new(120.0, 0.0), now);
        let err = tracker.ingest(bad, now, &store.snapshot()).unwrap_err();
        assert!(matches!(err, StaleInputError::InvalidCoordinates { .. }));
    }
}
