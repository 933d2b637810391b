//! Shared value types and OpenAPI schemas.
//!
//! These are the small, copyable building blocks used by every other module:
//! ringer modes, rule identifiers, geographic points, times of day and
//! weekday sets.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The phone ringer mode chosen by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RingerMode {
    /// Ring and vibrate normally.
    #[default]
    Normal,
    /// Vibrate only.
    Vibrate,
    /// No sound, no vibration.
    Silent,
}

impl RingerMode {
    /// All modes, loudest first.
    pub const ALL: [Self; 3] = [Self::Normal, Self::Vibrate, Self::Silent];

    /// Rank used to break ties toward the quieter mode.
    #[must_use]
    pub const fn quietness(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Vibrate => 1,
            Self::Silent => 2,
        }
    }

    /// Lowercase name, as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Vibrate => "vibrate",
            Self::Silent => "silent",
        }
    }
}

impl fmt::Display for RingerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identifier of a location or time rule.
///
/// Ids are UUID v7 values, so their ordering follows creation order. The
/// resolver relies on that ordering as its final tie-break.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
#[schema(value_type = String, format = Uuid)]
pub struct RuleId(Uuid);

impl RuleId {
    /// Generate a fresh, time-ordered id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RuleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"lat": 37.7749, "lon": -122.4194}))]
pub struct GeoPoint {
    /// Latitude, -90 to 90.
    pub lat: f64,
    /// Longitude, -180 to 180.
    pub lon: f64,
}

/// Mean Earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

impl GeoPoint {
    /// Create a point.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in meters (haversine).
    #[must_use]
    pub fn distance_m(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Whether both coordinates are finite and within WGS84 bounds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

static TIME_OF_DAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("valid time-of-day regex"));

/// Check whether a string is a strict 24h `HH:MM` time.
#[must_use]
pub fn is_valid_time_of_day(s: &str) -> bool {
    TIME_OF_DAY_RE.is_match(s)
}

/// A wall-clock time with minute precision, serialized as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Minutes in a day.
    pub const MINUTES_PER_DAY: u16 = 24 * 60;

    /// Build from hour and minute. Returns `None` when out of range.
    #[must_use]
    pub const fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self(hour * 60 + minute))
        } else {
            None
        }
    }

    /// Minutes since midnight.
    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }

    /// Truncate a chrono time to minute precision.
    #[must_use]
    pub fn from_naive(time: NaiveTime) -> Self {
        // hour() < 24 and minute() < 60 always hold
        #[allow(clippy::cast_possible_truncation)]
        Self((time.hour() * 60 + time.minute()) as u16)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = TIME_OF_DAY_RE
            .captures(s)
            .ok_or_else(|| format!("'{s}' is not a valid HH:MM time"))?;
        let hour: u16 = caps[1].parse().map_err(|_| format!("bad hour in '{s}'"))?;
        let minute: u16 = caps[2].parse().map_err(|_| format!("bad minute in '{s}'"))?;
        Self::from_hm(hour, minute).ok_or_else(|| format!("'{s}' is out of range"))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// A set of weekdays, serialized as a list such as `["Mon", "Tue"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Weekday>", into = "Vec<Weekday>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    /// No days.
    pub const EMPTY: Self = Self(0);

    /// Monday through Friday.
    #[must_use]
    pub fn weekdays() -> Self {
        [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
            .into_iter()
            .collect()
    }

    /// Every day of the week.
    #[must_use]
    pub const fn every_day() -> Self {
        Self(0b111_1111)
    }

    /// Whether `day` is in the set.
    #[must_use]
    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1u8 << day.num_days_from_monday()) != 0
    }

    /// Add a day.
    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1u8 << day.num_days_from_monday();
    }

    /// Whether the set has no days.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Days in Monday-first order.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        (0..7u8)
            .filter(move |bit| self.0 & (1u8 << *bit) != 0)
            .filter_map(|bit| Weekday::try_from(bit).ok())
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl From<Vec<Weekday>> for WeekdaySet {
    fn from(days: Vec<Weekday>) -> Self {
        days.into_iter().collect()
    }
}

impl From<WeekdaySet> for Vec<Weekday> {
    fn from(set: WeekdaySet) -> Self {
        set.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ringer_mode_serializes_lowercase() {
        let json = serde_json::to_string(&RingerMode::Vibrate).unwrap();
        assert_eq!(json, "\"vibrate\"");
        let mode: RingerMode = serde_json::from_str("\"silent\"").unwrap();
        assert_eq!(mode, RingerMode::Silent);
    }

    #[test]
    fn test_rule_ids_follow_creation_order() {
        let first = RuleId::generate();
        let second = RuleId::generate();
        assert!(first < second);
    }

    #[test]
    fn test_distance_known_value() {
        // One degree of latitude is roughly 111.2 km
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        let d = a.distance_m(&b);
        assert!((d - 111_195.0).abs() < 50.0, "got {d}");
        assert!(a.distance_m(&a).abs() < f64::EPSILON);
    }

    #[test]
    fn test_geo_point_validity() {
        assert!(GeoPoint::new(45.0, 90.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_time_of_day_parsing() {
        let t: TimeOfDay = "22:05".parse().unwrap();
        assert_eq!(t.minutes(), 22 * 60 + 5);
        assert_eq!(t.to_string(), "22:05");

        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("7:00".parse::<TimeOfDay>().is_err());
        assert!("07:60".parse::<TimeOfDay>().is_err());
        assert!(is_valid_time_of_day("00:00"));
        assert!(!is_valid_time_of_day("noon"));
    }

    #[test]
    fn test_time_of_day_serde() {
        let t: TimeOfDay = serde_json::from_str("\"09:30\"").unwrap();
        assert_eq!(t, TimeOfDay::from_hm(9, 30).unwrap());
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"09:30\"");
        assert!(serde_json::from_str::<TimeOfDay>("\"9am\"").is_err());
    }

    #[test]
    fn test_weekday_set() {
        let set = WeekdaySet::weekdays();
        assert!(set.contains(Weekday::Mon));
        assert!(set.contains(Weekday::Fri));
        assert!(!set.contains(Weekday::Sat));
        assert!(WeekdaySet::EMPTY.is_empty());
        assert_eq!(WeekdaySet::every_day().iter().count(), 7);
    }

    #[test]
    fn test_weekday_set_serde() {
        let set: WeekdaySet = serde_json::from_str(r#"["Mon", "Wed"]"#).unwrap();
        assert!(set.contains(Weekday::Mon));
        assert!(set.contains(Weekday::Wed));
        assert!(!set.contains(Weekday::Tue));
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["Mon","Wed"]"#);
    }
}
