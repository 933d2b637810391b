//! Location and time rule definitions and their validation.
//!
//! Rules are plain data. Every constructor and patch goes through
//! [`NewLocationRule::validate`] / [`NewTimeRule::validate`] so the
//! [`RuleStore`](crate::store::RuleStore) never holds an invalid rule.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{GeoPoint, RingerMode, RuleId, TimeOfDay, WeekdaySet};

/// Maximum length of a rule name, in characters.
pub const MAX_NAME_LENGTH: usize = 100;

/// Largest accepted geofence radius, in meters.
pub const MAX_RADIUS_M: f64 = 100_000.0;

/// A rule field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    /// Name of the offending field (e.g. `radius_m`).
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for `field`.
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Result type for rule validation.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Which family a rule belongs to.
///
/// The declaration order is the tie-break order: a location rule beats a
/// time rule of equal priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Geofenced rule.
    Location,
    /// Recurring weekly time window.
    Time,
}

/// A geofenced rule: inside the circle, use `mode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "01927b4e-8f2a-7cc0-9a9e-3f4f1d2c8b10",
    "name": "Library",
    "address": "789 Knowledge Rd",
    "center": {"lat": 37.7749, "lon": -122.4194},
    "radius_m": 30.0,
    "mode": "silent",
    "priority": 5,
    "enabled": true
}))]
pub struct LocationRule {
    /// Unique id.
    pub id: RuleId,
    /// Display name.
    pub name: String,
    /// Free-form address label, display only.
    #[serde(default)]
    pub address: Option<String>,
    /// Center of the geofence.
    pub center: GeoPoint,
    /// Geofence radius in meters.
    pub radius_m: f64,
    /// Mode to apply while inside.
    pub mode: RingerMode,
    /// Higher wins.
    pub priority: i32,
    /// Disabled rules are never candidates.
    pub enabled: bool,
}

/// A recurring weekly window: between `start` and `end` on `days`, use `mode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": "01927b4e-8f2a-7cc0-9a9e-3f4f1d2c8b11",
    "name": "Work hours",
    "start": "09:00",
    "end": "17:00",
    "days": ["Mon", "Tue", "Wed", "Thu", "Fri"],
    "mode": "vibrate",
    "priority": 5,
    "enabled": true
}))]
pub struct TimeRule {
    /// Unique id.
    pub id: RuleId,
    /// Display name.
    pub name: String,
    /// Window start, local time.
    #[schema(value_type = String, example = "22:00")]
    pub start: TimeOfDay,
    /// Window end, local time. Earlier than `start` means the window wraps past midnight.
    #[schema(value_type = String, example = "07:00")]
    pub end: TimeOfDay,
    /// Days on which the window starts.
    #[schema(value_type = Vec<String>, example = json!(["Mon", "Tue"]))]
    pub days: WeekdaySet,
    /// Mode to apply while active.
    pub mode: RingerMode,
    /// Higher wins.
    pub priority: i32,
    /// Disabled rules are never candidates.
    pub enabled: bool,
}

impl LocationRule {
    /// Whether `other` covers exactly the same area.
    #[must_use]
    pub fn same_geofence(&self, other: &Self) -> bool {
        self.center == other.center && self.radius_m.to_bits() == other.radius_m.to_bits()
    }
}

impl TimeRule {
    /// Whether `other` is active at exactly the same times.
    #[must_use]
    pub fn same_window(&self, other: &Self) -> bool {
        self.start == other.start && self.end == other.end && self.days == other.days
    }

    /// Whether the window crosses midnight.
    #[must_use]
    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }
}

/// Either kind of rule, as listed by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    /// A geofenced rule.
    Location(LocationRule),
    /// A weekly time window.
    Time(TimeRule),
}

impl Rule {
    /// Id of the wrapped rule.
    #[must_use]
    pub const fn id(&self) -> RuleId {
        match self {
            Self::Location(rule) => rule.id,
            Self::Time(rule) => rule.id,
        }
    }

    /// Kind of the wrapped rule.
    #[must_use]
    pub const fn kind(&self) -> RuleKind {
        match self {
            Self::Location(_) => RuleKind::Location,
            Self::Time(_) => RuleKind::Time,
        }
    }

    /// Display name of the wrapped rule.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Location(rule) => &rule.name,
            Self::Time(rule) => &rule.name,
        }
    }

    /// Whether the wrapped rule is enabled.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        match self {
            Self::Location(rule) => rule.enabled,
            Self::Time(rule) => rule.enabled,
        }
    }
}

const fn default_enabled() -> bool {
    true
}

/// Fields of a location rule before it gets an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Library",
    "center": {"lat": 37.7749, "lon": -122.4194},
    "radius_m": 30.0,
    "mode": "silent",
    "priority": 5
}))]
pub struct NewLocationRule {
    /// Display name.
    pub name: String,
    /// Free-form address label.
    #[serde(default)]
    pub address: Option<String>,
    /// Center of the geofence.
    pub center: GeoPoint,
    /// Radius in meters, must be positive.
    pub radius_m: f64,
    /// Mode to apply while inside.
    pub mode: RingerMode,
    /// Higher wins. Defaults to 0.
    #[serde(default)]
    pub priority: i32,
    /// Defaults to `true`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl NewLocationRule {
    /// Check every field, reporting the first violation.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the offending field.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        if !self.center.lat.is_finite() || !(-90.0..=90.0).contains(&self.center.lat) {
            return Err(ValidationError::new(
                "center.lat",
                "latitude must be between -90 and 90",
            ));
        }
        if !self.center.lon.is_finite() || !(-180.0..=180.0).contains(&self.center.lon) {
            return Err(ValidationError::new(
                "center.lon",
                "longitude must be between -180 and 180",
            ));
        }
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Err(ValidationError::new("radius_m", "radius must be greater than 0"));
        }
        if self.radius_m > MAX_RADIUS_M {
            return Err(ValidationError::new(
                "radius_m",
                format!("radius must be at most {MAX_RADIUS_M} meters"),
            ));
        }
        Ok(())
    }

    /// Attach an id, producing the stored rule.
    #[must_use]
    pub fn into_rule(self, id: RuleId) -> LocationRule {
        LocationRule {
            id,
            name: self.name.trim().to_string(),
            address: self.address,
            center: self.center,
            radius_m: self.radius_m,
            mode: self.mode,
            priority: self.priority,
            enabled: self.enabled,
        }
    }
}

impl From<&LocationRule> for NewLocationRule {
    fn from(rule: &LocationRule) -> Self {
        Self {
            name: rule.name.clone(),
            address: rule.address.clone(),
            center: rule.center,
            radius_m: rule.radius_m,
            mode: rule.mode,
            priority: rule.priority,
            enabled: rule.enabled,
        }
    }
}

/// Fields of a time rule before it gets an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Night",
    "start": "22:00",
    "end": "07:00",
    "days": ["Mon", "Tue", "Wed", "Thu", "Fri"],
    "mode": "silent"
}))]
pub struct NewTimeRule {
    /// Display name.
    pub name: String,
    /// Window start, `HH:MM`.
    #[schema(value_type = String)]
    pub start: TimeOfDay,
    /// Window end, `HH:MM`.
    #[schema(value_type = String)]
    pub end: TimeOfDay,
    /// Days on which the window starts, non-empty.
    #[schema(value_type = Vec<String>)]
    pub days: WeekdaySet,
    /// Mode to apply while active.
    pub mode: RingerMode,
    /// Higher wins. Defaults to 0.
    #[serde(default)]
    pub priority: i32,
    /// Defaults to `true`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl NewTimeRule {
    /// Check every field, reporting the first violation.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the offending field.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_name(&self.name)?;
        if self.start == self.end {
            return Err(ValidationError::new(
                "end",
                "start and end must differ (zero-length windows are not allowed)",
            ));
        }
        if self.days.is_empty() {
            return Err(ValidationError::new("days", "at least one weekday is required"));
        }
        Ok(())
    }

    /// Attach an id, producing the stored rule.
    #[must_use]
    pub fn into_rule(self, id: RuleId) -> TimeRule {
        TimeRule {
            id,
            name: self.name.trim().to_string(),
            start: self.start,
            end: self.end,
            days: self.days,
            mode: self.mode,
            priority: self.priority,
            enabled: self.enabled,
        }
    }
}

impl From<&TimeRule> for NewTimeRule {
    fn from(rule: &TimeRule) -> Self {
        Self {
            name: rule.name.clone(),
            start: rule.start,
            end: rule.end,
            days: rule.days,
            mode: rule.mode,
            priority: rule.priority,
            enabled: rule.enabled,
        }
    }
}

/// Partial update of a location rule. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationRulePatch {
    /// New name.
    pub name: Option<String>,
    /// New address label.
    pub address: Option<String>,
    /// New center.
    pub center: Option<GeoPoint>,
    /// New radius.
    pub radius_m: Option<f64>,
    /// New mode.
    pub mode: Option<RingerMode>,
    /// New priority.
    pub priority: Option<i32>,
    /// Enable or disable.
    pub enabled: Option<bool>,
}

impl LocationRulePatch {
    /// Apply onto `rule`, validating the result before anything changes.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] and leaves `rule` untouched when the
    /// patched rule would be invalid.
    pub fn apply(self, rule: &LocationRule) -> ValidationResult<LocationRule> {
        let mut draft = NewLocationRule::from(rule);
        if let Some(name) = self.name {
            draft.name = name;
        }
        if let Some(address) = self.address {
            draft.address = Some(address);
        }
        if let Some(center) = self.center {
            draft.center = center;
        }
        if let Some(radius) = self.radius_m {
            draft.radius_m = radius;
        }
        if let Some(mode) = self.mode {
            draft.mode = mode;
        }
        if let Some(priority) = self.priority {
            draft.priority = priority;
        }
        if let Some(enabled) = self.enabled {
            draft.enabled = enabled;
        }
        draft.validate()?;
        Ok(draft.into_rule(rule.id))
    }
}

/// Partial update of a time rule. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeRulePatch {
    /// New name.
    pub name: Option<String>,
    /// New start time.
    #[schema(value_type = Option<String>)]
    pub start: Option<TimeOfDay>,
    /// New end time.
    #[schema(value_type = Option<String>)]
    pub end: Option<TimeOfDay>,
    /// New weekday set.
    #[schema(value_type = Option<Vec<String>>)]
    pub days: Option<WeekdaySet>,
    /// New mode.
    pub mode: Option<RingerMode>,
    /// New priority.
    pub priority: Option<i32>,
    /// Enable or disable.
    pub enabled: Option<bool>,
}

impl TimeRulePatch {
    /// Apply onto `rule`, validating the result before anything changes.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] and leaves `rule` untouched when the
    /// patched rule would be invalid.
    pub fn apply(self, rule: &TimeRule) -> ValidationResult<TimeRule> {
        let mut draft = NewTimeRule::from(rule);
        if let Some(name) = self.name {
            draft.name = name;
        }
        if let Some(start) = self.start {
            draft.start = start;
        }
        if let Some(end) = self.end {
            draft.end = end;
        }
        if let Some(days) = self.days {
            draft.days = days;
        }
        if let Some(mode) = self.mode {
            draft.mode = mode;
        }
        if let Some(priority) = self.priority {
            draft.priority = priority;
        }
        if let Some(enabled) = self.enabled {
            draft.enabled = enabled;
        }
        draft.validate()?;
        Ok(draft.into_rule(rule.id))
    }
}

/// A time rule as a client submits it, with times and weekdays still text.
///
/// Parsing happens in [`TimeRuleRequest::parse`] so that a bad `HH:MM` or
/// weekday is reported as a [`ValidationError`] on that field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Night",
    "start": "22:00",
    "end": "07:00",
    "days": ["Mon", "Tue", "Wed", "Thu", "Fri"],
    "mode": "silent"
}))]
pub struct TimeRuleRequest {
    /// Display name.
    pub name: String,
    /// Window start, `HH:MM`.
    pub start: String,
    /// Window end, `HH:MM`.
    pub end: String,
    /// Days on which the window starts, e.g. `["Mon", "Tue"]`.
    pub days: Vec<String>,
    /// Mode to apply while active.
    pub mode: RingerMode,
    /// Higher wins. Defaults to 0.
    #[serde(default)]
    pub priority: i32,
    /// Defaults to `true`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl TimeRuleRequest {
    /// Parse times and weekdays.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] on `start`, `end` or `days`.
    pub fn parse(self) -> ValidationResult<NewTimeRule> {
        Ok(NewTimeRule {
            start: parse_time("start", &self.start)?,
            end: parse_time("end", &self.end)?,
            days: parse_days(&self.days)?,
            name: self.name,
            mode: self.mode,
            priority: self.priority,
            enabled: self.enabled,
        })
    }
}

/// Textual form of [`TimeRulePatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeRulePatchRequest {
    /// New name.
    pub name: Option<String>,
    /// New start time, `HH:MM`.
    pub start: Option<String>,
    /// New end time, `HH:MM`.
    pub end: Option<String>,
    /// New weekdays.
    pub days: Option<Vec<String>>,
    /// New mode.
    pub mode: Option<RingerMode>,
    /// New priority.
    pub priority: Option<i32>,
    /// Enable or disable.
    pub enabled: Option<bool>,
}

impl TimeRulePatchRequest {
    /// Parse the supplied times and weekdays.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] on `start`, `end` or `days`.
    pub fn parse(self) -> ValidationResult<TimeRulePatch> {
        Ok(TimeRulePatch {
            start: self.start.as_deref().map(|s| parse_time("start", s)).transpose()?,
            end: self.end.as_deref().map(|s| parse_time("end", s)).transpose()?,
            days: self.days.as_deref().map(parse_days).transpose()?,
            name: self.name,
            mode: self.mode,
            priority: self.priority,
            enabled: self.enabled,
        })
    }
}

fn parse_time(field: &'static str, value: &str) -> ValidationResult<TimeOfDay> {
    value
        .trim()
        .parse()
        .map_err(|message: String| ValidationError::new(field, message))
}

fn parse_days(days: &[String]) -> ValidationResult<WeekdaySet> {
    days.iter()
        .map(|day| {
            day.trim()
                .parse::<Weekday>()
                .map_err(|_| ValidationError::new("days", format!("'{day}' is not a weekday")))
        })
        .collect()
}

fn validate_name(name: &str) -> ValidationResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("name", "name cannot be empty"));
    }
    let len = trimmed.chars().count();
    if len > MAX_NAME_LENGTH {
        return Err(ValidationError::new(
            "name",
            format!("name exceeds maximum length of {MAX_NAME_LENGTH} characters (got {len})"),
        ));
    }
    Ok(())
}
