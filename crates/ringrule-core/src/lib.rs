//! # ringrule-core
//!
//! Core rule resolution engine for context-aware ringer mode switching.
//!
//! This crate provides:
//! - Location and time rules with validation
//! - Geofence membership tracking with hysteresis
//! - Weekly schedule evaluation, including windows that wrap past midnight
//! - Override flags (emergency contact, suspected spam, manual choice)
//! - A deterministic resolver producing one mode plus a ranked trail
//! - An advisory mode suggester learned from past manual choices
//! - Configuration management and JSON persistence
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`types`] - Ringer modes, rule ids, coordinates, times of day, weekday sets
//! - [`rules`] - Location and time rule definitions, patches, validation
//! - [`store`] - Copy-on-write rule store emitting change events
//! - [`geofence`] - Location samples to enter/exit transitions
//! - [`schedule`] - Wall-clock time to active time rules
//! - [`context`] - Override flags and call state handling
//! - [`resolver`] - Snapshot evaluation and tie-breaking
//! - [`advisor`] - Non-binding suggestions from user history
//! - [`engine`] - The façade that wires everything together
//! - [`config`] - Application configuration loading, saving, and validation
//! - [`storage`] - Persistent storage using JSON files
//! - [`error`] - Unified error types for the crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod advisor;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod geofence;
pub mod resolver;
pub mod rules;
pub mod schedule;
pub mod storage;
pub mod store;
pub mod types;

// Re-export primary types for convenience
pub use advisor::{Observation, Suggestion, SuggestionAdvisor};
pub use config::{
    is_valid_timezone, AdvisorConfig, ConfigError, ConfigResult, EngineConfig, GeofenceConfig,
    OverrideConfig, RingruleConfig, SystemConfig,
};
pub use context::{ActiveOverride, CallStateChanged, ContextGate, ManualOverride, OverrideFlag};
pub use engine::{Engine, IngestOutcome, Settings, SettingsUpdate};
pub use error::{Result, RingruleError};
pub use geofence::{GeofenceEvent, GeofenceTracker, LocationSample, StaleInputError, Transition};
pub use resolver::{CandidateSource, ContextSnapshot, Decision, Resolver, TrailEntry};
pub use rules::{
    LocationRule, LocationRulePatch, NewLocationRule, NewTimeRule, Rule, RuleKind, TimeRule,
    TimeRulePatch, TimeRulePatchRequest, TimeRuleRequest, ValidationError, MAX_NAME_LENGTH,
    MAX_RADIUS_M,
};
pub use schedule::{ScheduleClock, ScheduleTransition};
pub use storage::{default_data_dir, Storage, StorageError};
pub use store::{RuleChange, RuleSet, RuleStore, StoreError};
pub use types::{GeoPoint, RingerMode, RuleId, TimeOfDay, WeekdaySet};
