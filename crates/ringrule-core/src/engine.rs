//! The engine façade wiring every component together.
//!
//! [`Engine`] owns the rule store, the derived-state trackers, the override
//! gate, the resolver and the advisor. It is synchronous and single-writer:
//! callers serialize mutations (the server keeps it behind an `RwLock`) and
//! pass `now` explicitly, so the engine never reads a clock itself.
//!
//! After every rule mutation the store's change queue is drained and
//! forwarded to the [`GeofenceTracker`] and [`ScheduleClock`]. When a
//! [`Storage`] is attached, rules, the manual override and advisor history
//! are written back after each change.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::advisor::{Observation, Suggestion, SuggestionAdvisor};
use crate::config::RingruleConfig;
use crate::context::{ActiveOverride, CallStateChanged, ContextGate, ManualOverride};
use crate::error::{Result, RingruleError};
use crate::geofence::{GeofenceEvent, GeofenceTracker, LocationSample};
use crate::resolver::{ContextSnapshot, Decision, Resolver};
use crate::rules::{
    LocationRule, LocationRulePatch, NewLocationRule, NewTimeRule, Rule, TimeRule, TimeRulePatch,
};
use crate::schedule::ScheduleClock;
use crate::storage::Storage;
use crate::store::{RuleSet, RuleStore, StoreResult};
use crate::types::{RingerMode, RuleId};

/// Result of feeding one location sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IngestOutcome {
    /// Whether the sample was used. Stale samples are dropped, not failed.
    pub accepted: bool,
    /// Geofence transitions caused by the sample.
    pub events: Vec<GeofenceEvent>,
    /// Why the sample was dropped.
    pub reason: Option<String>,
}

/// The user-facing feature toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Settings {
    /// Emergency contacts ring through every rule.
    pub emergency_enabled: bool,
    /// Suspected spam calls are silenced.
    pub spam_enabled: bool,
    /// Manual choices are recorded for learning.
    pub learning_enabled: bool,
    /// Suggestions are surfaced.
    pub suggestions_enabled: bool,
}

/// A partial update of [`Settings`]; absent fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SettingsUpdate {
    /// New emergency override toggle.
    pub emergency_enabled: Option<bool>,
    /// New spam detection toggle.
    pub spam_enabled: Option<bool>,
    /// New learning toggle.
    pub learning_enabled: Option<bool>,
    /// New suggestions toggle.
    pub suggestions_enabled: Option<bool>,
}

impl SettingsUpdate {
    /// Write the supplied toggles into `config`.
    pub fn apply_to(&self, config: &mut RingruleConfig) {
        if let Some(enabled) = self.emergency_enabled {
            config.overrides.emergency_enabled = enabled;
        }
        if let Some(enabled) = self.spam_enabled {
            config.overrides.spam_enabled = enabled;
        }
        if let Some(enabled) = self.learning_enabled {
            config.advisor.learning_enabled = enabled;
        }
        if let Some(enabled) = self.suggestions_enabled {
            config.advisor.suggestions_enabled = enabled;
        }
    }
}

/// The rule resolution engine.
#[derive(Debug)]
pub struct Engine {
    config: RingruleConfig,
    store: RuleStore,
    geofence: GeofenceTracker,
    schedule: ScheduleClock,
    gate: ContextGate,
    resolver: Resolver,
    advisor: SuggestionAdvisor,
    storage: Option<Storage>,
    latest: Option<Decision>,
}

impl Engine {
    /// Create an in-memory engine with no rules.
    #[must_use]
    pub fn new(config: RingruleConfig) -> Self {
        let tz = config.system.timezone;
        Self {
            store: RuleStore::new(),
            geofence: GeofenceTracker::new(&config.geofence),
            schedule: ScheduleClock::new(tz),
            gate: ContextGate::new(config.overrides.clone()),
            resolver: Resolver::new(config.engine.default_mode, tz),
            advisor: SuggestionAdvisor::new(config.advisor.clone(), tz),
            storage: None,
            latest: None,
            config,
        }
    }

    /// Create an engine backed by `storage`, restoring rules, the manual
    /// override and advisor history.
    ///
    /// # Errors
    ///
    /// Returns an error if persisted data cannot be read, is malformed, or
    /// holds a rule that fails validation.
    pub fn with_storage(config: RingruleConfig, storage: Storage) -> Result<Self> {
        let rules = storage.load_rules()?;
        let manual = storage.load_manual_override()?;
        let history = storage.load_history()?;

        let mut engine = Self::new(config);
        engine.store = RuleStore::from_rules(rules)?;
        engine.gate = engine.gate.with_manual(manual);
        engine.advisor = engine.advisor.with_history(history);
        engine.sync_changes();
        info!(
            data_dir = %storage.data_dir().display(),
            rules = engine.store.snapshot().len(),
            history = engine.advisor.len(),
            "Restored engine state"
        );
        engine.storage = Some(storage);
        Ok(engine)
    }

    /// The effective configuration.
    #[must_use]
    pub const fn config(&self) -> &RingruleConfig {
        &self.config
    }

    // =========================================================================
    // RULES
    // =========================================================================

    /// A stable snapshot of the rule set.
    #[must_use]
    pub fn rules(&self) -> Arc<RuleSet> {
        self.store.snapshot()
    }

    /// All rules in creation order.
    #[must_use]
    pub fn list_rules(&self) -> Vec<Rule> {
        self.store.list()
    }

    /// Look up one rule.
    ///
    /// # Errors
    ///
    /// Returns [`RingruleError::RuleNotFound`] if no rule has this id.
    pub fn get_rule(&self, id: RuleId) -> Result<Rule> {
        self.store
            .snapshot()
            .get(id)
            .cloned()
            .ok_or(RingruleError::RuleNotFound(id))
    }

    /// Add a location rule.
    ///
    /// # Errors
    ///
    /// Returns [`RingruleError::InvalidRule`] if a field is invalid, or a
    /// persistence error if the rule list cannot be saved.
    pub fn add_location_rule(&mut self, rule: NewLocationRule) -> Result<LocationRule> {
        let id = self.commit_rules(|store| store.add_location(rule))?;
        self.location_rule(id)
    }

    /// Add a time rule.
    ///
    /// # Errors
    ///
    /// See [`Engine::add_location_rule`].
    pub fn add_time_rule(&mut self, rule: NewTimeRule) -> Result<TimeRule> {
        let id = self.commit_rules(|store| store.add_time(rule))?;
        self.time_rule(id)
    }

    /// Patch a location rule.
    ///
    /// Moving the center or changing the radius resets its geofence state to
    /// outside; other edits keep it.
    ///
    /// # Errors
    ///
    /// Returns [`RingruleError::RuleNotFound`], [`RingruleError::InvalidRule`]
    /// or a persistence error.
    pub fn update_location_rule(
        &mut self,
        id: RuleId,
        patch: LocationRulePatch,
    ) -> Result<LocationRule> {
        self.commit_rules(|store| store.update_location(id, patch))
    }

    /// Patch a time rule.
    ///
    /// # Errors
    ///
    /// See [`Engine::update_location_rule`].
    pub fn update_time_rule(&mut self, id: RuleId, patch: TimeRulePatch) -> Result<TimeRule> {
        self.commit_rules(|store| store.update_time(id, patch))
    }

    /// Delete a rule of either kind.
    ///
    /// # Errors
    ///
    /// Returns [`RingruleError::RuleNotFound`] or a persistence error.
    pub fn remove_rule(&mut self, id: RuleId) -> Result<Rule> {
        self.commit_rules(|store| store.remove(id))
    }

    // =========================================================================
    // INPUTS
    // =========================================================================

    /// Feed one location sample.
    ///
    /// Stale samples are logged and dropped; they never fail the call.
    pub fn ingest_location(&mut self, sample: LocationSample, now: DateTime<Utc>) -> IngestOutcome {
        let rules = self.store.snapshot();
        match self.geofence.ingest(sample, now, &rules) {
            Ok(events) => IngestOutcome {
                accepted: true,
                events,
                reason: None,
            },
            Err(err) => {
                warn!(error = %err, "Ignoring location sample");
                IngestOutcome {
                    accepted: false,
                    events: Vec::new(),
                    reason: Some(err.to_string()),
                }
            }
        }
    }

    /// Apply a call state change from telephony.
    pub fn on_call_state(&mut self, call: CallStateChanged, now: DateTime<Utc>) {
        self.gate.on_call_state(call, now);
    }

    /// Set the manual override.
    ///
    /// The choice is also recorded as advisor feedback, in the context the
    /// user made it, when learning is enabled.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the override cannot be saved; the
    /// previous override then stays in force. A history that cannot be saved
    /// only drops the feedback.
    pub fn set_manual_override(
        &mut self,
        mode: RingerMode,
        now: DateTime<Utc>,
    ) -> Result<ManualOverride> {
        let manual = ManualOverride { mode, set_at: now };
        if let Some(storage) = &self.storage {
            storage.save_manual_override(Some(&manual))?;
        }

        let snapshot = self.snapshot(now);
        self.gate.set_manual(mode, now);
        if let Err(err) = self.record_and_persist(&snapshot, mode) {
            warn!(error = %err, "Dropping manual choice from learning history");
        }
        Ok(manual)
    }

    /// Clear the manual override. Returns whether one was set.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the change cannot be saved.
    pub fn clear_manual_override(&mut self) -> Result<bool> {
        if self.gate.manual().is_none() {
            return Ok(false);
        }
        if let Some(storage) = &self.storage {
            storage.save_manual_override(None)?;
        }
        Ok(self.gate.clear_manual())
    }

    /// Overrides currently in force, highest precedence first.
    #[must_use]
    pub fn overrides(&self) -> Vec<ActiveOverride> {
        self.gate.active()
    }

    /// The manual override, if set.
    #[must_use]
    pub const fn manual_override(&self) -> Option<&ManualOverride> {
        self.gate.manual()
    }

    // =========================================================================
    // EVALUATION
    // =========================================================================

    /// Capture the current context.
    #[must_use]
    pub fn snapshot(&self, now: DateTime<Utc>) -> ContextSnapshot {
        let mut snapshot = ContextSnapshot::new(now);
        snapshot.inside = self.geofence.inside_rules(now);
        snapshot.overrides = self.gate.active();
        if let Some(point) = self.geofence.last_position(now) {
            snapshot = snapshot.with_position(point);
        }
        snapshot
    }

    /// Evaluate the current context and cache the decision.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> Decision {
        let rules = self.store.snapshot();
        for transition in self.schedule.refresh(&rules, now) {
            info!(?transition, "Time rule changed state");
        }
        let snapshot = self.snapshot(now);
        let decision = self.resolver.evaluate(&rules, &snapshot);

        if self.latest.as_ref().map(|latest| latest.mode) != Some(decision.mode) {
            info!(mode = %decision.mode, reason = %decision.reason, "Effective mode changed");
        }
        self.latest = Some(decision.clone());
        decision
    }

    /// Evaluate an explicit snapshot without touching any state.
    #[must_use]
    pub fn evaluate_snapshot(&self, snapshot: &ContextSnapshot) -> Decision {
        self.resolver.evaluate(&self.store.snapshot(), snapshot)
    }

    /// The most recently computed decision.
    #[must_use]
    pub const fn latest_decision(&self) -> Option<&Decision> {
        self.latest.as_ref()
    }

    // =========================================================================
    // ADVISOR
    // =========================================================================

    /// Suggest a mode for the current context.
    #[must_use]
    pub fn suggest(&self, now: DateTime<Utc>) -> Option<Suggestion> {
        self.advisor.suggest(&self.snapshot(now))
    }

    /// Record the mode the user actually wanted without setting an override.
    ///
    /// Returns whether the choice was recorded (learning may be disabled).
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the history cannot be saved; the
    /// choice is then not kept in memory either.
    pub fn record_choice(&mut self, mode: RingerMode, now: DateTime<Utc>) -> Result<bool> {
        let snapshot = self.snapshot(now);
        self.record_and_persist(&snapshot, mode)
    }

    /// Recorded advisor observations, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Observation> {
        self.advisor.history().cloned().collect()
    }

    // =========================================================================
    // SETTINGS
    // =========================================================================

    /// Whether changes are written to a data directory.
    #[must_use]
    pub const fn is_persistent(&self) -> bool {
        self.storage.is_some()
    }

    /// Current feature toggles.
    #[must_use]
    pub const fn settings(&self) -> Settings {
        Settings {
            emergency_enabled: self.config.overrides.emergency_enabled,
            spam_enabled: self.config.overrides.spam_enabled,
            learning_enabled: self.config.advisor.learning_enabled,
            suggestions_enabled: self.config.advisor.suggestions_enabled,
        }
    }

    /// Apply a partial settings update and return the result.
    ///
    /// Disabling an override feature clears its flag immediately.
    pub fn update_settings(&mut self, update: SettingsUpdate) -> Settings {
        update.apply_to(&mut self.config);
        self.gate.set_settings(self.config.overrides.clone());
        self.advisor.set_config(self.config.advisor.clone());
        let settings = self.settings();
        info!(?settings, "Settings updated");
        settings
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn sync_changes(&mut self) {
        let rules = self.store.snapshot();
        for change in self.store.drain_changes() {
            debug!(?change, "Forwarding rule change");
            self.geofence.apply_change(change, &rules);
            self.schedule.apply_change(change);
        }
    }

    /// Run a store mutation and persist the result. If the rules cannot be
    /// saved the store is rolled back and the trackers never see the change.
    fn commit_rules<T>(
        &mut self,
        mutate: impl FnOnce(&mut RuleStore) -> StoreResult<T>,
    ) -> Result<T> {
        let before = self.store.snapshot();
        let queued = self.store.pending_changes();
        let value = mutate(&mut self.store)?;

        if let Some(storage) = &self.storage {
            if let Err(err) = storage.save_rules(self.store.snapshot().rules()) {
                self.store.rollback(before, queued);
                return Err(err.into());
            }
        }
        self.sync_changes();
        Ok(value)
    }

    /// Record a choice and save the history, undoing the record on failure.
    fn record_and_persist(&mut self, snapshot: &ContextSnapshot, mode: RingerMode) -> Result<bool> {
        let Some(storage) = &self.storage else {
            return Ok(self.advisor.record(snapshot, mode));
        };
        let before = self.advisor.clone();
        if !self.advisor.record(snapshot, mode) {
            return Ok(false);
        }
        let history: Vec<Observation> = self.advisor.history().cloned().collect();
        if let Err(err) = storage.save_history(&history) {
            self.advisor = before;
            return Err(err.into());
        }
        Ok(true)
    }

    fn location_rule(&self, id: RuleId) -> Result<LocationRule> {
        self.store
            .snapshot()
            .location_rule(id)
            .cloned()
            .ok_or(RingruleError::RuleNotFound(id))
    }

    fn time_rule(&self, id: RuleId) -> Result<TimeRule> {
        self.store
            .snapshot()
            .time_rule(id)
            .cloned()
            .ok_or(RingruleError::RuleNotFound(id))
    }
}
