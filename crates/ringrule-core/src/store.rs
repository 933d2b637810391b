//! In-memory rule store.
//!
//! The store owns the rule list behind an [`Arc`] and mutates it copy-on-write,
//! so readers holding a [`RuleSet`] snapshot are never affected by later
//! writes. Every successful mutation queues a [`RuleChange`] which the
//! [`Engine`](crate::engine::Engine) drains and forwards to the derived-state
//! trackers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::rules::{
    LocationRule, LocationRulePatch, NewLocationRule, NewTimeRule, Rule, TimeRule, TimeRulePatch,
    ValidationError,
};
use crate::types::RuleId;

/// Errors returned by rule store mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A field failed validation; nothing was changed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No rule of the expected kind has this id.
    #[error("rule not found: {0}")]
    NotFound(RuleId),
}

/// Result type for rule store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A change applied to the rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleChange {
    /// A rule was created.
    Added(RuleId),
    /// A rule's display fields, mode, priority or enabled flag changed.
    Updated(RuleId),
    /// A location rule's center or radius, or a time rule's window or days,
    /// changed. Derived membership must be recomputed.
    Reshaped(RuleId),
    /// A rule was deleted.
    Removed(RuleId),
}

/// An immutable, ordered collection of rules (creation order).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Build a set from rules already in creation order.
    #[must_use]
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// All rules in creation order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of rules of either kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Location rules in creation order.
    pub fn location_rules(&self) -> impl Iterator<Item = &LocationRule> {
        self.rules.iter().filter_map(|rule| match rule {
            Rule::Location(rule) => Some(rule),
            Rule::Time(_) => None,
        })
    }

    /// Time rules in creation order.
    pub fn time_rules(&self) -> impl Iterator<Item = &TimeRule> {
        self.rules.iter().filter_map(|rule| match rule {
            Rule::Time(rule) => Some(rule),
            Rule::Location(_) => None,
        })
    }

    /// Look up any rule by id.
    #[must_use]
    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id() == id)
    }

    /// Look up a location rule by id.
    #[must_use]
    pub fn location_rule(&self, id: RuleId) -> Option<&LocationRule> {
        self.location_rules().find(|rule| rule.id == id)
    }

    /// Look up a time rule by id.
    #[must_use]
    pub fn time_rule(&self, id: RuleId) -> Option<&TimeRule> {
        self.time_rules().find(|rule| rule.id == id)
    }

    fn position(&self, id: RuleId) -> Option<usize> {
        self.rules.iter().position(|rule| rule.id() == id)
    }
}

/// Validated, single-writer store of location and time rules.
#[derive(Debug, Default)]
pub struct RuleStore {
    rules: Arc<RuleSet>,
    changes: Vec<RuleChange>,
}

impl RuleStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from previously persisted rules.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found; persisted data is held to
    /// the same invariants as user input.
    pub fn from_rules(rules: Vec<Rule>) -> StoreResult<Self> {
        for rule in &rules {
            match rule {
                Rule::Location(rule) => NewLocationRule::from(rule).validate()?,
                Rule::Time(rule) => NewTimeRule::from(rule).validate()?,
            }
        }
        let changes = rules.iter().map(|rule| RuleChange::Added(rule.id())).collect();
        Ok(Self {
            rules: Arc::new(RuleSet::from_rules(rules)),
            changes,
        })
    }

    /// A stable snapshot of the current rules.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RuleSet> {
        Arc::clone(&self.rules)
    }

    /// All rules in creation order.
    #[must_use]
    pub fn list(&self) -> Vec<Rule> {
        self.rules.rules().to_vec()
    }

    /// Add a location rule.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if any field is invalid.
    pub fn add_location(&mut self, rule: NewLocationRule) -> StoreResult<RuleId> {
        rule.validate()?;
        let id = RuleId::generate();
        let rule = rule.into_rule(id);
        info!(rule_id = %id, name = %rule.name, radius_m = rule.radius_m, "Added location rule");
        Arc::make_mut(&mut self.rules).rules.push(Rule::Location(rule));
        self.changes.push(RuleChange::Added(id));
        Ok(id)
    }

    /// Add a time rule.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if any field is invalid.
    pub fn add_time(&mut self, rule: NewTimeRule) -> StoreResult<RuleId> {
        rule.validate()?;
        let id = RuleId::generate();
        let rule = rule.into_rule(id);
        info!(
            rule_id = %id,
            name = %rule.name,
            start = %rule.start,
            end = %rule.end,
            "Added time rule"
        );
        Arc::make_mut(&mut self.rules).rules.push(Rule::Time(rule));
        self.changes.push(RuleChange::Added(id));
        Ok(id)
    }

    /// Patch a location rule.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `id` is not a location rule, or
    /// [`StoreError::Validation`] if the patched rule is invalid.
    pub fn update_location(
        &mut self,
        id: RuleId,
        patch: LocationRulePatch,
    ) -> StoreResult<LocationRule> {
        let current = self.rules.location_rule(id).ok_or(StoreError::NotFound(id))?;
        let updated = patch.apply(current)?;
        let change = if updated.same_geofence(current) {
            RuleChange::Updated(id)
        } else {
            RuleChange::Reshaped(id)
        };
        self.replace(Rule::Location(updated.clone()), change)?;
        Ok(updated)
    }

    /// Patch a time rule.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `id` is not a time rule, or
    /// [`StoreError::Validation`] if the patched rule is invalid.
    pub fn update_time(&mut self, id: RuleId, patch: TimeRulePatch) -> StoreResult<TimeRule> {
        let current = self.rules.time_rule(id).ok_or(StoreError::NotFound(id))?;
        let updated = patch.apply(current)?;
        let change = if updated.same_window(current) {
            RuleChange::Updated(id)
        } else {
            RuleChange::Reshaped(id)
        };
        self.replace(Rule::Time(updated.clone()), change)?;
        Ok(updated)
    }

    /// Delete a rule of either kind.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no rule has this id.
    pub fn remove(&mut self, id: RuleId) -> StoreResult<Rule> {
        let index = self.rules.position(id).ok_or(StoreError::NotFound(id))?;
        let removed = Arc::make_mut(&mut self.rules).rules.remove(index);
        info!(rule_id = %id, name = %removed.name(), "Removed rule");
        self.changes.push(RuleChange::Removed(id));
        Ok(removed)
    }

    /// Take the changes recorded since the last call.
    pub fn drain_changes(&mut self) -> Vec<RuleChange> {
        std::mem::take(&mut self.changes)
    }

    /// Put back a snapshot taken before a mutation, discarding the changes
    /// queued since. Used when the mutation could not be persisted.
    pub fn rollback(&mut self, rules: Arc<RuleSet>, queued: usize) {
        warn!(rules = rules.len(), "Rolling back rule change");
        self.rules = rules;
        self.changes.truncate(queued);
    }

    /// Number of changes waiting to be drained.
    #[must_use]
    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }

    fn replace(&mut self, rule: Rule, change: RuleChange) -> StoreResult<()> {
        let id = rule.id();
        let index = self.rules.position(id).ok_or(StoreError::NotFound(id))?;
        debug!(rule_id = %id, ?change, "Updated rule");
        Arc::make_mut(&mut self.rules).rules[index] = rule;
        self.changes.push(change);
        Ok(())
    }
}
