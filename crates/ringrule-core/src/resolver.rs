//! The decision core: one snapshot in, one ringer mode out.
//!
//! [`Resolver::evaluate`] is a pure function of a [`RuleSet`] and a
//! [`ContextSnapshot`]. It holds no mutable state, so evaluating the same
//! snapshot twice always yields the same [`Decision`].
//!
//! Selection order:
//!
//! 1. Any override flag wins, `EmergencyActive > SpamActive > ManualOverride`.
//! 2. Otherwise the highest-priority active rule wins.
//! 3. Priority ties go to location rules over time rules, then to the
//!    smallest (oldest) rule id.
//! 4. With nothing active the configured default mode applies.

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::context::{ActiveOverride, OverrideFlag};
use crate::rules::RuleKind;
use crate::schedule;
use crate::store::RuleSet;
use crate::types::{GeoPoint, RingerMode, RuleId};

/// Everything one evaluation depends on besides the rules themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ContextSnapshot {
    /// Evaluation time.
    pub at: DateTime<Utc>,
    /// Location rules the geofence tracker reports as inside.
    #[schema(value_type = Vec<String>)]
    pub inside: BTreeSet<RuleId>,
    /// Override flags in force.
    pub overrides: Vec<ActiveOverride>,
    /// Last fresh position. Only the suggestion advisor looks at this.
    #[serde(default)]
    #[schema(value_type = Option<GeoPoint>)]
    pub position: Option<Position>,
}

/// A [`GeoPoint`] wrapper with total equality, so snapshots can be compared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub GeoPoint);

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.0.lat.to_bits() == other.0.lat.to_bits() && self.0.lon.to_bits() == other.0.lon.to_bits()
    }
}

impl Eq for Position {}

impl ContextSnapshot {
    /// A snapshot with no location, no overrides.
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            inside: BTreeSet::new(),
            overrides: Vec::new(),
            position: None,
        }
    }

    /// Builder: mark a location rule as inside.
    #[must_use]
    pub fn with_inside(mut self, id: RuleId) -> Self {
        self.inside.insert(id);
        self
    }

    /// Builder: add an active override.
    #[must_use]
    pub fn with_override(mut self, active: ActiveOverride) -> Self {
        self.overrides.push(active);
        self
    }

    /// Builder: set the last known position.
    #[must_use]
    pub fn with_position(mut self, point: GeoPoint) -> Self {
        self.position = Some(Position(point));
        self
    }
}

/// Where a candidate mode came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidateSource {
    /// An override flag.
    Override {
        /// Which flag.
        flag: OverrideFlag,
    },
    /// A location or time rule.
    Rule {
        /// Rule family.
        rule_kind: RuleKind,
        /// Rule id.
        id: RuleId,
    },
}

/// One candidate considered during an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TrailEntry {
    /// Where it came from.
    pub source: CandidateSource,
    /// Rule name or override label.
    pub label: String,
    /// Mode it asks for.
    pub mode: RingerMode,
    /// Rule priority; `None` for overrides, which outrank every rule.
    pub priority: Option<i32>,
    /// Whether this entry decided the outcome.
    pub selected: bool,
}

/// The outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "mode": "silent",
    "winner": {"kind": "rule", "rule_kind": "location", "id": "01927b4e-8f2a-7cc0-9a9e-3f4f1d2c8b10"},
    "trail": [
        {
            "source": {"kind": "rule", "rule_kind": "location", "id": "01927b4e-8f2a-7cc0-9a9e-3f4f1d2c8b10"},
            "label": "Library",
            "mode": "silent",
            "priority": 5,
            "selected": true
        },
        {
            "source": {"kind": "rule", "rule_kind": "time", "id": "01927b4e-8f2a-7cc0-9a9e-3f4f1d2c8b11"},
            "label": "Work hours",
            "mode": "vibrate",
            "priority": 5,
            "selected": false
        }
    ],
    "reason": "location rule 'Library' (priority 5)",
    "evaluated_at": "2025-01-13T10:15:00Z"
}))]
pub struct Decision {
    /// Effective ringer mode.
    pub mode: RingerMode,
    /// Winning candidate; `None` means the default mode applied.
    pub winner: Option<CandidateSource>,
    /// Overrides in precedence order, then rules ranked best first.
    pub trail: Vec<TrailEntry>,
    /// Why this mode was chosen, for display.
    pub reason: String,
    /// Snapshot time the decision was computed for.
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct RuleCandidate<'a> {
    kind: RuleKind,
    id: RuleId,
    name: &'a str,
    mode: RingerMode,
    priority: i32,
}

impl RuleCandidate<'_> {
    /// Best candidate sorts first.
    fn rank(&self, other: &Self) -> Ordering {
        (Reverse(self.priority), self.kind, self.id).cmp(&(Reverse(other.priority), other.kind, other.id))
    }
}

/// Combines active rules and overrides into a [`Decision`].
#[derive(Debug, Clone, Copy)]
pub struct Resolver {
    default_mode: RingerMode,
    timezone: Tz,
}

impl Resolver {
    /// Create a resolver.
    #[must_use]
    pub const fn new(default_mode: RingerMode, timezone: Tz) -> Self {
        Self {
            default_mode,
            timezone,
        }
    }

    /// Mode used when nothing applies.
    #[must_use]
    pub const fn default_mode(&self) -> RingerMode {
        self.default_mode
    }

    /// Evaluate one snapshot against `rules`.
    ///
    /// Total over any input: ids in the snapshot that no longer name an
    /// enabled location rule are simply not candidates.
    #[must_use]
    pub fn evaluate(&self, rules: &RuleSet, snapshot: &ContextSnapshot) -> Decision {
        let mut candidates = self.collect_candidates(rules, snapshot);
        candidates.sort_by(RuleCandidate::rank);

        let mut overrides = snapshot.overrides.clone();
        overrides.sort_by_key(|active| active.flag);
        overrides.dedup_by_key(|active| active.flag);

        let (mode, winner, reason) = if let Some(top) = overrides.first() {
            (
                top.mode,
                Some(CandidateSource::Override { flag: top.flag }),
                top.flag.label().to_string(),
            )
        } else if let Some(best) = candidates.first() {
            let kind = match best.kind {
                RuleKind::Location => "location",
                RuleKind::Time => "time",
            };
            (
                best.mode,
                Some(CandidateSource::Rule {
                    rule_kind: best.kind,
                    id: best.id,
                }),
                format!("{kind} rule '{}' (priority {})", best.name, best.priority),
            )
        } else {
            (self.default_mode, None, "no rule applies, using default".to_string())
        };

        let mut trail = Vec::with_capacity(overrides.len() + candidates.len());
        trail.extend(overrides.iter().map(|active| {
            let source = CandidateSource::Override { flag: active.flag };
            TrailEntry {
                source,
                label: active.flag.label().to_string(),
                mode: active.mode,
                priority: None,
                selected: winner == Some(source),
            }
        }));
        trail.extend(candidates.iter().map(|candidate| {
            let source = CandidateSource::Rule {
                rule_kind: candidate.kind,
                id: candidate.id,
            };
            TrailEntry {
                source,
                label: candidate.name.to_string(),
                mode: candidate.mode,
                priority: Some(candidate.priority),
                selected: winner == Some(source),
            }
        }));

        debug!(%mode, candidates = trail.len(), %reason, "Evaluated ringer mode");

        Decision {
            mode,
            winner,
            trail,
            reason,
            evaluated_at: snapshot.at,
        }
    }

    fn collect_candidates<'a>(
        &self,
        rules: &'a RuleSet,
        snapshot: &ContextSnapshot,
    ) -> Vec<RuleCandidate<'a>> {
        let locations = rules
            .location_rules()
            .filter(|rule| rule.enabled && snapshot.inside.contains(&rule.id))
            .map(|rule| RuleCandidate {
                kind: RuleKind::Location,
                id: rule.id,
                name: &rule.name,
                mode: rule.mode,
                priority: rule.priority,
            });
        let times = rules
            .time_rules()
            .filter(|rule| rule.enabled && schedule::is_active(rule, snapshot.at, self.timezone))
            .map(|rule| RuleCandidate {
                kind: RuleKind::Time,
                id: rule.id,
                name: &rule.name,
                mode: rule.mode,
                priority: rule.priority,
            });
        locations.chain(times).collect()
    }
}
