//! Non-binding mode suggestions learned from the user's own choices.
//!
//! Each time the user picks a mode by hand (and learning is enabled) the
//! advisor records an [`Observation`]. A suggestion for the current snapshot
//! is a frequency-weighted vote over past observations taken at a similar
//! time of day in a similar place. The advisor never touches rules or
//! overrides; its output is only shown to the user.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::config::AdvisorConfig;
use crate::resolver::ContextSnapshot;
use crate::types::{GeoPoint, RingerMode, TimeOfDay};

/// Weight of a location match when either side has no position.
const UNKNOWN_LOCATION_WEIGHT: f64 = 0.5;

/// One recorded user choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Observation {
    /// When the choice was made.
    pub at: DateTime<Utc>,
    /// Local minute of day, 0-1439.
    pub minute_of_day: u16,
    /// Where the user was, if known.
    pub position: Option<GeoPoint>,
    /// The mode the user picked.
    pub mode: RingerMode,
}

/// An advisory mode suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "mode": "silent",
    "confidence": 0.8,
    "support": 6,
    "reason": "You usually pick silent around this time at this place"
}))]
pub struct Suggestion {
    /// Suggested mode.
    pub mode: RingerMode,
    /// Share of the matching weight that voted for `mode`, 0-1.
    pub confidence: f64,
    /// Number of past observations that contributed.
    pub support: usize,
    /// Short explanation for display.
    pub reason: String,
}

/// Learns from user choices and suggests a mode.
#[derive(Debug, Clone)]
pub struct SuggestionAdvisor {
    config: AdvisorConfig,
    timezone: Tz,
    history: VecDeque<Observation>,
}

impl SuggestionAdvisor {
    /// Create an advisor with empty history.
    #[must_use]
    pub fn new(config: AdvisorConfig, timezone: Tz) -> Self {
        Self {
            config,
            timezone,
            history: VecDeque::new(),
        }
    }

    /// Restore persisted history (oldest first), trimmed to the configured bound.
    #[must_use]
    pub fn with_history(mut self, history: Vec<Observation>) -> Self {
        self.history = history.into();
        self.trim();
        self
    }

    /// Current advisor settings.
    #[must_use]
    pub const fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// Replace the advisor settings.
    pub fn set_config(&mut self, config: AdvisorConfig) {
        self.config = config;
        self.trim();
    }

    /// Recorded observations, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Observation> {
        self.history.iter()
    }

    /// Number of recorded observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Record that the user chose `mode` in `snapshot`'s context.
    ///
    /// Returns `false` (and records nothing) while learning is disabled.
    pub fn record(&mut self, snapshot: &ContextSnapshot, mode: RingerMode) -> bool {
        if !self.config.learning_enabled {
            return false;
        }
        self.history.push_back(Observation {
            at: snapshot.at,
            minute_of_day: self.minute_of_day(snapshot.at),
            position: snapshot.position.map(|position| position.0),
            mode,
        });
        self.trim();
        debug!(%mode, history = self.history.len(), "Recorded mode choice");
        true
    }

    /// Suggest a mode for `snapshot`, if the history supports one.
    #[must_use]
    pub fn suggest(&self, snapshot: &ContextSnapshot) -> Option<Suggestion> {
        if !self.config.suggestions_enabled {
            return None;
        }

        let minute = self.minute_of_day(snapshot.at);
        let position = snapshot.position.map(|position| position.0);

        let mut weights = [0.0_f64; 3];
        let mut support = 0;
        for observation in &self.history {
            let weight = self.time_similarity(minute, observation.minute_of_day)
                * self.location_similarity(position, observation.position);
            if weight > 0.0 {
                weights[mode_index(observation.mode)] += weight;
                support += 1;
            }
        }

        if support < self.config.min_support {
            return None;
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return None;
        }

        // Ties go to the quieter mode
        let (mode, best) = RingerMode::ALL
            .into_iter()
            .map(|mode| (mode, weights[mode_index(mode)]))
            .max_by(|(a_mode, a), (b_mode, b)| {
                a.total_cmp(b)
                    .then_with(|| a_mode.quietness().cmp(&b_mode.quietness()))
            })?;

        let place = if position.is_some() {
            "at this place"
        } else {
            "regardless of place"
        };
        Some(Suggestion {
            mode,
            confidence: best / total,
            support,
            reason: format!("You usually pick {mode} around this time {place}"),
        })
    }

    fn minute_of_day(&self, at: DateTime<Utc>) -> u16 {
        TimeOfDay::from_naive(at.with_timezone(&self.timezone).time()).minutes()
    }

    /// Linear falloff over the circular minute-of-day distance.
    fn time_similarity(&self, a: u16, b: u16) -> f64 {
        let diff = a.abs_diff(b);
        let distance = diff.min(TimeOfDay::MINUTES_PER_DAY - diff);
        let window = self.config.time_window_minutes;
        if distance >= window {
            0.0
        } else {
            1.0 - f64::from(distance) / f64::from(window)
        }
    }

    fn location_similarity(&self, a: Option<GeoPoint>, b: Option<GeoPoint>) -> f64 {
        match (a, b) {
            (Some(a), Some(b)) if a.distance_m(&b) <= self.config.cluster_radius_m => 1.0,
            (Some(_), Some(_)) => 0.0,
            _ => UNKNOWN_LOCATION_WEIGHT,
        }
    }

    fn trim(&mut self) {
        while self.history.len() > self.config.max_history {
            self.history.pop_front();
        }
    }
}

const fn mode_index(mode: RingerMode) -> usize {
    match mode {
        RingerMode::Normal => 0,
        RingerMode::Vibrate => 1,
        RingerMode::Silent => 2,
    }
}
