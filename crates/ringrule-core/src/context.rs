//! Override flags that pre-empt rule evaluation.
//!
//! Flags only change through explicit commands: the telephony signal
//! ([`CallStateChanged`]) raises and clears the emergency and spam flags, the
//! user sets and clears the manual override. There are no timers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::config::OverrideConfig;
use crate::types::RingerMode;

/// A context condition that overrides every rule.
///
/// Declaration order is precedence order: emergency beats spam beats manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverrideFlag {
    /// A call from an emergency contact is in progress.
    EmergencyActive,
    /// A suspected spam call is in progress.
    SpamActive,
    /// The user picked a mode by hand.
    ManualOverride,
}

impl OverrideFlag {
    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::EmergencyActive => "emergency contact calling",
            Self::SpamActive => "suspected spam call",
            Self::ManualOverride => "manual override",
        }
    }
}

/// Call state reported by the telephony collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "is_emergency_contact": false,
    "is_suspected_spam": true,
    "active": true
}))]
pub struct CallStateChanged {
    /// The caller is in the user's emergency contacts.
    pub is_emergency_contact: bool,
    /// The caller was flagged as likely spam.
    pub is_suspected_spam: bool,
    /// `true` while ringing or connected, `false` once the call ends.
    pub active: bool,
}

/// A mode the user chose by hand, persisted across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ManualOverride {
    /// Chosen mode.
    pub mode: RingerMode,
    /// When it was chosen.
    pub set_at: DateTime<Utc>,
}

/// An override currently in force, with the mode it forces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct ActiveOverride {
    /// Which flag.
    pub flag: OverrideFlag,
    /// Mode it forces.
    pub mode: RingerMode,
    /// When it was raised.
    pub since: DateTime<Utc>,
}

/// Tracks the three override flags.
#[derive(Debug, Clone)]
pub struct ContextGate {
    settings: OverrideConfig,
    emergency_since: Option<DateTime<Utc>>,
    spam_since: Option<DateTime<Utc>>,
    manual: Option<ManualOverride>,
}

impl ContextGate {
    /// Create a gate with no flags set.
    #[must_use]
    pub const fn new(settings: OverrideConfig) -> Self {
        Self {
            settings,
            emergency_since: None,
            spam_since: None,
            manual: None,
        }
    }

    /// Restore a persisted manual override.
    #[must_use]
    pub fn with_manual(mut self, manual: Option<ManualOverride>) -> Self {
        self.manual = manual;
        self
    }

    /// Current override settings.
    #[must_use]
    pub const fn settings(&self) -> &OverrideConfig {
        &self.settings
    }

    /// Replace the override settings.
    ///
    /// Disabling a feature clears its flag immediately.
    pub fn set_settings(&mut self, settings: OverrideConfig) {
        if !settings.emergency_enabled {
            self.emergency_since = None;
        }
        if !settings.spam_enabled {
            self.spam_since = None;
        }
        self.settings = settings;
    }

    /// Apply a call state change from the telephony collaborator.
    pub fn on_call_state(&mut self, call: CallStateChanged, now: DateTime<Utc>) {
        if !call.active {
            if self.emergency_since.take().is_some() {
                info!("Call ended, cleared emergency override");
            }
            if self.spam_since.take().is_some() {
                info!("Call ended, cleared spam override");
            }
            return;
        }

        if call.is_emergency_contact && self.settings.emergency_enabled {
            self.emergency_since.get_or_insert(now);
            info!("Emergency contact calling, override raised");
        }
        if call.is_suspected_spam && self.settings.spam_enabled {
            self.spam_since.get_or_insert(now);
            info!("Suspected spam call, override raised");
        }
    }

    /// Set (or replace) the manual override.
    pub fn set_manual(&mut self, mode: RingerMode, now: DateTime<Utc>) -> &ManualOverride {
        info!(%mode, "Manual override set");
        self.manual.insert(ManualOverride { mode, set_at: now })
    }

    /// Clear the manual override. Returns whether one was set.
    pub fn clear_manual(&mut self) -> bool {
        let cleared = self.manual.take().is_some();
        if cleared {
            info!("Manual override cleared");
        }
        cleared
    }

    /// The manual override, if set.
    #[must_use]
    pub const fn manual(&self) -> Option<&ManualOverride> {
        self.manual.as_ref()
    }

    /// Whether `flag` is currently set.
    #[must_use]
    pub fn is_set(&self, flag: OverrideFlag) -> bool {
        self.active().iter().any(|active| active.flag == flag)
    }

    /// Overrides in force, highest precedence first.
    #[must_use]
    pub fn active(&self) -> Vec<ActiveOverride> {
        let mut active = Vec::with_capacity(3);
        if let Some(since) = self.emergency_since {
            active.push(ActiveOverride {
                flag: OverrideFlag::EmergencyActive,
                mode: self.settings.emergency_mode,
                since,
            });
        }
        if let Some(since) = self.spam_since {
            active.push(ActiveOverride {
                flag: OverrideFlag::SpamActive,
                mode: self.settings.spam_mode,
                since,
            });
        }
        if let Some(manual) = &self.manual {
            active.push(ActiveOverride {
                flag: OverrideFlag::ManualOverride,
                mode: manual.mode,
                since: manual.set_at,
            });
        }
        active
    }
}
