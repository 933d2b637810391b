//! Weekly time-window evaluation.
//!
//! Pull model: callers pass `now`, the clock never reads the system time.
//! A window that wraps past midnight belongs to the weekday on which it
//! starts, so `22:00-07:00` on Monday covers Monday 22:00 through Tuesday
//! 06:59 and nothing else.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::rules::TimeRule;
use crate::store::{RuleChange, RuleSet};
use crate::types::{RuleId, TimeOfDay};

/// Whether `rule`'s window contains `now`, evaluated in `tz`.
///
/// Ignores the rule's `enabled` flag; filtering disabled rules is the
/// caller's job.
#[must_use]
pub fn is_active(rule: &TimeRule, now: DateTime<Utc>, tz: Tz) -> bool {
    let local = now.with_timezone(&tz);
    let today = local.weekday();
    let t = TimeOfDay::from_naive(local.time());

    if rule.wraps_midnight() {
        (rule.days.contains(today) && t >= rule.start)
            || (rule.days.contains(today.pred()) && t < rule.end)
    } else {
        rule.days.contains(today) && rule.start <= t && t < rule.end
    }
}

/// A time rule switching on or off between two refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleTransition {
    /// The rule's window opened.
    Activated(RuleId),
    /// The rule's window closed.
    Deactivated(RuleId),
}

/// Evaluates time rules against wall-clock time.
#[derive(Debug, Clone)]
pub struct ScheduleClock {
    timezone: Tz,
    last_active: BTreeSet<RuleId>,
}

impl ScheduleClock {
    /// Create a clock evaluating in `timezone`.
    #[must_use]
    pub const fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            last_active: BTreeSet::new(),
        }
    }

    /// The timezone windows are evaluated in.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Ids of enabled time rules active at `now`.
    #[must_use]
    pub fn active_rules(&self, rules: &RuleSet, now: DateTime<Utc>) -> BTreeSet<RuleId> {
        rules
            .time_rules()
            .filter(|rule| rule.enabled && is_active(rule, now, self.timezone))
            .map(|rule| rule.id)
            .collect()
    }

    /// Recompute the active set and report what changed since the last refresh.
    pub fn refresh(&mut self, rules: &RuleSet, now: DateTime<Utc>) -> Vec<ScheduleTransition> {
        let active = self.active_rules(rules, now);
        let mut transitions: Vec<ScheduleTransition> = active
            .difference(&self.last_active)
            .map(|id| ScheduleTransition::Activated(*id))
            .collect();
        transitions.extend(
            self.last_active
                .difference(&active)
                .map(|id| ScheduleTransition::Deactivated(*id)),
        );
        for transition in &transitions {
            debug!(?transition, "Schedule transition");
        }
        self.last_active = active;
        transitions
    }

    /// Forget state for rules whose window moved or that were removed, so
    /// the next refresh re-derives it. Other edits keep the previous state.
    pub fn apply_change(&mut self, change: RuleChange) {
        match change {
            RuleChange::Reshaped(id) | RuleChange::Removed(id) => {
                self.last_active.remove(&id);
            }
            RuleChange::Added(_) | RuleChange::Updated(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{NewTimeRule, TimeRulePatch};
    use crate::store::RuleStore;
    use crate::types::{RingerMode, WeekdaySet};
    use chrono::{TimeZone, Weekday};

    fn rule(start: &str, end: &str, days: WeekdaySet) -> TimeRule {
        NewTimeRule {
            name: "Window".into(),
            start: start.parse().unwrap(),
            end: end.parse().unwrap(),
            days,
            mode: RingerMode::Silent,
            priority: 0,
            enabled: true,
        }
        .into_rule(RuleId::generate())
    }

    fn monday_only() -> WeekdaySet {
        [Weekday::Mon].into_iter().collect()
    }

    // 2025-01-13 is a Monday
    fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_plain_window_bounds() {
        let rule = rule("09:00", "17:00", WeekdaySet::weekdays());
        let tz = chrono_tz::UTC;
        assert!(!is_active(&rule, utc(13, 8, 59), tz));
        assert!(is_active(&rule, utc(13, 9, 0), tz));
        assert!(is_active(&rule, utc(13, 16, 59), tz));
        assert!(!is_active(&rule, utc(13, 17, 0), tz));
        // Saturday
        assert!(!is_active(&rule, utc(18, 12, 0), tz));
    }

    #[test]
    fn test_midnight_wrap_uses_start_day() {
        let rule = rule("22:00", "07:00", monday_only());
        let tz = chrono_tz::UTC;

        assert!(is_active(&rule, utc(13, 23, 30), tz));
        assert!(is_active(&rule, utc(14, 5, 0), tz));
        assert!(!is_active(&rule, utc(14, 7, 0), tz));
        // Monday early morning belongs to Sunday's window, which is not set
        assert!(!is_active(&rule, utc(13, 5, 0), tz));
        // Tuesday night is not Monday
        assert!(!is_active(&rule, utc(14, 23, 0), tz));
    }

    #[test]
    fn test_sunday_wrap_into_monday() {
        let days: WeekdaySet = [Weekday::Sun].into_iter().collect();
        let rule = rule("23:00", "01:00", days);
        let tz = chrono_tz::UTC;
        // 2025-01-19 is a Sunday
        assert!(is_active(&rule, utc(19, 23, 15), tz));
        assert!(is_active(&rule, utc(20, 0, 30), tz));
        assert!(!is_active(&rule, utc(20, 1, 0), tz));
    }

    #[test]
    fn test_evaluated_in_local_time() {
        let rule = rule("09:00", "17:00", monday_only());
        let tz: Tz = "America/New_York".parse().unwrap();
        // 13:30 UTC is 08:30 in New York (EST)
        assert!(!is_active(&rule, utc(13, 13, 30), tz));
        // 14:30 UTC is 09:30 in New York
        assert!(is_active(&rule, utc(13, 14, 30), tz));
    }

    #[test]
    fn test_refresh_reports_transitions() {
        let mut store = RuleStore::new();
        let id = store
            .add_time(NewTimeRule {
                name: "Work".into(),
                start: "09:00".parse().unwrap(),
                end: "17:00".parse().unwrap(),
                days: WeekdaySet::weekdays(),
                mode: RingerMode::Vibrate,
                priority: 0,
                enabled: true,
            })
            .unwrap();
        let rules = store.snapshot();
        let mut clock = ScheduleClock::new(chrono_tz::UTC);

        assert!(clock.refresh(&rules, utc(13, 8, 0)).is_empty());
        assert_eq!(
            clock.refresh(&rules, utc(13, 10, 0)),
            vec![ScheduleTransition::Activated(id)]
        );
        assert!(clock.refresh(&rules, utc(13, 11, 0)).is_empty());
        assert_eq!(
            clock.refresh(&rules, utc(13, 18, 0)),
            vec![ScheduleTransition::Deactivated(id)]
        );
    }

    #[test]
    fn test_disabled_rules_are_not_active() {
        let mut store = RuleStore::new();
        let mut new_rule = NewTimeRule::from(&rule("00:00", "23:59", WeekdaySet::every_day()));
        new_rule.enabled = false;
        store.add_time(new_rule).unwrap();

        let clock = ScheduleClock::new(chrono_tz::UTC);
        assert!(clock.active_rules(&store.snapshot(), utc(13, 12, 0)).is_empty());
    }

    #[test]
    fn test_rename_does_not_reactivate() {
        let mut store = RuleStore::new();
        let id = store
            .add_time(NewTimeRule::from(&rule("09:00", "17:00", WeekdaySet::weekdays())))
            .unwrap();
        let mut clock = ScheduleClock::new(chrono_tz::UTC);
        assert_eq!(
            clock.refresh(&store.snapshot(), utc(13, 10, 0)),
            vec![ScheduleTransition::Activated(id)]
        );

        let rename = TimeRulePatch {
            name: Some("Office".into()),
            ..Default::default()
        };
        store.update_time(id, rename).unwrap();
        for change in store.drain_changes() {
            clock.apply_change(change);
        }
        assert!(clock.refresh(&store.snapshot(), utc(13, 10, 5)).is_empty());

        let earlier = TimeRulePatch {
            start: Some("08:00".parse().unwrap()),
            ..Default::default()
        };
        store.update_time(id, earlier).unwrap();
        for change in store.drain_changes() {
            clock.apply_change(change);
        }
        assert_eq!(
            clock.refresh(&store.snapshot(), utc(13, 10, 10)),
            vec![ScheduleTransition::Activated(id)]
        );
    }
}
