//! Escalation tracker.
//!
//! Maps an evaluator [`Decision`] to the field updates the store must
//! persist. Kept separate from the evaluator so the decision function stays
//! pure while this module owns the persistence-adjacent bookkeeping.
//!
//! Alarms never auto-resolve from exhausting an escalation cap: they remain
//! `Active` and silent until the episode ends or the user cancels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evaluator::Decision;

/// The mutable alarm fields the scheduler writes back after a cycle.
///
/// `None` means leave the field untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlarmUpdate {
    pub in_breach: Option<bool>,
    pub escalation_count: Option<u32>,
    pub last_notified_at: Option<DateTime<Utc>>,
    /// Whether a message must be dispatched for this alarm this cycle.
    pub dispatch: bool,
}

impl AlarmUpdate {
    pub fn none() -> Self {
        Self {
            in_breach: None,
            escalation_count: None,
            last_notified_at: None,
            dispatch: false,
        }
    }

    pub fn is_noop(&self) -> bool {
        !self.dispatch && self.in_breach.is_none() && self.escalation_count.is_none()
    }
}

/// Apply a decision to the alarm's current counters.
///
/// `escalation_count` only ever grows within an episode and only resets on
/// [`Decision::EpisodeReset`] (or cancel, which the store handles itself).
pub fn apply(decision: Decision, escalation_count: u32, now: DateTime<Utc>) -> AlarmUpdate {
    match decision {
        Decision::NoOp => AlarmUpdate::none(),
        Decision::EpisodeReset => AlarmUpdate {
            in_breach: Some(false),
            escalation_count: Some(0),
            last_notified_at: None,
            dispatch: false,
        },
        Decision::Notify => AlarmUpdate {
            in_breach: Some(true),
            escalation_count: None,
            last_notified_at: Some(now),
            dispatch: true,
        },
        Decision::NotifyEscalated { .. } => AlarmUpdate {
            in_breach: Some(true),
            escalation_count: Some(escalation_count + 1),
            last_notified_at: Some(now),
            dispatch: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EscalationLevel;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn noop_touches_nothing() {
        let u = apply(Decision::NoOp, 2, t0());
        assert!(u.is_noop());
    }

    #[test]
    fn episode_reset_zeroes_counter_and_clears_breach() {
        let u = apply(Decision::EpisodeReset, 4, t0());
        assert_eq!(u.in_breach, Some(false));
        assert_eq!(u.escalation_count, Some(0));
        assert!(!u.dispatch);
    }

    #[test]
    fn base_notify_dispatches_without_counting() {
        let u = apply(Decision::Notify, 2, t0());
        assert!(u.dispatch);
        assert_eq!(u.escalation_count, None);
        assert_eq!(u.in_breach, Some(true));
        assert_eq!(u.last_notified_at, Some(t0()));
    }

    #[test]
    fn escalated_notify_increments_counter() {
        let u = apply(
            Decision::NotifyEscalated {
                level: EscalationLevel::L2,
            },
            2,
            t0(),
        );
        assert!(u.dispatch);
        assert_eq!(u.escalation_count, Some(3));
    }
}
