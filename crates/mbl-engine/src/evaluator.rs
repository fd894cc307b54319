//! Threshold evaluator.
//!
//! Pure function mapping (watch state, current quote) → a [`Decision`].
//! The caller (scheduler) owns persistence; the evaluator never mutates.
//!
//! # Policy
//!
//! - Breach is a closed interval on the triggering side: `quote >= target`
//!   for `Above`, `quote <= target` for `Below`.
//! - The first in-breach cycle of an episode produces the base [`Decision::Notify`]
//!   with the escalation counter untouched.
//! - Subsequent in-breach cycles select a severity from the deviation
//!   `|quote - target| / target`:
//!   - `< 5%`  — base notify repeats, not counted toward any cap.
//!   - `[5%, 10%)` — level 1, at most 3 escalated notifications per episode.
//!   - `>= 10%` — level 2, at most 5 escalated notifications per episode.
//! - One counter spans the whole episode. Raising the level enlarges the cap
//!   without restarting the count, so escalating severity never reduces the
//!   remaining entitlement; dropping back to a lower level with the counter
//!   at or past that level's cap stays silent.
//! - Leaving breach yields [`Decision::EpisodeReset`]: the caller zeroes the
//!   counter and clears the in-breach flag.

use mbl_schemas::Direction;

// ---------------------------------------------------------------------------
// EscalationLevel
// ---------------------------------------------------------------------------

/// Severity tier derived from deviation magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EscalationLevel {
    /// Deviation in `[5%, 10%)`.
    L1,
    /// Deviation `>= 10%`.
    L2,
}

impl EscalationLevel {
    /// Total escalated notifications an episode is entitled to at this level.
    pub fn cap(&self) -> u32 {
        match self {
            EscalationLevel::L1 => 3,
            EscalationLevel::L2 => 5,
        }
    }

    pub fn as_number(&self) -> u8 {
        match self {
            EscalationLevel::L1 => 1,
            EscalationLevel::L2 => 2,
        }
    }

    /// Level for a given relative deviation, `None` below the 5% band.
    pub fn for_deviation(deviation: f64) -> Option<Self> {
        if deviation >= 0.10 {
            Some(EscalationLevel::L2)
        } else if deviation >= 0.05 {
            Some(EscalationLevel::L1)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Outcome of evaluating one price-conditioned alarm against one quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Nothing to do this cycle.
    NoOp,
    /// The quote moved back to the non-breaching side; the breach episode
    /// ended and the caller must zero the escalation counter.
    EpisodeReset,
    /// Base notification (first detection, or an uncounted repeat while
    /// deviation stays below 5%).
    Notify,
    /// Escalated notification at the given severity level.
    NotifyEscalated { level: EscalationLevel },
}

impl Decision {
    pub fn dispatches(&self) -> bool {
        matches!(self, Decision::Notify | Decision::NotifyEscalated { .. })
    }
}

// ---------------------------------------------------------------------------
// PriceWatch + evaluate
// ---------------------------------------------------------------------------

/// The slice of alarm state the evaluator needs. Copied out of an
/// [`mbl_schemas::Alarm`] for the duration of one cycle.
#[derive(Debug, Clone, Copy)]
pub struct PriceWatch {
    pub direction: Direction,
    pub target_value: f64,
    pub in_breach: bool,
    pub escalation_count: u32,
}

/// Relative deviation of `quote` from `target`. `target` must be positive;
/// creation-time validation guarantees it, the debug assert catches drift.
pub fn deviation(quote: f64, target: f64) -> f64 {
    debug_assert!(target > 0.0, "target_value must be positive");
    (quote - target).abs() / target
}

/// Evaluate one active price alarm against the current quote.
pub fn evaluate(watch: &PriceWatch, quote: f64) -> Decision {
    let breach = match watch.direction {
        Direction::Above => quote >= watch.target_value,
        Direction::Below => quote <= watch.target_value,
    };

    if !breach {
        return if watch.in_breach {
            Decision::EpisodeReset
        } else {
            Decision::NoOp
        };
    }

    if !watch.in_breach {
        // First detection since the last non-breach state: base notification,
        // counter untouched even if the quote already deviates past a band.
        return Decision::Notify;
    }

    match EscalationLevel::for_deviation(deviation(quote, watch.target_value)) {
        None => Decision::Notify,
        Some(level) if watch.escalation_count < level.cap() => {
            Decision::NotifyEscalated { level }
        }
        Some(_) => Decision::NoOp,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn watch(direction: Direction, target: f64, in_breach: bool, count: u32) -> PriceWatch {
        PriceWatch {
            direction,
            target_value: target,
            in_breach,
            escalation_count: count,
        }
    }

    /// quote == target counts as breach on both sides (closed interval).
    #[test]
    fn exact_target_is_breach_both_directions() {
        let above = watch(Direction::Above, 100.0, false, 0);
        assert_eq!(evaluate(&above, 100.0), Decision::Notify);

        let below = watch(Direction::Below, 100.0, false, 0);
        assert_eq!(evaluate(&below, 100.0), Decision::Notify);
    }

    #[test]
    fn above_requires_quote_at_or_over_target() {
        let w = watch(Direction::Above, 100.0, false, 0);
        assert_eq!(evaluate(&w, 99.999), Decision::NoOp);
        assert_eq!(evaluate(&w, 100.001), Decision::Notify);
    }

    #[test]
    fn below_requires_quote_at_or_under_target() {
        let w = watch(Direction::Below, 100.0, false, 0);
        assert_eq!(evaluate(&w, 100.001), Decision::NoOp);
        assert_eq!(evaluate(&w, 99.999), Decision::Notify);
    }

    /// Deviation bands partition [0, ∞): exactly one of {<5%, [5%,10%), >=10%}.
    #[test]
    fn deviation_bands_are_exhaustive_and_exclusive() {
        assert_eq!(EscalationLevel::for_deviation(0.0), None);
        assert_eq!(EscalationLevel::for_deviation(0.049_999), None);
        assert_eq!(
            EscalationLevel::for_deviation(0.05),
            Some(EscalationLevel::L1)
        );
        assert_eq!(
            EscalationLevel::for_deviation(0.099_999),
            Some(EscalationLevel::L1)
        );
        assert_eq!(
            EscalationLevel::for_deviation(0.10),
            Some(EscalationLevel::L2)
        );
        assert_eq!(
            EscalationLevel::for_deviation(3.0),
            Some(EscalationLevel::L2)
        );
    }

    /// Reference ladder: target=100 above, quotes [95, 101, 106, 111, 96].
    #[test]
    fn five_cycle_escalation_ladder() {
        let mut in_breach = false;
        let mut count = 0u32;
        let mut results = Vec::new();

        for quote in [95.0, 101.0, 106.0, 111.0, 96.0] {
            let w = watch(Direction::Above, 100.0, in_breach, count);
            let d = evaluate(&w, quote);
            // Minimal tracker inline: the real one lives in tracker.rs.
            match d {
                Decision::Notify => in_breach = true,
                Decision::NotifyEscalated { .. } => {
                    in_breach = true;
                    count += 1;
                }
                Decision::EpisodeReset => {
                    in_breach = false;
                    count = 0;
                }
                Decision::NoOp => {}
            }
            results.push(d);
        }

        assert_eq!(
            results,
            vec![
                Decision::NoOp,
                Decision::Notify,
                Decision::NotifyEscalated {
                    level: EscalationLevel::L1
                },
                Decision::NotifyEscalated {
                    level: EscalationLevel::L2
                },
                Decision::EpisodeReset,
            ]
        );
        assert_eq!(count, 0, "episode reset must zero the counter");
    }

    /// Counter at the L1 cap silences L1 but a raise to L2 keeps notifying.
    #[test]
    fn level_raise_extends_cap_without_restarting_count() {
        // In breach, 3 escalated notifications already sent.
        let w = watch(Direction::Above, 100.0, true, 3);
        // Still at level 1 (7% over): cap 3 reached, silent.
        assert_eq!(evaluate(&w, 107.0), Decision::NoOp);
        // Deviation moves to level 2 (12% over): cap is now 5, count 3 < 5.
        assert_eq!(
            evaluate(&w, 112.0),
            Decision::NotifyEscalated {
                level: EscalationLevel::L2
            }
        );
        // Count exhausted at 5: silent even at level 2.
        let w = watch(Direction::Above, 100.0, true, 5);
        assert_eq!(evaluate(&w, 112.0), Decision::NoOp);
    }

    /// Dropping from L2 back to L1 with count past the L1 cap stays silent.
    #[test]
    fn severity_drop_with_spent_counter_is_silent() {
        let w = watch(Direction::Above, 100.0, true, 4);
        assert_eq!(evaluate(&w, 107.0), Decision::NoOp);
    }

    /// Sub-5% repeats keep firing the base notification and never count.
    #[test]
    fn small_deviation_repeats_base_notify_uncounted() {
        let w = watch(Direction::Above, 100.0, true, 0);
        assert_eq!(evaluate(&w, 101.0), Decision::Notify);
        assert_eq!(evaluate(&w, 104.9), Decision::Notify);
    }

    /// First detection that already deviates past a band is still the base
    /// notification; escalation starts on the next cycle.
    #[test]
    fn first_detection_is_base_even_at_large_deviation() {
        let w = watch(Direction::Above, 100.0, false, 0);
        assert_eq!(evaluate(&w, 130.0), Decision::Notify);
    }

    #[test]
    fn below_direction_deviation_uses_absolute_distance() {
        let w = watch(Direction::Below, 100.0, true, 0);
        assert_eq!(
            evaluate(&w, 94.0),
            Decision::NotifyEscalated {
                level: EscalationLevel::L1
            }
        );
        assert_eq!(
            evaluate(&w, 88.0),
            Decision::NotifyEscalated {
                level: EscalationLevel::L2
            }
        );
    }
}
