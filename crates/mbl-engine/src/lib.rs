//! mbl-engine
//!
//! Pure decision logic for the alarm engine: threshold evaluation,
//! escalation bookkeeping, and portfolio valuation.
//!
//! Deterministic, no IO, no wall-clock, no randomness. Everything that
//! touches files, sockets, or timers lives in `mbl-store`, `mbl-md`, and
//! `mbl-scheduler`; this crate only maps inputs to decisions so the whole
//! escalation policy is unit-testable without a running loop.

pub mod evaluator;
pub mod tracker;
pub mod valuation;

pub use evaluator::{deviation, evaluate, Decision, EscalationLevel, PriceWatch};
pub use tracker::{apply, AlarmUpdate};
