//! On-disk document layout.
//!
//! One JSON file per deployment holds all alarms, holdings, the digest day
//! markers, and the digest price snapshots. Pretty-printed so an operator
//! can inspect and edit it directly to reset or seed state.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mbl_schemas::{Alarm, Holding};

/// How many digest snapshots to retain. Older ones are trimmed on push to
/// keep the document small.
pub const SNAPSHOT_RETENTION: usize = 10;

/// Prices captured at one digest run, used to compute change lines in the
/// next digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub prices: BTreeMap<String, f64>,
}

/// The whole persisted state.
///
/// `BTreeMap` keys keep the serialized document stable across rewrites,
/// which makes operator diffs readable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub alarms: Vec<Alarm>,
    #[serde(default)]
    pub holdings: Vec<Holding>,
    /// owner id → last local calendar day a digest was sent.
    #[serde(default)]
    pub digest_log: BTreeMap<String, NaiveDate>,
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}
