use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque chat/user identity an alarm or holding belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of the target triggers a price alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Above,
    Below,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "above" => Some(Direction::Above),
            "below" => Some(Direction::Below),
            _ => None,
        }
    }
}

/// Alarm lifecycle status. Transitions leave `Active` and never return:
/// `Active -> Cancelled` (user command) or `Active -> Resolved` (operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmStatus {
    Active,
    Cancelled,
    Resolved,
}

/// What an alarm is conditioned on. An alarm is either price-conditioned or
/// interval-conditioned, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlarmCondition {
    /// Fire when the quote crosses `target_value` on the `direction` side.
    Price {
        direction: Direction,
        target_value: f64,
    },
    /// Fire every `interval_secs` seconds regardless of quote movement.
    Interval { interval_secs: i64, note: String },
}

impl AlarmCondition {
    pub fn is_price(&self) -> bool {
        matches!(self, AlarmCondition::Price { .. })
    }
}

/// A persisted watch condition tied to one owner and one instrument.
///
/// `in_breach` and `escalation_count` carry the current breach episode:
/// both reset when the quote returns to the non-breaching side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    pub id: Uuid,
    pub owner: OwnerId,
    /// Symbol/currency pair; empty for interval alarms.
    pub instrument: String,
    pub condition: AlarmCondition,
    pub created_at: DateTime<Utc>,
    pub status: AlarmStatus,
    pub in_breach: bool,
    pub escalation_count: u32,
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl Alarm {
    pub fn is_active(&self) -> bool {
        self.status == AlarmStatus::Active
    }
}

/// Unvalidated creation request. The store validates and assigns id/status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmDraft {
    pub owner: OwnerId,
    pub instrument: String,
    pub condition: AlarmCondition,
}

/// One recorded asset position. At most one per (owner, instrument);
/// recording the same pair again overwrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub owner: OwnerId,
    pub instrument: String,
    pub quantity: f64,
    /// User-facing unit (gram, lot, adet, …). Drives gram→ounce conversion
    /// for gold valuation.
    pub unit: String,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parse_roundtrip() {
        assert_eq!(Direction::parse("above"), Some(Direction::Above));
        assert_eq!(Direction::parse(" BELOW "), Some(Direction::Below));
        assert_eq!(Direction::parse("sideways"), None);
    }

    #[test]
    fn condition_serde_is_tagged() {
        let c = AlarmCondition::Price {
            direction: Direction::Above,
            target_value: 300.0,
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["kind"], "price");
        assert_eq!(v["direction"], "above");

        let c = AlarmCondition::Interval {
            interval_secs: 600,
            note: "check the oven".to_string(),
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["kind"], "interval");
        assert_eq!(v["interval_secs"], 600);
    }

    #[test]
    fn owner_id_is_transparent_in_json() {
        let o = OwnerId::new("12345");
        assert_eq!(serde_json::to_string(&o).unwrap(), "\"12345\"");
    }
}
