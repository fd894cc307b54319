//! mbl-store
//!
//! Durable alarm/holding store: the single source of truth that survives
//! process restarts. Everything is kept in one human-editable JSON document
//! (see [`document::Document`]); every mutation is written to disk before
//! the call returns, via write-temp-then-rename so a crash mid-write never
//! leaves a torn file.
//!
//! One `tokio::sync::Mutex` serializes all mutations, which subsumes the
//! per-alarm-id exclusion requirement: a cancel and a scheduler update for
//! the same id can never interleave. [`AlarmStore::apply_update`] re-checks
//! the alarm is still `Active` under that lock, so a cancel that lands
//! between the scheduler's sweep read and its write suppresses the pending
//! notification instead of corrupting the record.

pub mod document;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use mbl_engine::AlarmUpdate;
use mbl_schemas::{Alarm, AlarmCondition, AlarmDraft, AlarmStatus, Holding, OwnerId};

pub use document::{Document, Snapshot, SNAPSHOT_RETENTION};

/// Minimum interval for interval-conditioned alarms (seconds).
pub const MIN_INTERVAL_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Store error taxonomy. `Validation` / `NotFound` / `NotOwner` carry text
/// suitable for echoing straight back to the requesting chat.
#[derive(Debug)]
pub enum StoreError {
    /// Malformed draft: missing/invalid target, bad interval, empty symbol.
    Validation(String),
    /// No alarm with this id.
    NotFound(Uuid),
    /// The alarm exists but belongs to a different chat.
    NotOwner,
    /// The document on disk cannot be parsed. Fatal at startup — never run
    /// against inconsistent state.
    Corrupt { path: PathBuf, detail: String },
    /// Filesystem failure while persisting.
    Io(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Validation(msg) => write!(f, "invalid request: {msg}"),
            StoreError::NotFound(id) => write!(f, "no alarm with id {id}"),
            StoreError::NotOwner => write!(f, "this alarm belongs to another chat"),
            StoreError::Corrupt { path, detail } => {
                write!(f, "store document {path:?} is corrupt: {detail}")
            }
            StoreError::Io(msg) => write!(f, "store io error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// AlarmStore
// ---------------------------------------------------------------------------

/// Handle to the persisted document. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct AlarmStore {
    path: PathBuf,
    inner: Mutex<Document>,
}

impl AlarmStore {
    /// Open (or initialize) the store at `path`.
    ///
    /// A missing file starts an empty document. Unparseable content is a
    /// hard error: startup must halt with a clear diagnostic rather than
    /// silently reset operator-editable state.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| StoreError::Io(format!("read {path:?}: {e}")))?;
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                detail: e.to_string(),
            })?
        } else {
            Document::default()
        };

        Ok(Self {
            path,
            inner: Mutex::new(doc),
        })
    }

    // -- alarms -------------------------------------------------------------

    /// Validate a draft and persist a new `Active` alarm.
    pub async fn create(&self, draft: AlarmDraft) -> Result<Alarm, StoreError> {
        validate_draft(&draft)?;

        let alarm = Alarm {
            id: Uuid::new_v4(),
            owner: draft.owner,
            instrument: draft.instrument.trim().to_string(),
            condition: draft.condition,
            created_at: Utc::now(),
            status: AlarmStatus::Active,
            in_breach: false,
            escalation_count: 0,
            last_notified_at: None,
        };

        let mut doc = self.inner.lock().await;
        doc.alarms.push(alarm.clone());
        self.persist(&doc)?;
        Ok(alarm)
    }

    /// Cancel an alarm. Cancellation is a status change, not a delete — the
    /// record stays in the document as history.
    pub async fn cancel(&self, id: Uuid, owner: &OwnerId) -> Result<Alarm, StoreError> {
        let mut doc = self.inner.lock().await;
        let alarm = doc
            .alarms
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if &alarm.owner != owner {
            return Err(StoreError::NotOwner);
        }
        alarm.status = AlarmStatus::Cancelled;
        alarm.in_breach = false;
        alarm.escalation_count = 0;
        let cancelled = alarm.clone();
        self.persist(&doc)?;
        Ok(cancelled)
    }

    /// Active alarms, optionally scoped to one owner (scheduler passes
    /// `None` for its global sweep). Returns copies — callers must not hold
    /// them across cycles.
    pub async fn list_active(&self, owner: Option<&OwnerId>) -> Vec<Alarm> {
        let doc = self.inner.lock().await;
        doc.alarms
            .iter()
            .filter(|a| a.is_active())
            .filter(|a| owner.map_or(true, |o| &a.owner == o))
            .cloned()
            .collect()
    }

    /// Write back the scheduler's per-cycle field updates.
    ///
    /// Returns `Ok(None)` when the alarm is no longer `Active` — the cancel
    /// won the race and the caller must not dispatch.
    pub async fn apply_update(
        &self,
        id: Uuid,
        update: &AlarmUpdate,
    ) -> Result<Option<Alarm>, StoreError> {
        let mut doc = self.inner.lock().await;
        let alarm = doc
            .alarms
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if !alarm.is_active() {
            return Ok(None);
        }

        if let Some(b) = update.in_breach {
            alarm.in_breach = b;
        }
        if let Some(c) = update.escalation_count {
            alarm.escalation_count = c;
        }
        if let Some(ts) = update.last_notified_at {
            alarm.last_notified_at = Some(ts);
        }
        let updated = alarm.clone();
        self.persist(&doc)?;
        Ok(Some(updated))
    }

    // -- holdings -----------------------------------------------------------

    /// Create or overwrite the (owner, instrument) holding.
    pub async fn upsert_holding(
        &self,
        owner: OwnerId,
        instrument: &str,
        quantity: f64,
        unit: &str,
    ) -> Result<Holding, StoreError> {
        let instrument = instrument.trim().to_string();
        if instrument.is_empty() {
            return Err(StoreError::Validation("instrument must not be empty".into()));
        }
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(StoreError::Validation(format!(
                "quantity must be a positive number, got {quantity}"
            )));
        }

        let holding = Holding {
            owner,
            instrument: instrument.clone(),
            quantity,
            unit: unit.trim().to_string(),
            recorded_at: Utc::now(),
        };

        let mut doc = self.inner.lock().await;
        doc.holdings
            .retain(|h| !(h.owner == holding.owner && h.instrument == instrument));
        doc.holdings.push(holding.clone());
        self.persist(&doc)?;
        Ok(holding)
    }

    pub async fn holdings(&self, owner: &OwnerId) -> Vec<Holding> {
        let doc = self.inner.lock().await;
        doc.holdings
            .iter()
            .filter(|h| &h.owner == owner)
            .cloned()
            .collect()
    }

    // -- digest bookkeeping --------------------------------------------------

    /// Owners with at least one active alarm or one holding — the digest
    /// audience.
    pub async fn owners_with_watches(&self) -> Vec<OwnerId> {
        let doc = self.inner.lock().await;
        let mut owners: Vec<OwnerId> = doc
            .alarms
            .iter()
            .filter(|a| a.is_active())
            .map(|a| a.owner.clone())
            .chain(doc.holdings.iter().map(|h| h.owner.clone()))
            .collect();
        owners.sort();
        owners.dedup();
        owners
    }

    /// Whether the owner's digest for `local_date` has not been sent yet.
    pub async fn digest_due(&self, owner: &OwnerId, local_date: NaiveDate) -> bool {
        let doc = self.inner.lock().await;
        doc.digest_log.get(owner.as_str()) != Some(&local_date)
    }

    /// Record that the owner's digest for `local_date` went out. Durable
    /// before return, so repeated wakes in the same minute stay idempotent
    /// even across a restart.
    pub async fn mark_digest_sent(
        &self,
        owner: &OwnerId,
        local_date: NaiveDate,
    ) -> Result<(), StoreError> {
        let mut doc = self.inner.lock().await;
        doc.digest_log.insert(owner.as_str().to_string(), local_date);
        self.persist(&doc)
    }

    pub async fn last_snapshot(&self) -> Option<Snapshot> {
        let doc = self.inner.lock().await;
        doc.snapshots.last().cloned()
    }

    /// Append a digest price snapshot, trimming to [`SNAPSHOT_RETENTION`].
    pub async fn push_snapshot(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        let mut doc = self.inner.lock().await;
        doc.snapshots.push(snapshot);
        let len = doc.snapshots.len();
        if len > SNAPSHOT_RETENTION {
            doc.snapshots.drain(..len - SNAPSHOT_RETENTION);
        }
        self.persist(&doc)
    }

    // -- persistence ---------------------------------------------------------

    /// Write the document atomically: serialize, write a sibling temp file,
    /// rename over the target.
    fn persist(&self, doc: &Document) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| StoreError::Io(format!("serialize document: {e}")))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Io(format!("create_dir_all {parent:?}: {e}")))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StoreError::Io(format!("write {tmp:?}: {e}")))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| StoreError::Io(format!("rename {tmp:?} -> {:?}: {e}", self.path)))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Draft validation
// ---------------------------------------------------------------------------

fn validate_draft(draft: &AlarmDraft) -> Result<(), StoreError> {
    match &draft.condition {
        AlarmCondition::Price { target_value, .. } => {
            if draft.instrument.trim().is_empty() {
                return Err(StoreError::Validation(
                    "price alarm needs an instrument symbol".into(),
                ));
            }
            if !target_value.is_finite() || *target_value <= 0.0 {
                return Err(StoreError::Validation(format!(
                    "target value must be positive, got {target_value}"
                )));
            }
        }
        AlarmCondition::Interval { interval_secs, .. } => {
            if *interval_secs < MIN_INTERVAL_SECS {
                return Err(StoreError::Validation(format!(
                    "interval must be at least {MIN_INTERVAL_SECS} seconds, got {interval_secs}"
                )));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
