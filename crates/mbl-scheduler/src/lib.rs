//! mbl-scheduler
//!
//! The background evaluation loop: every poll interval, sweep the active
//! alarms, fetch the quotes they need, run the threshold evaluator, persist
//! state transitions, and dispatch notifications. Once per local day, after
//! the configured hour, the same loop sends each owner a market digest.
//!
//! [`Scheduler::run_cycle`] takes `now` as an argument and performs one full
//! sweep, so every timing behavior is testable against a synthetic clock;
//! [`Scheduler::spawn`] is the thin production wrapper that feeds it the
//! wall clock on a `tokio::time::interval`.
//!
//! # Failure isolation
//! One alarm's quote failure, delivery failure, or persist failure never
//! stops the sweep: the alarm is logged and skipped, and the loop moves on.
//! Delivery is at-most-once — the store write that records a notification
//! happens before the send and is never rolled back.

mod digest;
mod messages;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use mbl_engine::{evaluate, tracker, AlarmUpdate, PriceWatch};
use mbl_md::{normalize_symbol, Quote, QuoteSource};
use mbl_notify::Notifier;
use mbl_schemas::{AlarmCondition, OwnerId};
use mbl_store::AlarmStore;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Scheduler knobs. Built from the daemon's `AppConfig` at startup.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Wall-clock gap between sweeps.
    pub poll_interval: Duration,
    /// Per-call budget for one quote fetch or one notification send.
    pub call_timeout: Duration,
    /// Local hour (0..=23) at or after which the daily digest goes out.
    pub digest_hour: u32,
    /// Time zone the digest day boundary is computed in.
    pub timezone: Tz,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            call_timeout: Duration::from_secs(10),
            digest_hour: 8,
            timezone: chrono_tz::Europe::Istanbul,
        }
    }
}

// ---------------------------------------------------------------------------
// CycleReport
// ---------------------------------------------------------------------------

/// What one sweep did. Returned for logging and test assertions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Active alarms inspected.
    pub evaluated: usize,
    /// Notifications delivered (delivery confirmed, not just attempted).
    pub notified: usize,
    /// Alarms skipped because their quote or persist failed this cycle.
    pub skipped: usize,
    /// Daily digests sent this cycle.
    pub digests_sent: usize,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    store: Arc<AlarmStore>,
    quotes: Arc<dyn QuoteSource>,
    notifier: Arc<dyn Notifier>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<AlarmStore>,
        quotes: Arc<dyn QuoteSource>,
        notifier: Arc<dyn Notifier>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            quotes,
            notifier,
            config,
        }
    }

    /// Run the loop forever on the wall clock. Abort the handle to stop.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                poll_interval_secs = self.config.poll_interval.as_secs(),
                provider = self.quotes.name(),
                "scheduler loop started"
            );
            let mut tick = tokio::time::interval(self.config.poll_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let report = self.run_cycle(Utc::now()).await;
                debug!(?report, "sweep complete");
            }
        })
    }

    /// One full sweep at time `now`: evaluate every active alarm, then the
    /// digest pass. Quotes are cached per sweep, so two alarms on the same
    /// symbol cost one provider call, and a symbol that failed once is not
    /// retried until the next sweep.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();
        let mut cache: HashMap<String, Option<Quote>> = HashMap::new();

        for alarm in self.store.list_active(None).await {
            report.evaluated += 1;
            match &alarm.condition {
                AlarmCondition::Price {
                    direction,
                    target_value,
                } => {
                    let symbol = normalize_symbol(&alarm.instrument);
                    let Some(quote) = self.fetch_cached(&mut cache, &symbol).await else {
                        report.skipped += 1;
                        continue;
                    };

                    let watch = PriceWatch {
                        direction: *direction,
                        target_value: *target_value,
                        in_breach: alarm.in_breach,
                        escalation_count: alarm.escalation_count,
                    };
                    let decision = evaluate(&watch, quote.price);
                    let update = tracker::apply(decision, alarm.escalation_count, now);
                    if update.is_noop() {
                        continue;
                    }

                    match self.store.apply_update(alarm.id, &update).await {
                        Ok(Some(_)) => {
                            if update.dispatch {
                                let text = messages::price_alarm(&alarm, &quote, decision);
                                if self.deliver(&alarm.owner, &text).await {
                                    report.notified += 1;
                                }
                            }
                        }
                        // Cancel won the race between sweep read and write.
                        Ok(None) => {
                            debug!(alarm_id = %alarm.id, "alarm no longer active, notification dropped")
                        }
                        Err(e) => {
                            warn!(alarm_id = %alarm.id, error = %e, "alarm update failed");
                            report.skipped += 1;
                        }
                    }
                }
                AlarmCondition::Interval {
                    interval_secs,
                    note,
                } => {
                    // A never-notified interval alarm measures from creation.
                    let baseline = alarm.last_notified_at.unwrap_or(alarm.created_at);
                    if now.signed_duration_since(baseline)
                        < ChronoDuration::seconds(*interval_secs)
                    {
                        continue;
                    }

                    let update = AlarmUpdate {
                        in_breach: None,
                        escalation_count: None,
                        last_notified_at: Some(now),
                        dispatch: true,
                    };
                    match self.store.apply_update(alarm.id, &update).await {
                        Ok(Some(_)) => {
                            let text = messages::timer(*interval_secs, note);
                            if self.deliver(&alarm.owner, &text).await {
                                report.notified += 1;
                            }
                        }
                        Ok(None) => {
                            debug!(alarm_id = %alarm.id, "timer no longer active, notification dropped")
                        }
                        Err(e) => {
                            warn!(alarm_id = %alarm.id, error = %e, "timer update failed");
                            report.skipped += 1;
                        }
                    }
                }
            }
        }

        report.digests_sent = self.digest_pass(now, &mut cache).await;
        report
    }

    /// Fetch a quote through the per-sweep cache. Failures (including
    /// timeouts) are cached as `None` so a dead symbol costs one call per
    /// sweep no matter how many alarms reference it.
    async fn fetch_cached(
        &self,
        cache: &mut HashMap<String, Option<Quote>>,
        symbol: &str,
    ) -> Option<Quote> {
        if let Some(hit) = cache.get(symbol) {
            return hit.clone();
        }
        let fetched =
            match tokio::time::timeout(self.config.call_timeout, self.quotes.latest(symbol)).await
            {
                Ok(Ok(q)) => Some(q),
                Ok(Err(e)) => {
                    warn!(symbol, error = %e, "quote fetch failed");
                    None
                }
                Err(_) => {
                    warn!(symbol, timeout_secs = self.config.call_timeout.as_secs(), "quote fetch timed out");
                    None
                }
            };
        cache.insert(symbol.to_string(), fetched.clone());
        fetched
    }

    /// Send one message, best-effort. Returns whether delivery succeeded;
    /// failures are logged and never propagated.
    async fn deliver(&self, owner: &OwnerId, text: &str) -> bool {
        match tokio::time::timeout(self.config.call_timeout, self.notifier.send(owner, text)).await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(owner = %owner, error = %e, "notification delivery failed");
                false
            }
            Err(_) => {
                warn!(owner = %owner, "notification delivery timed out");
                false
            }
        }
    }
}
