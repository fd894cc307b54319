//! scenario_quote_failure_isolated
//!
//! A failing quote feed for one symbol skips that alarm for the cycle and
//! leaves every other alarm untouched. When the feed recovers, evaluation
//! resumes from the persisted state, so no breach is lost.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use mbl_schemas::{Direction, OwnerId};
use mbl_scheduler::{Scheduler, SchedulerConfig};
use mbl_testkit::{price_draft, temp_store, CaptureNotifier, StaticQuotes};

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn quiet_digest_config() -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: Duration::from_secs(30),
        call_timeout: Duration::from_secs(2),
        digest_hour: 23,
        timezone: chrono_tz::UTC,
    }
}

#[tokio::test]
async fn one_dead_symbol_does_not_stop_the_sweep() {
    let (_dir, store) = temp_store();
    let store = Arc::new(store);
    let quotes = Arc::new(StaticQuotes::new());
    let notifier = Arc::new(CaptureNotifier::new());
    let scheduler = Scheduler::new(
        store.clone(),
        quotes.clone(),
        notifier.clone(),
        quiet_digest_config(),
    );

    store
        .create(price_draft("u1", "THYAO", Direction::Above, 100.0))
        .await
        .unwrap();
    store
        .create(price_draft("u1", "AAPL", Direction::Above, 200.0))
        .await
        .unwrap();

    quotes.set("AAPL", 210.0, "USD");
    quotes.set("THYAO.IS", 120.0, "TRY");
    quotes.fail("THYAO.IS");

    let report = scheduler.run_cycle(at("2026-03-02T10:00:00Z")).await;
    assert_eq!(report.evaluated, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.notified, 1, "the healthy symbol still notified");
    let texts = notifier.sent_to(&OwnerId::new("u1"));
    assert!(texts[0].starts_with("ALARM AAPL:"), "got: {}", texts[0]);

    // Feed recovers: the skipped alarm is evaluated fresh next sweep and
    // fires its base notification. AAPL drops back under target so its
    // episode resets silently.
    quotes.recover("THYAO.IS");
    quotes.set("AAPL", 195.0, "USD");
    let report = scheduler.run_cycle(at("2026-03-02T10:00:30Z")).await;
    assert_eq!(report.skipped, 0);
    assert_eq!(report.notified, 1);
    let texts = notifier.sent_to(&OwnerId::new("u1"));
    assert!(texts[1].starts_with("ALARM THYAO:"), "got: {}", texts[1]);
}

#[tokio::test]
async fn delivery_failure_never_rolls_back_state() {
    let (_dir, store) = temp_store();
    let store = Arc::new(store);
    let quotes = Arc::new(StaticQuotes::new());
    let notifier = Arc::new(CaptureNotifier::new());
    let scheduler = Scheduler::new(
        store.clone(),
        quotes.clone(),
        notifier.clone(),
        quiet_digest_config(),
    );

    store
        .create(price_draft("u1", "THYAO", Direction::Above, 100.0))
        .await
        .unwrap();
    quotes.set("THYAO.IS", 101.0, "TRY");
    notifier.set_fail_all(true);

    let now = at("2026-03-02T10:00:00Z");
    let report = scheduler.run_cycle(now).await;
    assert_eq!(report.notified, 0, "delivery failed");
    assert!(notifier.sent().is_empty());

    // The state transition was recorded before the send and stays recorded.
    let state = &store.list_active(None).await[0];
    assert!(state.in_breach);
    assert_eq!(state.last_notified_at, Some(now));
}
