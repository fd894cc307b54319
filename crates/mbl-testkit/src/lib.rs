//! mbl-testkit
//!
//! In-process fakes shared by scenario tests across the workspace: a static
//! quote table with failure injection, a notifier that records every send,
//! and store/draft helpers. Nothing here belongs in a production build.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use mbl_md::{Quote, QuoteError, QuoteSource};
use mbl_notify::{DeliveryError, Notifier};
use mbl_schemas::{AlarmCondition, AlarmDraft, Direction, OwnerId};
use mbl_store::AlarmStore;

// ---------------------------------------------------------------------------
// StaticQuotes
// ---------------------------------------------------------------------------

/// Quote source backed by a mutable in-memory table. Symbols listed in the
/// failure set return `QuoteError::Transport` to simulate a flaky feed.
#[derive(Default)]
pub struct StaticQuotes {
    prices: Mutex<HashMap<String, Quote>>,
    failing: Mutex<HashSet<String>>,
}

impl StaticQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, symbol: &str, price: f64, currency: &str) {
        self.prices.lock().unwrap().insert(
            symbol.to_string(),
            Quote {
                symbol: symbol.to_string(),
                price,
                currency: currency.to_string(),
                change_percent: None,
            },
        );
    }

    /// Make subsequent fetches for `symbol` fail until `set` is called again.
    pub fn fail(&self, symbol: &str) {
        self.failing.lock().unwrap().insert(symbol.to_string());
    }

    pub fn recover(&self, symbol: &str) {
        self.failing.lock().unwrap().remove(symbol);
    }
}

#[async_trait]
impl QuoteSource for StaticQuotes {
    fn name(&self) -> &'static str {
        "static-quotes"
    }

    async fn latest(&self, symbol: &str) -> Result<Quote, QuoteError> {
        if self.failing.lock().unwrap().contains(symbol) {
            return Err(QuoteError::Transport(format!(
                "injected failure for {symbol}"
            )));
        }
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .ok_or_else(|| QuoteError::Api {
                code: Some(404),
                message: format!("no static quote for {symbol}"),
            })
    }
}

// ---------------------------------------------------------------------------
// CaptureNotifier
// ---------------------------------------------------------------------------

/// Records every outbound message instead of delivering it. Optionally
/// fails every send to exercise at-most-once semantics.
#[derive(Default)]
pub struct CaptureNotifier {
    sent: Mutex<Vec<(OwnerId, String)>>,
    fail_all: Mutex<bool>,
}

impl CaptureNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(OwnerId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, owner: &OwnerId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, _)| o == owner)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    pub fn set_fail_all(&self, fail: bool) {
        *self.fail_all.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Notifier for CaptureNotifier {
    async fn send(&self, owner: &OwnerId, text: &str) -> Result<(), DeliveryError> {
        if *self.fail_all.lock().unwrap() {
            return Err(DeliveryError::Transport("injected send failure".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((owner.clone(), text.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store / draft helpers
// ---------------------------------------------------------------------------

/// A fresh store in a temp dir. Keep the guard alive for the test's
/// lifetime or the file disappears under the store.
pub fn temp_store() -> (tempfile::TempDir, AlarmStore) {
    let dir = tempfile::tempdir().expect("create tempdir");
    let store = AlarmStore::open(dir.path().join("state.json")).expect("open temp store");
    (dir, store)
}

pub fn price_draft(owner: &str, symbol: &str, direction: Direction, target: f64) -> AlarmDraft {
    AlarmDraft {
        owner: OwnerId::new(owner),
        instrument: symbol.to_string(),
        condition: AlarmCondition::Price {
            direction,
            target_value: target,
        },
    }
}

pub fn interval_draft(owner: &str, interval_secs: i64, note: &str) -> AlarmDraft {
    AlarmDraft {
        owner: OwnerId::new(owner),
        instrument: String::new(),
        condition: AlarmCondition::Interval {
            interval_secs,
            note: note.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_quotes_serve_and_fail_on_demand() {
        let quotes = StaticQuotes::new();
        quotes.set("THYAO.IS", 300.0, "TRY");

        assert_eq!(quotes.latest("THYAO.IS").await.unwrap().price, 300.0);
        assert!(matches!(
            quotes.latest("UNKNOWN").await,
            Err(QuoteError::Api { .. })
        ));

        quotes.fail("THYAO.IS");
        assert!(matches!(
            quotes.latest("THYAO.IS").await,
            Err(QuoteError::Transport(_))
        ));
        quotes.recover("THYAO.IS");
        assert!(quotes.latest("THYAO.IS").await.is_ok());
    }

    #[tokio::test]
    async fn capture_notifier_records_per_owner() {
        let notifier = CaptureNotifier::new();
        let alice = OwnerId::new("alice");
        notifier.send(&alice, "hello").await.unwrap();
        notifier.send(&OwnerId::new("bob"), "hi").await.unwrap();

        assert_eq!(notifier.sent().len(), 2);
        assert_eq!(notifier.sent_to(&alice), vec!["hello".to_string()]);
    }
}
