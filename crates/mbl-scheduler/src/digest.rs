//! Daily digest pass.
//!
//! Runs at the tail of every sweep. At or after the configured local hour,
//! each owner with at least one active alarm or holding gets one digest for
//! the local day: current quotes for their tracked symbols, with the change
//! against the previous digest snapshot when one exists. The per-owner
//! day marker in the store keeps repeated sweeps (and restarts) idempotent.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use tracing::{info, warn};

use mbl_engine::valuation;
use mbl_md::{normalize_symbol, Quote};
use mbl_schemas::OwnerId;
use mbl_store::Snapshot;

use crate::Scheduler;

/// Quote symbol used for USD/TRY context in every non-empty digest.
const RATE_SYMBOL: &str = "TRY=X";

impl Scheduler {
    /// Send digests to every owner due one at `now`. Returns how many went
    /// out. Prices fetched across all owners are folded into one new
    /// snapshot so tomorrow's digest has a comparison baseline.
    pub(crate) async fn digest_pass(
        &self,
        now: DateTime<Utc>,
        cache: &mut HashMap<String, Option<Quote>>,
    ) -> usize {
        let local = now.with_timezone(&self.config.timezone);
        if local.hour() < self.config.digest_hour {
            return 0;
        }
        let today = local.date_naive();

        let mut due = Vec::new();
        for owner in self.store.owners_with_watches().await {
            if self.store.digest_due(&owner, today).await {
                due.push(owner);
            }
        }
        if due.is_empty() {
            return 0;
        }

        let previous = self.store.last_snapshot().await;
        let mut all_prices: BTreeMap<String, f64> = BTreeMap::new();
        let mut sent = 0;

        for owner in due {
            let mut lines = Vec::new();
            for symbol in self.tracked_symbols(&owner).await {
                let quote = self.fetch_cached(cache, &symbol).await;
                if let Some(q) = &quote {
                    all_prices.insert(symbol.clone(), q.price);
                }
                lines.push(digest_line(&symbol, quote.as_ref(), previous.as_ref()));
            }

            let text = render_digest(today, &lines);
            self.deliver(&owner, &text).await;
            // Marked sent even when delivery failed: at-most-once per day.
            if let Err(e) = self.store.mark_digest_sent(&owner, today).await {
                warn!(owner = %owner, error = %e, "failed to record digest marker");
            }
            sent += 1;
        }

        if !all_prices.is_empty() {
            if let Err(e) = self
                .store
                .push_snapshot(Snapshot {
                    taken_at: now,
                    prices: all_prices,
                })
                .await
            {
                warn!(error = %e, "failed to persist digest snapshot");
            }
        }

        info!(count = sent, date = %today, "daily digests sent");
        sent
    }

    /// Query symbols an owner's digest covers: active price alarms plus
    /// holdings, deduplicated, with the USD/TRY rate appended when anything
    /// is tracked at all.
    async fn tracked_symbols(&self, owner: &OwnerId) -> Vec<String> {
        let mut symbols: BTreeSet<String> = BTreeSet::new();
        for alarm in self.store.list_active(Some(owner)).await {
            if alarm.condition.is_price() {
                symbols.insert(normalize_symbol(&alarm.instrument));
            }
        }
        for holding in self.store.holdings(owner).await {
            symbols.insert(valuation::query_symbol(&holding.instrument, &holding.unit).0);
        }
        if !symbols.is_empty() {
            symbols.insert(RATE_SYMBOL.to_string());
        }
        symbols.into_iter().collect()
    }
}

/// One digest line for one symbol.
fn digest_line(symbol: &str, quote: Option<&Quote>, previous: Option<&Snapshot>) -> String {
    let Some(quote) = quote else {
        return format!("{symbol}: quote unavailable");
    };
    match previous.and_then(|s| s.prices.get(symbol)) {
        Some(prev) if *prev > 0.0 => {
            let pct = (quote.price - prev) / prev * 100.0;
            format!("{symbol}: {prev:.2} -> {:.2} ({pct:+.2}%)", quote.price)
        }
        _ => format!("{symbol}: {:.2}", quote.price),
    }
}

fn render_digest(date: NaiveDate, lines: &[String]) -> String {
    if lines.is_empty() {
        return format!("Market digest {date}\nNo tracked instruments yet.");
    }
    format!("Market digest {date}\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, price: f64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            price,
            currency: "USD".to_string(),
            change_percent: None,
        }
    }

    #[test]
    fn line_without_history_shows_price_only() {
        let line = digest_line("GC=F", Some(&quote("GC=F", 2000.0)), None);
        assert_eq!(line, "GC=F: 2000.00");
    }

    #[test]
    fn line_with_history_shows_signed_change() {
        let previous = Snapshot {
            taken_at: Utc::now(),
            prices: [("GC=F".to_string(), 2000.0)].into_iter().collect(),
        };
        let line = digest_line("GC=F", Some(&quote("GC=F", 2100.0)), Some(&previous));
        assert_eq!(line, "GC=F: 2000.00 -> 2100.00 (+5.00%)");

        let line = digest_line("GC=F", Some(&quote("GC=F", 1900.0)), Some(&previous));
        assert_eq!(line, "GC=F: 2000.00 -> 1900.00 (-5.00%)");
    }

    #[test]
    fn line_with_failed_quote_degrades() {
        assert_eq!(digest_line("THYAO.IS", None, None), "THYAO.IS: quote unavailable");
    }

    #[test]
    fn render_includes_date_header() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let text = render_digest(date, &["A: 1.00".to_string()]);
        assert!(text.starts_with("Market digest 2026-03-02\n"));
    }
}
