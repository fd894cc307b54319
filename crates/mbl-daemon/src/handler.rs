//! Chat command handler.
//!
//! One inbound message in, one reply out. Parsing is delegated to the
//! [`IntentParser`] seam; every state change goes through the store, and
//! store rejections are echoed back verbatim as the reply text.
//!
//! Alarm numbering: `/alarms` and `/cancel <n>` share the store's listing
//! order (creation order), so the number a user sees is the number they
//! cancel with.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use mbl_engine::valuation::{self, PricePoint};
use mbl_intent::{Command, IntentParser};
use mbl_md::QuoteSource;
use mbl_schemas::{Alarm, AlarmCondition, AlarmDraft, Direction, OwnerId};
use mbl_store::AlarmStore;

const UNRECOGNIZED: &str = "Could not understand that. Send /help for the command list.";

const HELP: &str = "MarketBell commands:\n\
    /alert <symbol> <price> <above|below> - price alarm\n\
    /timer <seconds> [note] - repeating timer (min 60s)\n\
    /holding <symbol> <quantity> [unit] - record a position\n\
    /portfolio - value your holdings\n\
    /alarms - list active alarms\n\
    /cancel <n> - cancel alarm number n";

/// Executes recognized commands against the store and quote source.
pub struct CommandHandler {
    store: Arc<AlarmStore>,
    quotes: Arc<dyn QuoteSource>,
    parser: Box<dyn IntentParser>,
}

impl CommandHandler {
    pub fn new(
        store: Arc<AlarmStore>,
        quotes: Arc<dyn QuoteSource>,
        parser: Box<dyn IntentParser>,
    ) -> Self {
        Self {
            store,
            quotes,
            parser,
        }
    }

    /// Handle one inbound message and produce the reply text. Unrecognized
    /// text changes no state.
    pub async fn handle(&self, owner: &OwnerId, text: &str) -> String {
        match self.parser.parse(text) {
            Some(cmd) => {
                info!(owner = %owner, ?cmd, "command accepted");
                self.execute(owner, cmd).await
            }
            None => UNRECOGNIZED.to_string(),
        }
    }

    async fn execute(&self, owner: &OwnerId, cmd: Command) -> String {
        match cmd {
            Command::CreateAlarm {
                symbol,
                target_value,
                direction,
            } => self.create_alarm(owner, symbol, target_value, direction).await,
            Command::CreateTimer { seconds, note } => self.create_timer(owner, seconds, note).await,
            Command::RecordHolding {
                symbol,
                quantity,
                unit,
            } => self.record_holding(owner, symbol, quantity, unit).await,
            Command::QueryPortfolio => self.portfolio(owner).await,
            Command::ListAlarms => self.list_alarms(owner).await,
            Command::CancelAlarm { index } => self.cancel_alarm(owner, index).await,
            Command::Help => HELP.to_string(),
        }
    }

    async fn create_alarm(
        &self,
        owner: &OwnerId,
        symbol: String,
        target_value: f64,
        direction: Direction,
    ) -> String {
        let draft = AlarmDraft {
            owner: owner.clone(),
            instrument: symbol,
            condition: AlarmCondition::Price {
                direction,
                target_value,
            },
        };
        match self.store.create(draft).await {
            Ok(alarm) => format!(
                "Alarm set: {} {} {:.2}. Checked every scheduler sweep.",
                alarm.instrument,
                direction.as_str(),
                target_value
            ),
            Err(e) => e.to_string(),
        }
    }

    async fn create_timer(&self, owner: &OwnerId, seconds: i64, note: String) -> String {
        let draft = AlarmDraft {
            owner: owner.clone(),
            instrument: String::new(),
            condition: AlarmCondition::Interval {
                interval_secs: seconds,
                note,
            },
        };
        match self.store.create(draft).await {
            Ok(_) => format!("Timer set: fires every {seconds} seconds."),
            Err(e) => e.to_string(),
        }
    }

    async fn record_holding(
        &self,
        owner: &OwnerId,
        symbol: String,
        quantity: f64,
        unit: String,
    ) -> String {
        match self
            .store
            .upsert_holding(owner.clone(), &symbol, quantity, &unit)
            .await
        {
            Ok(h) => format!("Recorded: {} {} {}.", h.quantity, h.unit, h.instrument),
            Err(e) => e.to_string(),
        }
    }

    async fn portfolio(&self, owner: &OwnerId) -> String {
        let holdings = self.store.holdings(owner).await;
        if holdings.is_empty() {
            return "No holdings recorded. Add one with /holding.".to_string();
        }

        // One quote per distinct query symbol, plus the USD/TRY rate for
        // the currency conversion. Failures leave the line unpriced.
        let mut prices: HashMap<String, PricePoint> = HashMap::new();
        let mut symbols: Vec<String> = holdings
            .iter()
            .map(|h| valuation::query_symbol(&h.instrument, &h.unit).0)
            .collect();
        symbols.push("TRY=X".to_string());
        symbols.sort();
        symbols.dedup();
        for symbol in &symbols {
            if let Ok(q) = self.quotes.latest(symbol).await {
                prices.insert(
                    symbol.clone(),
                    PricePoint {
                        price: q.price,
                        currency: q.currency,
                    },
                );
            }
        }
        let usd_try_rate = prices.get("TRY=X").map(|p| p.price).unwrap_or(0.0);

        let report = valuation::value_portfolio(&holdings, &prices, usd_try_rate);
        let mut out = String::from("Portfolio:");
        for line in &report.lines {
            match (line.value_usd, line.value_try) {
                (Some(usd), Some(try_)) => {
                    out.push_str(&format!(
                        "\n{} {} {}: {usd:.2} USD / {try_:.2} TRY",
                        line.quantity, line.unit, line.instrument
                    ));
                    if let Some(oz) = line.ounces {
                        out.push_str(&format!(" ({oz:.2} oz)"));
                    }
                }
                _ => out.push_str(&format!(
                    "\n{} {} {}: no quote available",
                    line.quantity, line.unit, line.instrument
                )),
            }
        }
        out.push_str(&format!(
            "\nTotal: {:.2} USD / {:.2} TRY",
            report.total_usd, report.total_try
        ));
        out
    }

    async fn list_alarms(&self, owner: &OwnerId) -> String {
        let alarms = self.store.list_active(Some(owner)).await;
        if alarms.is_empty() {
            return "No active alarms.".to_string();
        }
        let mut out = String::from("Active alarms:");
        for (i, alarm) in alarms.iter().enumerate() {
            out.push_str(&format!("\n{}. {}", i + 1, describe(alarm)));
        }
        out
    }

    async fn cancel_alarm(&self, owner: &OwnerId, index: usize) -> String {
        let alarms = self.store.list_active(Some(owner)).await;
        let Some(alarm) = alarms.get(index - 1) else {
            return format!("No alarm number {index}. Send /alarms to see the list.");
        };
        match self.store.cancel(alarm.id, owner).await {
            Ok(cancelled) => format!("Cancelled: {}", describe(&cancelled)),
            Err(e) => e.to_string(),
        }
    }
}

fn describe(alarm: &Alarm) -> String {
    match &alarm.condition {
        AlarmCondition::Price {
            direction,
            target_value,
        } => format!(
            "{} {} {:.2}",
            alarm.instrument,
            direction.as_str(),
            target_value
        ),
        AlarmCondition::Interval {
            interval_secs,
            note,
        } => {
            if note.trim().is_empty() {
                format!("timer every {interval_secs}s")
            } else {
                format!("timer every {interval_secs}s ({})", note.trim())
            }
        }
    }
}
