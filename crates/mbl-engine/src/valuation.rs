//! Portfolio valuation.
//!
//! Pure: holdings plus a price table in, per-line and total values out.
//! Quote fetching is the caller's job (the daemon collects prices for the
//! query symbols first, then calls [`value_portfolio`]).

use std::collections::HashMap;

use mbl_schemas::Holding;

/// 1 troy ounce in grams. Gold quotes (`GC=F`) are per ounce; users record
/// gold in grams.
pub const GRAMS_PER_TROY_OUNCE: f64 = 31.1035;

/// A priced instrument as the valuation sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub price: f64,
    /// ISO currency code of the quote ("USD", "TRY", …).
    pub currency: String,
}

/// Valuation of one holding.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingLine {
    pub instrument: String,
    pub quantity: f64,
    pub unit: String,
    /// `None` when no price was available for the query symbol.
    pub value_usd: Option<f64>,
    pub value_try: Option<f64>,
    /// Gram-held gold also reports the ounce equivalent.
    pub ounces: Option<f64>,
}

/// Whole-portfolio valuation. Totals cover priced lines only.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioReport {
    pub lines: Vec<HoldingLine>,
    pub total_usd: f64,
    pub total_try: f64,
}

impl PortfolioReport {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// The market symbol to price a holding with, and the multiplier that
/// converts the held quantity into the quote's unit.
///
/// Gold recorded in grams is priced off the ounce-quoted `GC=F` future.
pub fn query_symbol(instrument: &str, unit: &str) -> (String, f64) {
    let upper = instrument.to_ascii_uppercase();
    if upper.contains("ALTIN") || upper.contains("GOLD") || upper == "GC=F" {
        let mult = match unit.to_ascii_lowercase().as_str() {
            "gr" | "gram" | "g" => 1.0 / GRAMS_PER_TROY_OUNCE,
            _ => 1.0,
        };
        return ("GC=F".to_string(), mult);
    }
    (upper, 1.0)
}

/// Value every holding against `prices` (keyed by query symbol).
///
/// `usd_try_rate` converts between the two reported currencies; quotes in
/// currencies other than USD/TRY are treated as USD.
pub fn value_portfolio(
    holdings: &[Holding],
    prices: &HashMap<String, PricePoint>,
    usd_try_rate: f64,
) -> PortfolioReport {
    let mut lines = Vec::with_capacity(holdings.len());
    let mut total_usd = 0.0;
    let mut total_try = 0.0;

    for h in holdings {
        let (symbol, mult) = query_symbol(&h.instrument, &h.unit);
        let ounces = (mult != 1.0).then(|| h.quantity / GRAMS_PER_TROY_OUNCE);

        let Some(point) = prices.get(&symbol) else {
            lines.push(HoldingLine {
                instrument: h.instrument.clone(),
                quantity: h.quantity,
                unit: h.unit.clone(),
                value_usd: None,
                value_try: None,
                ounces,
            });
            continue;
        };

        let native = h.quantity * mult * point.price;
        let (usd, try_) = match point.currency.as_str() {
            "TRY" => {
                let usd = if usd_try_rate > 0.0 {
                    native / usd_try_rate
                } else {
                    0.0
                };
                (usd, native)
            }
            _ => (native, native * usd_try_rate),
        };

        total_usd += usd;
        total_try += try_;
        lines.push(HoldingLine {
            instrument: h.instrument.clone(),
            quantity: h.quantity,
            unit: h.unit.clone(),
            value_usd: Some(usd),
            value_try: Some(try_),
            ounces,
        });
    }

    PortfolioReport {
        lines,
        total_usd,
        total_try,
    }
}
