//! mbl-md
//!
//! Quote-source boundary. This crate owns the provider abstraction, the
//! symbol normalization table, and the concrete Yahoo-chart HTTP provider.
//! It does **not** decide anything about alarms; callers fetch quotes and
//! hand them to `mbl-engine`.

pub mod symbols;
pub mod yahoo;

use std::fmt;

use async_trait::async_trait;

pub use symbols::normalize_symbol;
pub use yahoo::YahooChart;

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

/// A current market quote as returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    /// Normalized symbol the quote was fetched for (e.g. `"THYAO.IS"`).
    pub symbol: String,
    pub price: f64,
    /// ISO currency code ("USD", "TRY", …).
    pub currency: String,
    /// Change vs. previous close, percent, when the provider reports one.
    pub change_percent: Option<f64>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`QuoteSource`] implementation may return. The scheduler treats
/// every variant as transient: log, skip the alarm, retry next cycle.
#[derive(Debug)]
pub enum QuoteError {
    /// Network or transport failure.
    Transport(String),
    /// The upstream API returned an application-level error.
    Api { code: Option<i64>, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// A required configuration value is missing or invalid.
    Config(String),
}

impl fmt::Display for QuoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteError::Transport(msg) => write!(f, "transport error: {msg}"),
            QuoteError::Api {
                code: Some(c),
                message,
            } => write!(f, "quote api error code={c}: {message}"),
            QuoteError::Api {
                code: None,
                message,
            } => write!(f, "quote api error: {message}"),
            QuoteError::Decode(msg) => write!(f, "decode error: {msg}"),
            QuoteError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for QuoteError {}

// ---------------------------------------------------------------------------
// QuoteSource trait
// ---------------------------------------------------------------------------

/// Upstream market-data contract.
///
/// Object-safe and `Send + Sync` so callers can hold an
/// `Arc<dyn QuoteSource>` across async task boundaries.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Human-readable provider name (e.g. `"yahoo-chart"`).
    fn name(&self) -> &'static str;

    /// Fetch the current quote for an already-normalized symbol.
    async fn latest(&self, symbol: &str) -> Result<Quote, QuoteError>;
}
