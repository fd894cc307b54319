//! Yahoo chart-API provider.
//!
//! `GET {base}/v8/finance/chart/{symbol}?range=1d&interval=1d` and read the
//! quote out of `chart.result[0].meta`. Only the fields we use are modeled;
//! the rest of the (large) payload is ignored.

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Quote, QuoteError, QuoteSource};

/// Quote source backed by the public Yahoo chart endpoint.
pub struct YahooChart {
    client: reqwest::Client,
    base_url: String,
}

impl YahooChart {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl QuoteSource for YahooChart {
    fn name(&self) -> &'static str {
        "yahoo-chart"
    }

    async fn latest(&self, symbol: &str) -> Result<Quote, QuoteError> {
        if symbol.is_empty() {
            return Err(QuoteError::Config("empty symbol".to_string()));
        }

        let url = format!(
            "{}/v8/finance/chart/{}?range=1d&interval=1d",
            self.base_url.trim_end_matches('/'),
            symbol
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QuoteError::Transport(e.to_string()))?;

        let status = resp.status();
        let body: ChartResponse = resp
            .json()
            .await
            .map_err(|e| QuoteError::Decode(e.to_string()))?;

        if let Some(err) = body.chart.error {
            return Err(QuoteError::Api {
                code: Some(status.as_u16() as i64),
                message: format!("{}: {}", err.code, err.description),
            });
        }

        let meta = body
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .map(|r| r.meta)
            .ok_or_else(|| QuoteError::Decode("chart.result is empty".to_string()))?;

        let price = meta
            .regular_market_price
            .ok_or_else(|| QuoteError::Decode("meta.regularMarketPrice missing".to_string()))?;

        let change_percent = meta
            .chart_previous_close
            .filter(|prev| *prev > 0.0)
            .map(|prev| (price - prev) / prev * 100.0);

        Ok(Quote {
            symbol: symbol.to_string(),
            price,
            currency: meta.currency.unwrap_or_else(|| "USD".to_string()),
            change_percent,
        })
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    currency: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests (httpmock-backed)
// ---------------------------------------------------------------------------
