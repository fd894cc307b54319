//! Symbol normalization.
//!
//! Users (and the intent parser) say "ALTIN", "DOLAR", or "THYAO"; the
//! market-data API wants "GC=F", "TRY=X", "THYAO.IS". Normalization is a
//! fixed table, not a lookup service — unknown symbols pass through
//! uppercased and the provider reports whether they exist.

/// BIST tickers commonly written without the `.IS` suffix.
const COMMON_BIST_TICKERS: &[&str] = &[
    "THYAO", "GARAN", "AKBNK", "ASELS", "KCHOL", "BIMAS", "EREGL", "SISE", "TUPRS",
];

/// Map a user-facing instrument name to the provider's query symbol.
pub fn normalize_symbol(raw: &str) -> String {
    let clean = raw.trim().to_ascii_uppercase();

    if COMMON_BIST_TICKERS.contains(&clean.as_str()) {
        return format!("{clean}.IS");
    }

    match clean.as_str() {
        "ALTIN" | "GOLD" => "GC=F".to_string(),
        "DOLAR" | "USD" | "USDTRY" => "TRY=X".to_string(),
        "EURO" | "EUR" | "EURTRY" => "EURTRY=X".to_string(),
        _ => clean,
    }
}
