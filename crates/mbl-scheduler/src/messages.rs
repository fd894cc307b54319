//! Outbound message text.

use mbl_engine::{deviation, Decision};
use mbl_md::Quote;
use mbl_schemas::{Alarm, AlarmCondition};

/// Notification text for a price alarm that decided to dispatch.
pub(crate) fn price_alarm(alarm: &Alarm, quote: &Quote, decision: Decision) -> String {
    let AlarmCondition::Price {
        direction,
        target_value,
    } = &alarm.condition
    else {
        // Callers only pass price-conditioned alarms here.
        return String::new();
    };

    match decision {
        Decision::NotifyEscalated { level } => {
            let pct = deviation(quote.price, *target_value) * 100.0;
            format!(
                "ALARM {} (level {}): {:.2} {} is {:.1}% past your {} target {:.2}",
                alarm.instrument,
                level.as_number(),
                quote.price,
                quote.currency,
                pct,
                direction.as_str(),
                target_value,
            )
        }
        _ => format!(
            "ALARM {}: {:.2} {} crossed your {} target {:.2}",
            alarm.instrument,
            quote.price,
            quote.currency,
            direction.as_str(),
            target_value,
        ),
    }
}

/// Notification text for a due interval alarm.
pub(crate) fn timer(interval_secs: i64, note: &str) -> String {
    let elapsed = human_duration(interval_secs);
    if note.trim().is_empty() {
        format!("TIMER: {elapsed} is up")
    } else {
        format!("TIMER: {elapsed} is up: {}", note.trim())
    }
}

/// "90" -> "1m 30s", "3600" -> "1h", "60" -> "1m".
fn human_duration(secs: i64) -> String {
    let secs = secs.max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut parts = Vec::new();
    if h > 0 {
        parts.push(format!("{h}h"));
    }
    if m > 0 {
        parts.push(format!("{m}m"));
    }
    if s > 0 || parts.is_empty() {
        parts.push(format!("{s}s"));
    }
    parts.join(" ")
}
