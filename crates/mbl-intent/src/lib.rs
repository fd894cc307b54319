//! mbl-intent
//!
//! Intent-parser boundary: free user text in, a structured [`Command`] out.
//!
//! The engine never depends on *how* recognition is implemented, only on
//! this contract's shape. [`RuleParser`] is the built-in implementation
//! (slash commands plus a few free-text patterns); a language-model parser
//! can substitute behind the same trait without the engine noticing.

use mbl_schemas::Direction;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A recognized user intent. Field validation (target > 0, minimum
/// interval) happens in the store — the parser only guarantees structure.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateAlarm {
        symbol: String,
        target_value: f64,
        direction: Direction,
    },
    CreateTimer {
        seconds: i64,
        note: String,
    },
    RecordHolding {
        symbol: String,
        quantity: f64,
        unit: String,
    },
    QueryPortfolio,
    ListAlarms,
    /// 1-based index into the owner's active alarm listing.
    CancelAlarm {
        index: usize,
    },
    Help,
}

// ---------------------------------------------------------------------------
// IntentParser trait
// ---------------------------------------------------------------------------

/// The external-collaborator seam. `None` means unrecognized: the caller
/// replies "could not understand" and changes no state.
pub trait IntentParser: Send + Sync {
    fn parse(&self, text: &str) -> Option<Command>;
}

// ---------------------------------------------------------------------------
// RuleParser
// ---------------------------------------------------------------------------

/// Deterministic rule-based parser.
///
/// Recognized forms:
/// - `/alert <symbol> <price> <above|below>`
/// - `/timer <seconds> [note…]`
/// - `/holding <symbol> <quantity> <unit>`
/// - `/portfolio`, `/alarms`, `/cancel <n>`, `/help`, `/start`
/// - bare `portfolio` / `alarms` / `help` (users forget the slash)
#[derive(Debug, Default)]
pub struct RuleParser;

impl RuleParser {
    pub fn new() -> Self {
        Self
    }
}

impl IntentParser for RuleParser {
    fn parse(&self, text: &str) -> Option<Command> {
        let trimmed = text.trim();
        let mut parts = trimmed.split_whitespace();
        let head = parts.next()?;

        match head.to_ascii_lowercase().as_str() {
            "/alert" => {
                let symbol = parts.next()?.to_string();
                let target_value: f64 = parts.next()?.parse().ok()?;
                let direction = Direction::parse(parts.next()?)?;
                if parts.next().is_some() {
                    return None;
                }
                Some(Command::CreateAlarm {
                    symbol,
                    target_value,
                    direction,
                })
            }
            "/timer" => {
                let seconds: i64 = parts.next()?.parse().ok()?;
                let note = parts.collect::<Vec<_>>().join(" ");
                Some(Command::CreateTimer { seconds, note })
            }
            "/holding" => {
                let symbol = parts.next()?.to_string();
                let quantity: f64 = parts.next()?.parse().ok()?;
                let unit = parts.next().unwrap_or("adet").to_string();
                if parts.next().is_some() {
                    return None;
                }
                Some(Command::RecordHolding {
                    symbol,
                    quantity,
                    unit,
                })
            }
            "/portfolio" => Some(Command::QueryPortfolio),
            "/alarms" => Some(Command::ListAlarms),
            "/cancel" => {
                let index: usize = parts.next()?.parse().ok()?;
                (index >= 1).then_some(Command::CancelAlarm { index })
            }
            "/help" | "/start" => Some(Command::Help),
            "portfolio" if parts.next().is_none() => Some(Command::QueryPortfolio),
            "alarms" if parts.next().is_none() => Some(Command::ListAlarms),
            "help" if parts.next().is_none() => Some(Command::Help),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Option<Command> {
        RuleParser::new().parse(text)
    }

    #[test]
    fn alert_command_parses_symbol_target_direction() {
        assert_eq!(
            parse("/alert THYAO 300 above"),
            Some(Command::CreateAlarm {
                symbol: "THYAO".to_string(),
                target_value: 300.0,
                direction: Direction::Above,
            })
        );
        assert_eq!(
            parse("  /alert TRY=X 40.5 below "),
            Some(Command::CreateAlarm {
                symbol: "TRY=X".to_string(),
                target_value: 40.5,
                direction: Direction::Below,
            })
        );
    }

    #[test]
    fn malformed_alert_is_unrecognized() {
        assert_eq!(parse("/alert THYAO"), None);
        assert_eq!(parse("/alert THYAO abc above"), None);
        assert_eq!(parse("/alert THYAO 300 sideways"), None);
        assert_eq!(parse("/alert THYAO 300 above extra"), None);
    }

    #[test]
    fn timer_keeps_the_note_verbatim() {
        assert_eq!(
            parse("/timer 600 turn off the oven"),
            Some(Command::CreateTimer {
                seconds: 600,
                note: "turn off the oven".to_string(),
            })
        );
        assert_eq!(
            parse("/timer 90"),
            Some(Command::CreateTimer {
                seconds: 90,
                note: String::new(),
            })
        );
    }

    #[test]
    fn holding_defaults_unit() {
        assert_eq!(
            parse("/holding ALTIN 540 gram"),
            Some(Command::RecordHolding {
                symbol: "ALTIN".to_string(),
                quantity: 540.0,
                unit: "gram".to_string(),
            })
        );
        assert_eq!(
            parse("/holding AAPL 2"),
            Some(Command::RecordHolding {
                symbol: "AAPL".to_string(),
                quantity: 2.0,
                unit: "adet".to_string(),
            })
        );
    }

    #[test]
    fn cancel_requires_positive_index() {
        assert_eq!(parse("/cancel 2"), Some(Command::CancelAlarm { index: 2 }));
        assert_eq!(parse("/cancel 0"), None);
        assert_eq!(parse("/cancel two"), None);
    }

    #[test]
    fn free_text_is_unrecognized() {
        assert_eq!(parse("what's the weather like"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn query_commands() {
        assert_eq!(parse("/portfolio"), Some(Command::QueryPortfolio));
        assert_eq!(parse("/alarms"), Some(Command::ListAlarms));
        assert_eq!(parse("/help"), Some(Command::Help));
        assert_eq!(parse("/start"), Some(Command::Help));
    }

    #[test]
    fn bare_keywords_work_without_slash() {
        assert_eq!(parse("portfolio"), Some(Command::QueryPortfolio));
        assert_eq!(parse("ALARMS"), Some(Command::ListAlarms));
        assert_eq!(parse("help"), Some(Command::Help));
        // Only the bare keyword on its own; anything else is unrecognized.
        assert_eq!(parse("portfolio please"), None);
    }
}
