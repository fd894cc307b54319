//! mbl-notify
//!
//! Notification boundary: the `Notifier` trait the scheduler dispatches
//! through, the delivery-error taxonomy, and the concrete Telegram client.
//!
//! Delivery is at-most-once: the caller logs and swallows `DeliveryError`
//! and never rolls back the state update that recorded the notification as
//! sent.

pub mod telegram;

use std::fmt;

use async_trait::async_trait;

use mbl_schemas::OwnerId;

pub use telegram::{InboundMessage, TelegramClient, TelegramNotifier};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum DeliveryError {
    /// Network or transport failure.
    Transport(String),
    /// The chat platform rejected the send.
    Api { code: Option<i64>, message: String },
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Transport(msg) => write!(f, "delivery transport error: {msg}"),
            DeliveryError::Api {
                code: Some(c),
                message,
            } => write!(f, "delivery api error code={c}: {message}"),
            DeliveryError::Api {
                code: None,
                message,
            } => write!(f, "delivery api error: {message}"),
        }
    }
}

impl std::error::Error for DeliveryError {}

// ---------------------------------------------------------------------------
// Notifier trait
// ---------------------------------------------------------------------------

/// Outbound chat contract: plain text to one owner id, best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, owner: &OwnerId, text: &str) -> Result<(), DeliveryError>;
}
