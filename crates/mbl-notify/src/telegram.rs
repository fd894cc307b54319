//! Telegram Bot API client.
//!
//! Thin: `sendMessage` for outbound text and `getUpdates` long polling for
//! inbound messages. No webhook mode, no media, no formatting contract
//! beyond plain text.

use async_trait::async_trait;
use serde::Deserialize;

use mbl_schemas::OwnerId;

use crate::{DeliveryError, Notifier};

/// One inbound chat message, as the daemon's handler consumes it.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub update_id: i64,
    pub chat_id: OwnerId,
    pub text: String,
}

/// HTTP client for one bot token. The token is part of every request URL,
/// so it is redacted from `Debug` output.
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl TelegramClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url.trim_end_matches('/'),
            self.token,
            method
        )
    }

    /// Send plain text to one chat.
    pub async fn send_message(&self, chat_id: &OwnerId, text: &str) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({ "chat_id": chat_id.as_str(), "text": text }))
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = resp.status();
        let body: ApiResponse<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(format!("decode sendMessage: {e}")))?;

        if !body.ok {
            return Err(DeliveryError::Api {
                code: body.error_code.or(Some(status.as_u16() as i64)),
                message: body
                    .description
                    .unwrap_or_else(|| "sendMessage rejected".to_string()),
            });
        }
        Ok(())
    }

    /// Long-poll for new updates past `offset`. Returns text messages only;
    /// everything else (edits, stickers, …) is dropped.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<InboundMessage>, DeliveryError> {
        let url = format!(
            "{}?offset={}&timeout={}",
            self.method_url("getUpdates"),
            offset,
            timeout_secs
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let body: ApiResponse<Vec<Update>> = resp
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(format!("decode getUpdates: {e}")))?;

        if !body.ok {
            return Err(DeliveryError::Api {
                code: body.error_code,
                message: body
                    .description
                    .unwrap_or_else(|| "getUpdates rejected".to_string()),
            });
        }

        let messages = body
            .result
            .unwrap_or_default()
            .into_iter()
            .filter_map(|u| {
                let msg = u.message?;
                let text = msg.text?;
                Some(InboundMessage {
                    update_id: u.update_id,
                    chat_id: OwnerId::new(msg.chat.id.to_string()),
                    text,
                })
            })
            .collect();
        Ok(messages)
    }
}

/// Adapter so the scheduler depends on the trait, not on Telegram.
pub struct TelegramNotifier {
    client: TelegramClient,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, owner: &OwnerId, text: &str) -> Result<(), DeliveryError> {
        self.client.send_message(owner, text).await
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

// ---------------------------------------------------------------------------
// Tests (httpmock-backed)
// ---------------------------------------------------------------------------
