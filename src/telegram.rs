//! Telegram Bot API transport (long polling).

use crate::transport::{ChatTransport, InboundMessage, ReplySender};
use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
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

#[derive(Debug, Deserialize)]
struct User {
    username: Option<String>,
}

/// HTTP plumbing shared by the poller and the sender.
#[derive(Clone)]
struct Api {
    client: reqwest::Client,
    token: Arc<SecretString>,
}

impl Api {
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token.expose_secret(), method)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let resp = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            // reqwest errors carry the URL, which contains the token.
            .map_err(|e| anyhow!("{} request failed: {}", method, e.without_url()))?;

        let parsed: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| anyhow!("{} returned an unreadable response: {}", method, e.without_url()))?;
        unwrap_response(method, parsed)
    }
}

fn unwrap_response<T>(method: &str, resp: ApiResponse<T>) -> Result<T> {
    if !resp.ok {
        return Err(anyhow!(
            "{} failed: {}",
            method,
            resp.description.unwrap_or_else(|| "no description".into())
        ));
    }
    resp.result
        .ok_or_else(|| anyhow!("{} returned ok without a result", method))
}

/// Keep text messages and return the offset to acknowledge the batch with.
fn collect_messages(updates: Vec<Update>) -> (Option<i64>, Vec<InboundMessage>) {
    let next_offset = updates.iter().map(|u| u.update_id + 1).max();
    let messages = updates
        .into_iter()
        .filter_map(|u| u.message)
        .filter_map(|m| {
            m.text.map(|text| InboundMessage {
                chat_id: m.chat.id,
                text,
            })
        })
        .collect();
    (next_offset, messages)
}

pub struct TelegramTransport {
    api: Api,
    offset: Option<i64>,
    poll_timeout_secs: u64,
    username: Option<String>,
}

impl TelegramTransport {
    /// Long-poll timeout passed to `getUpdates`.
    const POLL_TIMEOUT_SECS: u64 = 30;

    /// Build the client and resolve the bot's own username.
    pub async fn connect(token: SecretString) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("flavourd/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(Self::POLL_TIMEOUT_SECS + 15))
            .build()
            .context("Failed to build HTTP client")?;
        let api = Api {
            client,
            token: Arc::new(token),
        };

        let me: User = api.call("getMe", json!({})).await?;
        log::info!(
            "Connected to Telegram as @{}",
            me.username.as_deref().unwrap_or("<unnamed>")
        );

        Ok(Self {
            api,
            offset: None,
            poll_timeout_secs: Self::POLL_TIMEOUT_SECS,
            username: me.username,
        })
    }
}

impl ChatTransport for TelegramTransport {
    type Sender = TelegramSender;

    async fn next_batch(&mut self) -> Result<Vec<InboundMessage>> {
        let mut body = json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = self.offset {
            body["offset"] = json!(offset);
        }

        let updates: Vec<Update> = self.api.call("getUpdates", body).await?;
        let (next_offset, messages) = collect_messages(updates);
        if next_offset.is_some() {
            self.offset = next_offset;
        }
        Ok(messages)
    }

    fn split_sender(&self) -> TelegramSender {
        TelegramSender {
            api: self.api.clone(),
        }
    }

    fn bot_username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

#[derive(Clone)]
pub struct TelegramSender {
    api: Api,
}

impl ReplySender for TelegramSender {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value = self
            .api
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_messages_keeps_text_and_advances_offset() {
        let raw = r#"[
            {"update_id": 10, "message": {"message_id": 1, "chat": {"id": -100, "type": "group"}, "text": "/list"}},
            {"update_id": 11, "message": {"message_id": 2, "chat": {"id": -100, "type": "group"}}},
            {"update_id": 12, "edited_message": {"message_id": 1, "chat": {"id": 5, "type": "private"}, "text": "x"}}
        ]"#;
        let updates: Vec<Update> = serde_json::from_str(raw).unwrap();
        let (offset, messages) = collect_messages(updates);

        assert_eq!(offset, Some(13));
        assert_eq!(
            messages,
            vec![InboundMessage {
                chat_id: -100,
                text: "/list".into()
            }]
        );
    }

    #[test]
    fn test_collect_messages_empty_batch() {
        let (offset, messages) = collect_messages(Vec::new());
        assert_eq!(offset, None);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_unwrap_response_error() {
        let resp: ApiResponse<Vec<Update>> =
            serde_json::from_str(r#"{"ok": false, "description": "Unauthorized"}"#).unwrap();
        let err = unwrap_response("getUpdates", resp).unwrap_err();
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[test]
    fn test_unwrap_response_ok() {
        let resp: ApiResponse<User> =
            serde_json::from_str(r#"{"ok": true, "result": {"id": 1, "is_bot": true, "username": "PatonkiBot"}}"#)
                .unwrap();
        let me = unwrap_response("getMe", resp).unwrap();
        assert_eq!(me.username.as_deref(), Some("PatonkiBot"));
    }
}
