// file: src/notifier/webhook.rs
// description: JSON webhook channels (Feishu, DingTalk, WPS, Telegram)
// reference: https://docs.rs/reqwest

use super::Notifier;
use super::message;
use crate::error::{PipelineError, Result};
use crate::models::Item;
use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookKind {
    Feishu,
    DingTalk,
    Wps,
    Telegram { chat_id: String },
}

impl WebhookKind {
    pub fn name(&self) -> &'static str {
        match self {
            WebhookKind::Feishu => "Feishu",
            WebhookKind::DingTalk => "DingTalk",
            WebhookKind::Wps => "WPS",
            WebhookKind::Telegram { .. } => "Telegram",
        }
    }

    /// Request body in the shape each service expects.
    pub fn payload(&self, items: &[Item]) -> Value {
        let now = Local::now();
        match self {
            WebhookKind::Feishu => json!({
                "msg_type": "text",
                "content": { "text": message::plain_text(items, now) },
            }),
            WebhookKind::DingTalk => json!({
                "msgtype": "markdown",
                "markdown": {
                    "title": message::REPORT_TITLE,
                    "text": message::markdown(items, now),
                },
            }),
            WebhookKind::Wps => json!({
                "msgtype": "text",
                "text": { "content": message::plain_text(items, now) },
            }),
            WebhookKind::Telegram { chat_id } => json!({
                "chat_id": chat_id,
                "text": message::html(items, now),
                "parse_mode": "HTML",
            }),
        }
    }
}

pub struct WebhookNotifier {
    kind: WebhookKind,
    endpoint: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(kind: WebhookKind, endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn telegram(bot_token: &str, chat_id: &str, client: Client) -> Self {
        Self::new(
            WebhookKind::Telegram {
                chat_id: chat_id.to_string(),
            },
            format!("{}/bot{}/sendMessage", TELEGRAM_API, bot_token),
            client,
        )
    }

    pub fn kind(&self) -> &WebhookKind {
        &self.kind
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn send(&self, items: &[Item]) -> Result<()> {
        let payload = self.kind.payload(items);
        debug!(channel = self.name(), items = items.len(), "posting webhook");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Notify {
                channel: self.name().to_string(),
                message: format!("API returned HTTP {}", status),
            });
        }
        Ok(())
    }
}
