// file: src/notifier/mod.rs
// description: outbound notification channels and fan-out delivery
// reference: https://docs.rs/futures

mod bark;
pub mod message;
mod webhook;

pub use bark::BarkNotifier;
pub use webhook::{WebhookKind, WebhookNotifier};

use crate::config::WebhooksConfig;
use crate::error::Result;
use crate::models::Item;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Per-channel delivery budget.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, items: &[Item]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    pub delivered: usize,
    pub failed: usize,
}

/// Handle to deliveries already in flight. Dropping it does not cancel them.
pub struct Dispatch {
    handles: Vec<JoinHandle<bool>>,
}

impl Dispatch {
    pub fn channels(&self) -> usize {
        self.handles.len()
    }

    pub async fn wait(self) -> DeliverySummary {
        let mut summary = DeliverySummary::default();
        for outcome in join_all(self.handles).await {
            match outcome {
                Ok(true) => summary.delivered += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    error!("Notification task panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

#[derive(Clone, Default)]
pub struct NotificationManager {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotificationManager {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// One channel per configured webhook. Incomplete settings are skipped.
    pub fn from_config(config: &WebhooksConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let configured = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

        if let Some(url) = configured(&config.feishu_url) {
            notifiers.push(Arc::new(WebhookNotifier::new(
                WebhookKind::Feishu,
                url,
                client.clone(),
            )));
        }
        if let Some(url) = configured(&config.dingtalk_url) {
            notifiers.push(Arc::new(WebhookNotifier::new(
                WebhookKind::DingTalk,
                url,
                client.clone(),
            )));
        }
        match (
            configured(&config.telegram_bot_token),
            configured(&config.telegram_chat_id),
        ) {
            (Some(token), Some(chat_id)) => notifiers.push(Arc::new(WebhookNotifier::telegram(
                &token,
                &chat_id,
                client.clone(),
            ))),
            (Some(_), None) | (None, Some(_)) => {
                warn!("Telegram needs both bot token and chat id, channel disabled")
            }
            (None, None) => {}
        }
        if let Some(key) = configured(&config.bark_device_key) {
            let server = configured(&config.bark_server_url);
            notifiers.push(Arc::new(BarkNotifier::new(
                server.as_deref(),
                &key,
                client.clone(),
            )?));
        }
        if let Some(url) = configured(&config.wps_url) {
            notifiers.push(Arc::new(WebhookNotifier::new(WebhookKind::Wps, url, client)));
        }

        info!("Configured {} notification channels", notifiers.len());
        Ok(Self { notifiers })
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.notifiers.iter().map(|n| n.name().to_string()).collect()
    }

    /// Starts one delivery task per channel and returns immediately.
    /// Failures are logged, never returned.
    pub fn send_all(&self, items: &[Item]) -> Dispatch {
        if items.is_empty() {
            return Dispatch {
                handles: Vec::new(),
            };
        }

        let items: Arc<[Item]> = Arc::from(items);
        let handles = self
            .notifiers
            .iter()
            .map(|notifier| {
                let notifier = Arc::clone(notifier);
                let items = Arc::clone(&items);
                tokio::spawn(async move { deliver(notifier.as_ref(), &items).await })
            })
            .collect();

        Dispatch { handles }
    }
}

async fn deliver(notifier: &dyn Notifier, items: &[Item]) -> bool {
    match tokio::time::timeout(SEND_TIMEOUT, notifier.send(items)).await {
        Ok(Ok(())) => {
            info!("Notification sent via {}", notifier.name());
            true
        }
        Ok(Err(e)) => {
            error!("Failed to send notification via {}: {}", notifier.name(), e);
            false
        }
        Err(_) => {
            error!(
                "Notification via {} timed out after {}s",
                notifier.name(),
                SEND_TIMEOUT.as_secs()
            );
            false
        }
    }
}
