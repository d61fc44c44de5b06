// file: src/notifier/bark.rs
// description: Bark iOS push channel, GET with the message in the path
// reference: https://github.com/Finb/Bark

use super::Notifier;
use super::message;
use crate::error::{PipelineError, Result};
use crate::models::Item;
use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use url::Url;

pub const DEFAULT_BARK_SERVER: &str = "https://api.day.app";
const BARK_TITLE: &str = "TrendHub 热点监控";
const BARK_GROUP: &str = "TrendHub";
const BARK_SOUND: &str = "calypso";
const MAX_ITEMS: usize = 10;

pub struct BarkNotifier {
    server: Url,
    device_key: String,
    client: Client,
}

impl BarkNotifier {
    pub fn new(server: Option<&str>, device_key: &str, client: Client) -> Result<Self> {
        let server = server
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_BARK_SERVER)
            .trim_end_matches('/');
        let server = Url::parse(server)
            .map_err(|e| PipelineError::Config(format!("invalid Bark server '{}': {}", server, e)))?;

        Ok(Self {
            server,
            device_key: device_key.to_string(),
            client,
        })
    }

    /// `{server}/{key}/{title}/{body}?group=..&sound=..[&url=..]`, each path
    /// segment percent-encoded.
    pub fn request_url(&self, items: &[Item]) -> Result<Url> {
        if self.device_key.trim().is_empty() {
            return Err(PipelineError::Notify {
                channel: "Bark".to_string(),
                message: "device key is empty".to_string(),
            });
        }

        let body = message::summary(items, MAX_ITEMS, Local::now());
        let mut url = self.server.clone();
        url.path_segments_mut()
            .map_err(|_| PipelineError::Config("Bark server cannot be a base URL".to_string()))?
            .pop_if_empty()
            .push(&self.device_key)
            .push(BARK_TITLE)
            .push(&body);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("group", BARK_GROUP);
            query.append_pair("sound", BARK_SOUND);
            if let Some(first) = items.first().filter(|i| !i.url.is_empty()) {
                query.append_pair("url", &first.url);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl Notifier for BarkNotifier {
    fn name(&self) -> &str {
        "Bark"
    }

    async fn send(&self, items: &[Item]) -> Result<()> {
        let url = self.request_url(items)?;
        let response = self.client.get(url).send().await?;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url_layout() {
        let bark = BarkNotifier::new(Some("https://bark.example.com/"), "KEY", Client::new()).unwrap();
        let items = vec![Item::new("a b", "weibo", 1).with_url("https://w/1")];
        let url = bark.request_url(&items).unwrap();

        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], "KEY");
        assert!(url.as_str().starts_with("https://bark.example.com/KEY/"));
        assert!(url.query().unwrap().contains("group=TrendHub"));
        assert!(url.query().unwrap().contains("sound=calypso"));
        assert!(url.query().unwrap().contains("url=https%3A%2F%2Fw%2F1"));
    }

    #[test]
    fn test_default_server_and_empty_key() {
        let bark = BarkNotifier::new(None, "  ", Client::new()).unwrap();
        assert_eq!(bark.server.as_str(), "https://api.day.app/");
        assert!(bark.request_url(&[]).is_err());
    }
}
