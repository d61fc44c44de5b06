// file: src/crawler/newsnow.rs
// description: NewsNow aggregation API client, one request per platform
// reference: https://docs.rs/reqwest

use super::Crawler;
use crate::config::CrawlerConfig;
use crate::error::{PipelineError, Result};
use crate::models::{GroupedItems, Item, Platform};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Upper bound of the random delay added to the request interval.
const JITTER_MS: u64 = 200;

#[derive(Debug, Deserialize)]
struct NewsNowResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    items: Vec<NewsNowItem>,
}

#[derive(Debug, Deserialize)]
struct NewsNowItem {
    title: String,
    #[serde(default)]
    url: String,
    #[serde(rename = "mobileUrl", default)]
    mobile_url: String,
}

pub struct NewsNowCrawler {
    client: Client,
    api_base: Url,
    platforms: Vec<Platform>,
    request_interval: Duration,
}

impl NewsNowCrawler {
    pub fn new(config: &CrawlerConfig, platforms: Vec<Platform>) -> Result<Self> {
        let api_base = Url::parse(&config.api_base).map_err(|e| {
            PipelineError::Config(format!("invalid crawler.api_base '{}': {}", config.api_base, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_base,
            platforms,
            request_interval: Duration::from_millis(config.request_interval_ms),
        })
    }

    fn endpoint(&self, platform_id: &str) -> Result<Url> {
        let mut url = self
            .api_base
            .join("/api/s")
            .map_err(|e| PipelineError::Config(format!("invalid crawler endpoint: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("id", platform_id)
            .append_key_only("latest");
        Ok(url)
    }

    async fn fetch_platform(&self, platform: &Platform) -> Result<Vec<Item>> {
        let url = self.endpoint(&platform.id)?;
        debug!(platform = %platform.id, "GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Crawl(format!(
                "{} returned HTTP {}",
                platform.id, status
            )));
        }

        let body = response.text().await?;
        parse_response(&body, platform, Utc::now())
    }

    fn pause(&self) -> Duration {
        if self.request_interval.is_zero() {
            return Duration::ZERO;
        }
        let jitter = rand::rng().random_range(0..JITTER_MS);
        self.request_interval + Duration::from_millis(jitter)
    }
}

/// Turns one API payload into items; list position becomes the rank,
/// counting skipped blank entries.
fn parse_response(body: &str, platform: &Platform, now: DateTime<Utc>) -> Result<Vec<Item>> {
    let response: NewsNowResponse = serde_json::from_str(body)?;
    if response.status == "error" {
        return Err(PipelineError::Crawl(format!(
            "{} reported an error status",
            platform.id
        )));
    }

    Ok(response
        .items
        .into_iter()
        .enumerate()
        .filter(|(_, raw)| !raw.title.trim().is_empty())
        .map(|(index, raw)| {
            let mut item = Item::new(raw.title.trim(), &platform.id, index as u32 + 1)
                .with_source_name(&platform.name)
                .with_url(raw.url);
            item.mobile_url = raw.mobile_url;
            item.first_seen = Some(now);
            item.last_seen = Some(now);
            item.appear_count = 1;
            item.is_new = true;
            item
        })
        .collect())
}

#[async_trait]
impl Crawler for NewsNowCrawler {
    async fn crawl(&self, cancel: &CancellationToken) -> Result<GroupedItems> {
        let mut results = GroupedItems::new();

        for (index, platform) in self.platforms.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(PipelineError::Crawl("crawl cancelled".to_string()));
            }

            match self.fetch_platform(platform).await {
                Ok(items) => {
                    debug!(platform = %platform.id, count = items.len(), "platform fetched");
                    results.insert(platform.id.clone(), items);
                }
                Err(e) => warn!("Error fetching {} ({}): {}", platform.name, platform.id, e),
            }

            if index + 1 < self.platforms.len() {
                let pause = self.pause();
                tokio::select! {
                    () = cancel.cancelled() => {
                        return Err(PipelineError::Crawl("crawl cancelled".to_string()));
                    }
                    () = tokio::time::sleep(pause) => {}
                }
            }
        }

        info!(
            "Crawled {} of {} platforms",
            results.len(),
            self.platforms.len()
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn platform() -> Platform {
        Platform {
            id: "zhihu".to_string(),
            name: "知乎".to_string(),
            weight: 1.0,
        }
    }

    #[test]
    fn test_parse_response_assigns_ranks_and_metadata() {
        let body = r#"{
            "status": "success",
            "items": [
                {"title": "第一条", "url": "https://a", "mobileUrl": "https://m.a"},
                {"title": "  ", "url": "https://skip"},
                {"title": "第二条", "url": "https://b"}
            ]
        }"#;
        let now = Utc::now();
        let items = parse_response(body, &platform(), now).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].ranks, vec![1]);
        assert_eq!(items[1].ranks, vec![3]);
        assert_eq!(items[0].source_name, "知乎");
        assert_eq!(items[0].mobile_url, "https://m.a");
        assert_eq!(items[1].mobile_url, "");
        assert!(items.iter().all(|i| i.is_new && i.appear_count == 1));
        assert_eq!(items[0].first_seen, Some(now));
    }

    #[test]
    fn test_parse_response_error_status() {
        let err = parse_response(r#"{"status":"error","items":[]}"#, &platform(), Utc::now());
        assert!(matches!(err, Err(PipelineError::Crawl(_))));
        assert!(parse_response("not json", &platform(), Utc::now()).is_err());
    }

    #[test]
    fn test_endpoint_keeps_latest_flag() {
        let crawler = NewsNowCrawler::new(&CrawlerConfig::default(), vec![platform()]).unwrap();
        let url = crawler.endpoint("wallstreetcn-hot").unwrap();
        assert_eq!(
            url.as_str(),
            "https://newsnow.busiyi.world/api/s?id=wallstreetcn-hot&latest"
        );
    }

    #[test]
    fn test_zero_interval_means_no_pause() {
        let config = CrawlerConfig {
            request_interval_ms: 0,
            ..CrawlerConfig::default()
        };
        let crawler = NewsNowCrawler::new(&config, vec![]).unwrap();
        assert_eq!(crawler.pause(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_cancelled_crawl_stops_before_requests() {
        let crawler = NewsNowCrawler::new(&CrawlerConfig::default(), vec![platform()]).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        assert!(crawler.crawl(&token).await.is_err());
    }
}
