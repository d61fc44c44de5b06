// file: src/crawler/mod.rs
// description: upstream trending-list fetchers
// reference: internal module structure

mod newsnow;

pub use newsnow::NewsNowCrawler;

use crate::error::{PipelineError, Result};
use crate::models::GroupedItems;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Fetches the current list of every configured source. Sources that fail
/// are left out of the result instead of failing the whole crawl.
#[async_trait]
pub trait Crawler: Send + Sync {
    async fn crawl(&self, cancel: &CancellationToken) -> Result<GroupedItems>;
}

/// Runs one crawl bounded by `timeout`. Hitting the deadline cancels the
/// crawl and reports [`PipelineError::Timeout`].
pub async fn crawl_with_deadline(
    crawler: &dyn Crawler,
    timeout: Duration,
    parent: &CancellationToken,
) -> Result<GroupedItems> {
    let token = parent.child_token();
    match tokio::time::timeout(timeout, crawler.crawl(&token)).await {
        Ok(result) => result,
        Err(_) => {
            token.cancel();
            warn!("Crawl exceeded its {}s deadline", timeout.as_secs());
            Err(PipelineError::Timeout(timeout.as_secs()))
        }
    }
}
