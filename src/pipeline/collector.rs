// file: src/pipeline/collector.rs
// description: background crawl loop feeding the daily dedup cache
// reference: https://docs.rs/tokio/latest/tokio/time/fn.interval.html

use crate::cache::ContentCache;
use crate::crawler::{Crawler, crawl_with_deadline};
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectStats {
    pub added: usize,
    pub total: usize,
}

#[derive(Clone)]
struct CollectTask {
    crawler: Arc<dyn Crawler>,
    cache: Arc<ContentCache>,
    crawl_timeout: Duration,
}

impl CollectTask {
    async fn collect(&self, token: &CancellationToken) -> Result<CollectStats> {
        info!("Collecting data for daily aggregation");
        let data = crawl_with_deadline(self.crawler.as_ref(), self.crawl_timeout, token).await?;

        let items = data.into_values().flatten().collect();
        let (added, total) = self.cache.merge_batch(items);
        info!(
            "Collected data: added {} new items, total cached: {} items",
            added, total
        );
        Ok(CollectStats { added, total })
    }
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Crawls on a fixed period and merges every batch into the daily cache.
pub struct DailyCollector {
    task: CollectTask,
    interval: Duration,
    running: Mutex<Option<Running>>,
    span: Span,
}

impl DailyCollector {
    pub fn new(
        crawler: Arc<dyn Crawler>,
        cache: Arc<ContentCache>,
        interval: Duration,
        crawl_timeout: Duration,
    ) -> Self {
        Self {
            task: CollectTask {
                crawler,
                cache,
                crawl_timeout,
            },
            interval,
            running: Mutex::new(None),
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Collects once right away, then every interval until stopped or
    /// until `parent` is cancelled.
    pub fn start(&self, parent: &CancellationToken) -> bool {
        let mut running = self.running.lock();
        if running
            .as_ref()
            .is_some_and(|r| !r.token.is_cancelled() && !r.handle.is_finished())
        {
            return false;
        }

        let token = parent.child_token();
        let loop_token = token.clone();
        let task = self.task.clone();
        let period = self.interval;

        info!(parent: &self.span, "Daily collector started, collecting every {:?}", period);
        let handle = tokio::spawn(
            async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        () = loop_token.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = task.collect(&loop_token).await {
                                error!("Failed to collect data: {}", e);
                            }
                        }
                    }
                }
                info!("Daily collector loop exited");
            }
            .instrument(self.span.clone()),
        );

        *running = Some(Running { token, handle });
        true
    }

    pub async fn stop(&self) {
        let running = self.running.lock().take();
        if let Some(running) = running {
            running.token.cancel();
            if let Err(e) = running.handle.await {
                warn!(parent: &self.span, "Daily collector ended abnormally: {}", e);
            }
            info!(parent: &self.span, "Daily collector stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.token.is_cancelled() && !r.handle.is_finished())
    }

    /// One collection pass outside the loop.
    pub async fn collect_once(&self) -> Result<CollectStats> {
        let token = CancellationToken::new();
        self.task
            .collect(&token)
            .instrument(self.span.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::database::Store;
    use crate::models::{GroupedItems, Item, group_by_source};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Each crawl returns one fresh item and one repeated item.
    struct RotatingCrawler {
        round: AtomicU32,
    }

    #[async_trait]
    impl Crawler for RotatingCrawler {
        async fn crawl(&self, _cancel: &CancellationToken) -> Result<GroupedItems> {
            let round = self.round.fetch_add(1, Ordering::SeqCst);
            Ok(group_by_source(vec![
                Item::new("常驻热点", "weibo", 5 - round.min(4)),
                Item::new(format!("新热点{}", round), "weibo", 10),
            ]))
        }
    }

    fn collector(interval: Duration) -> (DailyCollector, Arc<ContentCache>) {
        let store = Store::temporary().unwrap();
        let cache = Arc::new(ContentCache::new(&store, &CacheConfig::default()).unwrap());
        let crawler = Arc::new(RotatingCrawler {
            round: AtomicU32::new(0),
        });
        let collector =
            DailyCollector::new(crawler, cache.clone(), interval, Duration::from_secs(5));
        (collector, cache)
    }

    #[tokio::test]
    async fn test_collect_once_dedups_into_cache() {
        let (collector, cache) = collector(Duration::from_secs(300));

        let first = collector.collect_once().await.unwrap();
        assert_eq!(first, CollectStats { added: 2, total: 2 });

        let second = collector.collect_once().await.unwrap();
        assert_eq!(second, CollectStats { added: 1, total: 3 });

        let resident = cache
            .daily_items()
            .into_iter()
            .find(|i| i.title == "常驻热点")
            .unwrap();
        assert_eq!(resident.best_rank(), Some(4));
    }

    #[tokio::test]
    async fn test_start_collects_immediately_and_stops() {
        let (collector, cache) = collector(Duration::from_secs(300));
        let token = CancellationToken::new();

        assert!(collector.start(&token));
        assert!(!collector.start(&token));

        for _ in 0..100 {
            if cache.daily_count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(cache.daily_count(), 2);

        collector.stop().await;
        assert!(!collector.is_running());
    }

    #[tokio::test]
    async fn test_parent_cancellation_stops_collector() {
        let (collector, _) = collector(Duration::from_secs(300));
        let token = CancellationToken::new();
        collector.start(&token);
        token.cancel();
        assert!(!collector.is_running());
    }
}
