// file: src/pipeline/orchestrator.rs
// description: coordinates crawl, ledger, filter, rank and notify for one cycle
// reference: orchestrates asynchronous release workflow

use crate::cache::ContentCache;
use crate::config::{Config, ReportMode};
use crate::crawler::{Crawler, NewsNowCrawler, crawl_with_deadline};
use crate::error::{PipelineError, Result};
use crate::filter::{ItemFilter, KeywordFilter, KeywordMatcher, KeywordRules, ScoringPolicy};
use crate::models::{GroupedItems, Item, total_items};
use crate::notifier::NotificationManager;
use crate::pipeline::report::CycleReport;
use crate::rank::{Ranker, WeightedRanker};
use crate::scheduler::PushTask;
use crate::utils::OperationTimer;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, warn};

/// Everything a cycle needs that can change on config reload.
#[derive(Clone)]
pub struct PipelineParts {
    pub mode: ReportMode,
    pub crawler: Arc<dyn Crawler>,
    pub filter: Arc<dyn ItemFilter>,
    pub ranker: Arc<dyn Ranker>,
    pub notifications: NotificationManager,
    pub notify: bool,
    pub crawl_timeout: Duration,
}

impl PipelineParts {
    pub fn from_config(config: &Config, rules: &KeywordRules) -> Result<Self> {
        let matcher = KeywordMatcher::new(
            &rules.groups,
            &rules.global_filters,
            ScoringPolicy::from(&config.keywords),
        );

        Ok(Self {
            mode: config.report.mode,
            crawler: Arc::new(NewsNowCrawler::new(
                &config.crawler,
                config.platforms.clone(),
            )?),
            filter: Arc::new(KeywordFilter::new(matcher)),
            ranker: Arc::new(WeightedRanker::new(
                config.weight.clone(),
                &config.platforms,
            )),
            notifications: NotificationManager::from_config(&config.notification.webhooks)?,
            notify: config.notification.enabled,
            crawl_timeout: config.crawler.crawl_timeout(),
        })
    }
}

/// Clears the running flag however the cycle ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Pipeline {
    parts: RwLock<Arc<PipelineParts>>,
    cache: Arc<ContentCache>,
    running: AtomicBool,
    shutdown: CancellationToken,
    span: Span,
}

impl Pipeline {
    pub fn new(parts: PipelineParts, cache: Arc<ContentCache>) -> Self {
        Self {
            parts: RwLock::new(Arc::new(parts)),
            cache,
            running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Crawls in flight are cancelled when this token is.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn parts(&self) -> Arc<PipelineParts> {
        Arc::clone(&self.parts.read())
    }

    /// Takes effect from the next cycle; a running cycle keeps its parts.
    pub fn reload(&self, parts: PipelineParts) {
        info!(parent: &self.span, mode = %parts.mode, "Pipeline components reloaded");
        *self.parts.write() = Arc::new(parts);
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn run_once(&self) -> Result<CycleReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(parent: &self.span, "Cycle requested while another one is running");
            return Err(PipelineError::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);

        self.cycle(self.parts()).instrument(self.span.clone()).await
    }

    async fn cycle(&self, parts: Arc<PipelineParts>) -> Result<CycleReport> {
        let started = Instant::now();
        info!("Cycle started in {} mode", parts.mode);

        let raw = match parts.mode {
            ReportMode::Daily => {
                let grouped = self.cache.daily_grouped();
                info!("Retrieved {} items from daily cache", total_items(&grouped));
                grouped
            }
            ReportMode::Current | ReportMode::Incremental => self.crawl(&parts).await?,
        };
        let crawled = total_items(&raw);

        let candidates = if parts.mode == ReportMode::Incremental {
            let unpushed = self.drop_pushed(raw);
            info!(
                "Found {} new items (total: {}, already pushed: {})",
                total_items(&unpushed),
                crawled,
                crawled - total_items(&unpushed)
            );
            unpushed
        } else {
            raw
        };

        let mut report = CycleReport::empty(parts.mode);
        report.crawled = crawled;

        let ranked = filter_and_rank(&parts, candidates);
        report.filtered = ranked.len();

        if ranked.is_empty() {
            info!("No matching items found, skipping notification");
        } else if parts.notify {
            report.notified = self.notify(&parts, &ranked).await;
        } else {
            info!("Notification disabled");
        }

        report.items = ranked;
        report.duration = started.elapsed();
        report.log_summary();
        Ok(report)
    }

    async fn crawl(&self, parts: &PipelineParts) -> Result<GroupedItems> {
        let timer = OperationTimer::new("crawl");
        let data =
            crawl_with_deadline(parts.crawler.as_ref(), parts.crawl_timeout, &self.shutdown)
                .await?;
        timer.finish_with_count(total_items(&data));
        info!("Crawled data from {} platforms", data.len());

        if let Err(e) = self.cache.save_snapshot(&data) {
            warn!("Failed to save crawl history: {}", e);
        }
        Ok(data)
    }

    fn drop_pushed(&self, raw: GroupedItems) -> GroupedItems {
        raw.into_iter()
            .filter_map(|(source, items)| {
                let items = self.cache.filter_unpushed(items);
                (!items.is_empty()).then_some((source, items))
            })
            .collect()
    }

    /// Returns the number of items handed to channels. In incremental
    /// mode the items are marked pushed even when no channel is configured.
    async fn notify(&self, parts: &PipelineParts, ranked: &[Item]) -> usize {
        let notified = if parts.notifications.is_empty() {
            warn!("Notification enabled but no channel is configured");
            0
        } else {
            let timer = OperationTimer::new("notify");
            info!("Sending notifications for {} items", ranked.len());
            let summary = parts.notifications.send_all(ranked).wait().await;
            timer.finish();
            debug!(
                delivered = summary.delivered,
                failed = summary.failed,
                "notification fan-out complete"
            );
            ranked.len()
        };

        if parts.mode == ReportMode::Incremental {
            match self.cache.mark_pushed(ranked) {
                Ok(count) => info!("Marked {} items as pushed", count),
                Err(e) => error!(
                    "Failed to mark items as pushed, they may be sent again: {}",
                    e
                ),
            }
            match self.cache.reap_expired() {
                Ok(0) => {}
                Ok(removed) => info!("Cleaned {} expired push records", removed),
                Err(e) => warn!("Failed to reap expired push records: {}", e),
            }
        }

        notified
    }

    /// Filter and rank arbitrary data with the current parts, without any
    /// side effect.
    pub fn filter_and_rank(&self, raw: GroupedItems) -> Vec<Item> {
        filter_and_rank(&self.parts(), raw)
    }
}

fn filter_and_rank(parts: &PipelineParts, raw: GroupedItems) -> Vec<Item> {
    let timer = OperationTimer::new("filter");
    let filtered = parts.filter.filter(raw);
    timer.finish_with_count(total_items(&filtered));

    let timer = OperationTimer::new("rank");
    let ranked = parts.ranker.rank(filtered);
    timer.finish_with_count(ranked.len());
    ranked
}

#[async_trait]
impl PushTask for Pipeline {
    async fn execute(&self) -> Result<usize> {
        self.run_once().await.map(|report| report.notified)
    }

    fn notifiers(&self) -> Vec<String> {
        self.parts().notifications.names()
    }
}
