// file: src/pipeline/report.rs
// description: outcome of one pipeline cycle
// reference: aggregated cycle statistics

use crate::config::ReportMode;
use crate::models::Item;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub mode: ReportMode,
    /// Items that entered the cycle, after crawl or from the daily cache.
    pub crawled: usize,
    /// Items left after the ledger and keyword stages.
    pub filtered: usize,
    /// Items handed to notification channels.
    pub notified: usize,
    pub items: Vec<Item>,
    #[serde(skip)]
    pub duration: Duration,
}

impl CycleReport {
    pub fn empty(mode: ReportMode) -> Self {
        Self {
            mode,
            crawled: 0,
            filtered: 0,
            notified: 0,
            items: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.crawled == 0 {
            return 0.0;
        }
        (self.filtered as f64 / self.crawled as f64) * 100.0
    }

    pub fn log_summary(&self) {
        info!("=== Cycle Summary ({}) ===", self.mode);
        info!("Duration: {:.2}s", self.duration.as_secs_f64());
        info!("Items in: {}", self.crawled);
        info!("Items kept: {} ({:.1}%)", self.filtered, self.pass_rate());
        info!("Items notified: {}", self.notified);
    }
}
