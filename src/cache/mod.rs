// file: src/cache/mod.rs
// description: daily dedup map, incremental push ledger and crawl history
// reference: https://docs.rs/sled, https://docs.rs/parking_lot

mod daily;
mod history;
mod ledger;

use crate::config::CacheConfig;
use crate::database::Store;
use crate::database::schema::{HISTORY_TREE, PUSHED_TREE};
use crate::error::Result;
use crate::models::Item;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::Span;

/// In-memory items for the current local day, keyed by fingerprint.
struct DailyState {
    items: HashMap<String, Item>,
    last_reset: NaiveDate,
}

pub struct ContentCache {
    daily: RwLock<DailyState>,
    pushed: sled::Tree,
    history: sled::Tree,
    pushed_retention: Duration,
    span: Span,
}

impl ContentCache {
    pub fn new(store: &Store, config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            daily: RwLock::new(DailyState {
                items: HashMap::new(),
                last_reset: local_date(Utc::now()),
            }),
            pushed: store.tree(PUSHED_TREE)?,
            history: store.tree(HISTORY_TREE)?,
            pushed_retention: Duration::days(i64::from(config.pushed_retention_days)),
            span: Span::none(),
        })
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn pushed_retention(&self) -> Duration {
        self.pushed_retention
    }
}

/// Calendar date in the process's local timezone.
pub(crate) fn local_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}
