// file: src/models/snapshot.rs
// description: daily crawl history snapshot and its bandwidth-bounded summary
// reference: internal data structures

use super::item::{GroupedItems, total_items};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlSnapshot {
    /// YYYY-MM-DD, also the storage key.
    pub date: String,
    pub timestamp: DateTime<Utc>,
    pub data: GroupedItems,
    pub item_count: usize,
}

impl CrawlSnapshot {
    pub fn new(date: String, timestamp: DateTime<Utc>, data: GroupedItems) -> Self {
        let item_count = total_items(&data);
        Self {
            date,
            timestamp,
            data,
            item_count,
        }
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            date: self.date.clone(),
            timestamp: self.timestamp,
            item_count: self.item_count,
            platforms: self
                .data
                .iter()
                .map(|(source, items)| (source.clone(), items.len()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub date: String,
    pub timestamp: DateTime<Utc>,
    pub item_count: usize,
    pub platforms: BTreeMap<String, usize>,
}
