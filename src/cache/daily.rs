// file: src/cache/daily.rs
// description: per-day in-memory dedup with lazy midnight reset

use super::{ContentCache, local_date};
use crate::models::{GroupedItems, Item, group_by_source};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

impl ContentCache {
    pub fn add_batch(&self, items: Vec<Item>) -> usize {
        self.add_batch_at(items, Utc::now())
    }

    /// Inserts unseen items and returns how many were new today. A known
    /// item only has its best rank lowered.
    pub fn add_batch_at(&self, items: Vec<Item>, now: DateTime<Utc>) -> usize {
        self.merge_batch_at(items, now).0
    }

    pub fn merge_batch(&self, items: Vec<Item>) -> (usize, usize) {
        self.merge_batch_at(items, Utc::now())
    }

    /// Same as [`add_batch_at`](Self::add_batch_at) but also returns the
    /// cache size, both read under one write lock.
    pub fn merge_batch_at(&self, items: Vec<Item>, now: DateTime<Utc>) -> (usize, usize) {
        let _enter = self.span.enter();
        let today = local_date(now);
        let mut state = self.daily.write();

        if state.last_reset != today {
            info!(
                "Daily cache rolled over from {} to {}, dropping {} items",
                state.last_reset,
                today,
                state.items.len()
            );
            state.items.clear();
            state.last_reset = today;
        }

        let mut added = 0;
        for item in items {
            let key = item.fingerprint();
            match state.items.get_mut(&key) {
                Some(existing) => {
                    if let Some(rank) = item.best_rank() {
                        match existing.ranks.first_mut() {
                            Some(best) if rank < *best => *best = rank,
                            Some(_) => {}
                            None => existing.ranks.push(rank),
                        }
                    }
                }
                None => {
                    state.items.insert(key, item);
                    added += 1;
                }
            }
        }

        let total = state.items.len();
        debug!(added, total, "daily batch merged");
        (added, total)
    }

    /// Copy of today's items, in no particular order.
    pub fn daily_items(&self) -> Vec<Item> {
        self.daily.read().items.values().cloned().collect()
    }

    pub fn daily_grouped(&self) -> GroupedItems {
        group_by_source(self.daily_items())
    }

    pub fn daily_count(&self) -> usize {
        self.daily.read().items.len()
    }

    pub fn clear_daily(&self) {
        let mut state = self.daily.write();
        state.items.clear();
        state.last_reset = local_date(Utc::now());
    }
}
