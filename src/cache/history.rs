// file: src/cache/history.rs
// description: one rolling crawl snapshot per local calendar day

use super::{ContentCache, local_date};
use crate::database::schema::{date_key, parse_date_key};
use crate::error::{PipelineError, Result};
use crate::models::{CrawlSnapshot, GroupedItems, SnapshotSummary};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

impl ContentCache {
    pub fn save_snapshot(&self, data: &GroupedItems) -> Result<()> {
        self.save_snapshot_at(data, Utc::now())
    }

    /// Overwrites whatever was stored for the same date.
    pub fn save_snapshot_at(&self, data: &GroupedItems, now: DateTime<Utc>) -> Result<()> {
        let _enter = self.span.enter();
        let date = date_key(local_date(now));
        let snapshot = CrawlSnapshot::new(date.clone(), now, data.clone());
        self.history
            .insert(date.as_bytes(), serde_json::to_vec(&snapshot)?)?;
        debug!(date = %date, items = snapshot.item_count, "crawl snapshot saved");
        Ok(())
    }

    pub fn get_snapshot(&self, date: &str) -> Result<CrawlSnapshot> {
        let _enter = self.span.enter();
        match self.history.get(date.as_bytes())? {
            Some(value) => Ok(serde_json::from_slice(&value)?),
            None => Err(PipelineError::SnapshotNotFound(date.to_string())),
        }
    }

    /// At most `n` summaries, newest date first.
    pub fn recent_summaries(&self, n: usize) -> Result<Vec<SnapshotSummary>> {
        let _enter = self.span.enter();
        let mut summaries = Vec::with_capacity(n.min(64));

        for entry in self.history.iter().rev() {
            if summaries.len() >= n {
                break;
            }
            let (key, value) = entry?;
            match serde_json::from_slice::<CrawlSnapshot>(&value) {
                Ok(snapshot) => summaries.push(snapshot.summary()),
                Err(e) => warn!(
                    date = %String::from_utf8_lossy(&key),
                    "skipping unreadable snapshot: {}", e
                ),
            }
        }
        Ok(summaries)
    }

    pub fn prune_older_than(&self, days: u32) -> Result<usize> {
        self.prune_older_than_at(days, Utc::now())
    }

    /// Deletes snapshots dated strictly before `today - days`.
    pub fn prune_older_than_at(&self, days: u32, now: DateTime<Utc>) -> Result<usize> {
        let _enter = self.span.enter();
        if days == 0 {
            return Ok(0);
        }

        let cutoff = local_date(now) - Duration::days(i64::from(days));
        let mut batch = sled::Batch::default();
        let mut removed = 0;

        for entry in self.history.iter() {
            let (key, _) = entry?;
            let stale = std::str::from_utf8(&key)
                .ok()
                .and_then(parse_date_key)
                .is_none_or(|date| date < cutoff);
            if !stale {
                break;
            }
            batch.remove(key);
            removed += 1;
        }

        if removed > 0 {
            self.history.apply_batch(batch)?;
            info!("Pruned {} crawl snapshots before {}", removed, cutoff);
        }
        Ok(removed)
    }

    pub fn snapshot_count(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{cache, local};
    use crate::models::{Item, group_by_source};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_same_day_snapshot_overwrites() {
        let cache = cache();
        let morning = local(2026, 10, 18, 8, 0);
        let evening = local(2026, 10, 18, 20, 0);

        cache
            .save_snapshot_at(&group_by_source(vec![Item::new("a", "weibo", 1)]), morning)
            .unwrap();
        cache
            .save_snapshot_at(
                &group_by_source(vec![Item::new("b", "weibo", 1), Item::new("c", "zhihu", 1)]),
                evening,
            )
            .unwrap();

        let snapshot = cache.get_snapshot("2026-10-18").unwrap();
        assert_eq!(snapshot.item_count, 2);
        assert_eq!(snapshot.timestamp, evening);
        assert_eq!(cache.snapshot_count(), 1);
    }

    #[test]
    fn test_missing_snapshot_is_not_found() {
        let cache = cache();
        assert!(cache.get_snapshot("2020-01-01").unwrap_err().is_not_found());
    }

    #[test]
    fn test_recent_summaries_newest_first() {
        let cache = cache();
        for day in 14..=18 {
            let items = (0..day - 13)
                .map(|i| Item::new(format!("t{}", i), "weibo", i + 1))
                .collect::<Vec<_>>();
            cache
                .save_snapshot_at(&group_by_source(items), local(2026, 10, day, 12, 0))
                .unwrap();
        }

        let summaries = cache.recent_summaries(3).unwrap();
        let dates: Vec<&str> = summaries.iter().map(|s| s.date.as_str()).collect();
        assert_eq!(dates, vec!["2026-10-18", "2026-10-17", "2026-10-16"]);
        assert_eq!(summaries[0].item_count, 5);
        assert_eq!(summaries[0].platforms["weibo"], 5);
        assert!(cache.recent_summaries(0).unwrap().is_empty());
    }

    #[test]
    fn test_prune_strictly_before_cutoff_and_idempotent() {
        let cache = cache();
        for day in [10, 11, 12, 18] {
            cache
                .save_snapshot_at(
                    &group_by_source(vec![Item::new("a", "weibo", 1)]),
                    local(2026, 10, day, 12, 0),
                )
                .unwrap();
        }

        let now = local(2026, 10, 18, 12, 0);
        assert_eq!(cache.prune_older_than_at(0, now).unwrap(), 0);
        // Cutoff 2026-10-11: only the 10th is strictly older.
        assert_eq!(cache.prune_older_than_at(7, now).unwrap(), 1);
        assert_eq!(cache.prune_older_than_at(7, now).unwrap(), 0);
        assert_eq!(cache.snapshot_count(), 3);
        assert!(cache.get_snapshot("2026-10-11").is_ok());
    }
}
