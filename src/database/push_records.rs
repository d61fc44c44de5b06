// file: src/database/push_records.rs
// description: append-only ledger of scheduled release attempts
// reference: https://docs.rs/sled

use crate::database::client::Store;
use crate::database::schema::{PUSH_RECORDS_TREE, record_id, timestamp_nanos};
use crate::error::{PipelineError, Result};
use crate::models::PushRecord;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Span, debug, info, warn};

pub struct PushRecordStore {
    tree: sled::Tree,
    last_id: AtomicU64,
    span: Span,
}

impl PushRecordStore {
    pub fn new(store: &Store) -> Result<Self> {
        let tree = store.tree(PUSH_RECORDS_TREE)?;

        // Resume the id sequence after the newest stored record.
        let last_id = match tree.last()? {
            Some((key, _)) => std::str::from_utf8(&key)
                .ok()
                .and_then(|k| k.parse::<u64>().ok())
                .unwrap_or(0),
            None => 0,
        };

        Ok(Self {
            tree,
            last_id: AtomicU64::new(last_id),
            span: Span::none(),
        })
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Time-derived id, strictly greater than any id handed out before.
    pub fn next_id(&self, now: DateTime<Utc>) -> String {
        let nanos = timestamp_nanos(now);
        let previous = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(nanos.max(last.saturating_add(1)))
            })
            .unwrap_or(nanos);
        record_id(nanos.max(previous.saturating_add(1)))
    }

    pub fn save(&self, record: &PushRecord) -> Result<()> {
        let _enter = self.span.enter();
        let value = serde_json::to_vec(record)?;
        self.tree.insert(record.id.as_bytes(), value)?;
        debug!(id = %record.id, status = %record.status, "push record saved");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<PushRecord> {
        let _enter = self.span.enter();
        match self.tree.get(id.as_bytes())? {
            Some(value) => Ok(serde_json::from_slice(&value)?),
            None => Err(PipelineError::RecordNotFound(id.to_string())),
        }
    }

    /// Most recent first.
    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<PushRecord>> {
        let _enter = self.span.enter();
        let mut records = Vec::with_capacity(limit.min(64));
        for entry in self.tree.iter().rev().skip(offset).take(limit) {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    pub fn count(&self) -> usize {
        self.tree.len()
    }

    /// Timestamp of the newest record with status `success`.
    pub fn last_success_time(&self) -> Result<Option<DateTime<Utc>>> {
        let _enter = self.span.enter();
        for entry in self.tree.iter().rev() {
            let (key, value) = entry?;
            match serde_json::from_slice::<PushRecord>(&value) {
                Ok(record) if record.is_success() => return Ok(Some(record.timestamp)),
                Ok(_) => {}
                Err(e) => warn!(
                    key = %String::from_utf8_lossy(&key),
                    "skipping unreadable push record: {}", e
                ),
            }
        }
        Ok(None)
    }

    pub fn delete_older_than(&self, days: u32) -> Result<usize> {
        self.delete_older_than_at(days, Utc::now())
    }

    /// Removes records whose id predates `now - days`. Zero days keeps
    /// everything.
    pub fn delete_older_than_at(&self, days: u32, now: DateTime<Utc>) -> Result<usize> {
        let _enter = self.span.enter();
        if days == 0 {
            return Ok(0);
        }

        let cutoff = record_id(timestamp_nanos(now - Duration::days(i64::from(days))));
        let mut batch = sled::Batch::default();
        let mut removed = 0;
        for entry in self.tree.range(..cutoff.as_bytes()) {
            let (key, _) = entry?;
            batch.remove(key);
            removed += 1;
        }

        if removed > 0 {
            self.tree.apply_batch(batch)?;
            info!("Pruned {} push records older than {} days", removed, days);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> PushRecordStore {
        PushRecordStore::new(&Store::temporary().unwrap()).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_ids_are_monotonic_for_equal_timestamps() {
        let records = store();
        let now = at(1_700_000_000);
        let a = records.next_id(now);
        let b = records.next_id(now);
        let c = records.next_id(now - Duration::seconds(5));
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_save_get_and_missing() {
        let records = store();
        let now = at(1_700_000_000);
        let record = PushRecord::success(records.next_id(now), now, 12, 340);
        records.save(&record).unwrap();

        assert_eq!(records.get(&record.id).unwrap(), record);
        assert!(records.get("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_is_most_recent_first_with_paging() {
        let records = store();
        let mut ids = Vec::new();
        for i in 0..5 {
            let ts = at(1_700_000_000 + i * 60);
            let record = PushRecord::success(records.next_id(ts), ts, i as usize, 1);
            ids.push(record.id.clone());
            records.save(&record).unwrap();
        }

        let page: Vec<String> = records.list(2, 1).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(page, vec![ids[3].clone(), ids[2].clone()]);
        assert_eq!(records.count(), 5);
        assert!(records.list(10, 5).unwrap().is_empty());
    }

    #[test]
    fn test_last_success_skips_failures() {
        let records = store();
        assert_eq!(records.last_success_time().unwrap(), None);

        let ok_at = at(1_700_000_000);
        records
            .save(&PushRecord::success(records.next_id(ok_at), ok_at, 3, 10))
            .unwrap();
        let fail_at = at(1_700_000_600);
        records
            .save(&PushRecord::failed(
                records.next_id(fail_at),
                fail_at,
                "webhook down".to_string(),
                10,
            ))
            .unwrap();

        assert_eq!(records.last_success_time().unwrap(), Some(ok_at));
    }

    #[test]
    fn test_delete_older_than_is_idempotent() {
        let records = store();
        let now = at(1_700_000_000);
        for days_ago in [40, 31, 10, 0] {
            let ts = now - Duration::days(days_ago);
            records
                .save(&PushRecord::success(records.next_id(ts), ts, 1, 1))
                .unwrap();
        }

        assert_eq!(records.delete_older_than_at(0, now).unwrap(), 0);
        assert_eq!(records.delete_older_than_at(30, now).unwrap(), 2);
        assert_eq!(records.delete_older_than_at(30, now).unwrap(), 0);
        assert_eq!(records.count(), 2);
    }
}
