// file: src/cache/ledger.rs
// description: persisted record of items already released in incremental mode

use super::ContentCache;
use crate::error::Result;
use crate::models::{Item, LedgerEntry};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

impl ContentCache {
    pub fn mark_pushed(&self, items: &[Item]) -> Result<usize> {
        self.mark_pushed_at(items, Utc::now())
    }

    /// Writes every entry in one batch; expiry is `now` plus the retention.
    pub fn mark_pushed_at(&self, items: &[Item], now: DateTime<Utc>) -> Result<usize> {
        let _enter = self.span.enter();
        let mut batch = sled::Batch::default();

        for item in items {
            let entry = LedgerEntry {
                fingerprint: item.fingerprint(),
                title: item.title.clone(),
                source: item.source_name.clone(),
                pushed_at: now,
                expires_at: now + self.pushed_retention,
            };
            batch.insert(entry.fingerprint.as_bytes(), serde_json::to_vec(&entry)?);
        }

        self.pushed.apply_batch(batch)?;
        debug!("Marked {} items as pushed", items.len());
        Ok(items.len())
    }

    pub fn is_pushed(&self, item: &Item) -> Result<bool> {
        self.is_pushed_at(item, Utc::now())
    }

    /// Expired entries read as "not pushed" but stay until reaped.
    pub fn is_pushed_at(&self, item: &Item, now: DateTime<Utc>) -> Result<bool> {
        match self.pushed.get(item.fingerprint().as_bytes())? {
            Some(value) => {
                let entry: LedgerEntry = serde_json::from_slice(&value)?;
                Ok(entry.is_active(now))
            }
            None => Ok(false),
        }
    }

    pub fn filter_unpushed(&self, items: Vec<Item>) -> Vec<Item> {
        self.filter_unpushed_at(items, Utc::now())
    }

    /// Keeps items not actively pushed. An entry that cannot be read counts
    /// as not pushed, so a damaged ledger risks a repeat instead of
    /// stopping the cycle.
    pub fn filter_unpushed_at(&self, items: Vec<Item>, now: DateTime<Utc>) -> Vec<Item> {
        let _enter = self.span.enter();
        let mut unpushed = Vec::with_capacity(items.len());
        let mut unreadable = 0;
        for item in items {
            match self.is_pushed_at(&item, now) {
                Ok(true) => {}
                Ok(false) => unpushed.push(item),
                Err(e) => {
                    warn!(title = %item.title, "push ledger lookup failed, treating as new: {}", e);
                    unreadable += 1;
                    unpushed.push(item);
                }
            }
        }
        if unreadable > 0 {
            warn!("{} push ledger entries could not be read", unreadable);
        }
        unpushed
    }

    pub fn reap_expired(&self) -> Result<usize> {
        self.reap_expired_at(Utc::now())
    }

    /// Full scan. Unreadable entries are removed along with expired ones.
    pub fn reap_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let _enter = self.span.enter();
        let mut batch = sled::Batch::default();
        let mut removed = 0;

        for entry in self.pushed.iter() {
            let (key, value) = entry?;
            let expired = match serde_json::from_slice::<LedgerEntry>(&value) {
                Ok(entry) => !entry.is_active(now),
                Err(e) => {
                    warn!(
                        key = %String::from_utf8_lossy(&key),
                        "dropping unreadable ledger entry: {}", e
                    );
                    true
                }
            };
            if expired {
                batch.remove(key);
                removed += 1;
            }
        }

        if removed > 0 {
            self.pushed.apply_batch(batch)?;
            info!("Reaped {} expired push ledger entries", removed);
        }
        Ok(removed)
    }

    pub fn pushed_count(&self) -> usize {
        self.pushed.len()
    }
}
