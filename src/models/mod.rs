// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod item;
pub mod ledger;
pub mod push_record;
pub mod snapshot;

pub use item::{GroupedItems, Item, Platform, fingerprint, group_by_source, total_items};
pub use ledger::LedgerEntry;
pub use push_record::{PushRecord, PushStatus};
pub use snapshot::{CrawlSnapshot, SnapshotSummary};
