// file: src/database/schema.rs
// description: tree names and key encodings for the embedded store
// reference: https://docs.rs/sled

use chrono::{DateTime, NaiveDate, Utc};

pub const PUSHED_TREE: &str = "incremental_pushed";
pub const HISTORY_TREE: &str = "crawl_history";
pub const PUSH_RECORDS_TREE: &str = "push_records";

pub const ALL_TREES: [&str; 3] = [PUSHED_TREE, HISTORY_TREE, PUSH_RECORDS_TREE];

/// Width of a push-record id; `u64::MAX` has 20 decimal digits.
pub const RECORD_ID_WIDTH: usize = 20;

/// `YYYY-MM-DD`, which sorts lexically in calendar order.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

pub fn record_id(nanos: u64) -> String {
    format!("{:0width$}", nanos, width = RECORD_ID_WIDTH)
}

/// Nanoseconds since the epoch, clamped to zero for pre-epoch or
/// out-of-range timestamps.
pub fn timestamp_nanos(ts: DateTime<Utc>) -> u64 {
    ts.timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}
