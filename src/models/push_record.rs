// file: src/models/push_record.rs
// description: one scheduled release attempt as stored in the push-record ledger
// reference: internal data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushStatus {
    Success,
    Failed,
}

impl fmt::Display for PushStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushStatus::Success => write!(f, "success"),
            PushStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRecord {
    /// Zero-padded nanosecond id; lexical order equals chronological order.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: PushStatus,
    pub item_count: usize,
    #[serde(default)]
    pub notifiers: Vec<String>,
    /// Milliseconds.
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

impl PushRecord {
    pub fn success(
        id: String,
        timestamp: DateTime<Utc>,
        item_count: usize,
        duration: u64,
    ) -> Self {
        Self {
            id,
            timestamp,
            status: PushStatus::Success,
            item_count,
            notifiers: Vec::new(),
            duration,
            error_msg: None,
        }
    }

    pub fn failed(id: String, timestamp: DateTime<Utc>, error: String, duration: u64) -> Self {
        Self {
            id,
            timestamp,
            status: PushStatus::Failed,
            item_count: 0,
            notifiers: Vec::new(),
            duration,
            error_msg: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PushStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let record = PushRecord::failed("1".to_string(), Utc::now(), "boom".to_string(), 12);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""status":"failed""#));
        assert!(json.contains(r#""error_msg":"boom""#));
        assert!(!record.is_success());
    }
}
