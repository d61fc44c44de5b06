// file: src/models/ledger.rs
// description: incremental push ledger entry with absolute expiry
// reference: internal data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub fingerprint: String,
    pub title: String,
    pub source: String,
    pub pushed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Active means "already pushed": strictly before the recorded expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_entry_expires_at_boundary() {
        let now = Utc::now();
        let entry = LedgerEntry {
            fingerprint: "f".to_string(),
            title: "t".to_string(),
            source: "s".to_string(),
            pushed_at: now,
            expires_at: now + Duration::days(7),
        };

        assert!(entry.is_active(now));
        assert!(entry.is_active(now + Duration::days(7) - Duration::seconds(1)));
        assert!(!entry.is_active(now + Duration::days(7)));
    }
}
