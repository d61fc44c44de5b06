// file: src/models/item.rs
// description: trending item model, source platforms and content fingerprints
// reference: internal data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Items keyed by source id. A `BTreeMap` keeps iteration order stable
/// across runs, which the ranker and snapshot summaries rely on.
pub type GroupedItems = BTreeMap<String, Vec<Item>>;

/// One piece of content observed on one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub url: String,
    #[serde(rename = "mobileUrl", default)]
    pub mobile_url: String,
    /// One entry per observation, smallest is most prominent.
    pub ranks: Vec<u32>,
    pub source_id: String,
    pub source_name: String,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub appear_count: u32,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub match_score: f64,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub keyword_group: Option<usize>,
}

impl Item {
    pub fn new(title: impl Into<String>, source_id: impl Into<String>, rank: u32) -> Self {
        let source_id = source_id.into();
        Self {
            title: title.into(),
            url: String::new(),
            mobile_url: String::new(),
            ranks: vec![rank],
            source_name: source_id.clone(),
            source_id,
            first_seen: None,
            last_seen: None,
            appear_count: 0,
            is_new: false,
            match_score: 0.0,
            matched_keywords: Vec::new(),
            keyword_group: None,
        }
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Most prominent observed rank, if the item has been observed at all.
    pub fn best_rank(&self) -> Option<u32> {
        self.ranks.first().copied()
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.title, &self.source_id)
    }
}

/// Dedup and ledger key: digest over the raw title and the source id.
pub fn fingerprint(title: &str, source_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(source_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn group_by_source(items: impl IntoIterator<Item = Item>) -> GroupedItems {
    let mut grouped = GroupedItems::new();
    for item in items {
        grouped.entry(item.source_id.clone()).or_default().push(item);
    }
    grouped
}

pub fn total_items(grouped: &GroupedItems) -> usize {
    grouped.values().map(Vec::len).sum()
}

/// A monitored source platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub id: String,
    pub name: String,
    #[serde(default = "default_platform_weight")]
    pub weight: f64,
}

fn default_platform_weight() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_consistency() {
        let a = fingerprint("AI公司完成融资", "weibo");
        let b = fingerprint("AI公司完成融资", "weibo");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_depends_on_source_and_case() {
        let base = fingerprint("Rust 1.90 released", "hackernews");
        assert_ne!(base, fingerprint("Rust 1.90 released", "reddit"));
        assert_ne!(base, fingerprint("rust 1.90 released", "hackernews"));
    }

    #[test]
    fn test_group_by_source() {
        let grouped = group_by_source(vec![
            Item::new("a", "zhihu", 1),
            Item::new("b", "weibo", 1),
            Item::new("c", "zhihu", 2),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["zhihu"].len(), 2);
        assert_eq!(total_items(&grouped), 3);
        assert_eq!(grouped.keys().next().map(String::as_str), Some("weibo"));
    }

    #[test]
    fn test_item_deserializes_crawler_payload() {
        let json = r#"{"title":"t","url":"u","mobileUrl":"m","ranks":[3],"source_id":"s","source_name":"S"}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.mobile_url, "m");
        assert_eq!(item.best_rank(), Some(3));
        assert_eq!(item.keyword_group, None);
    }
}
