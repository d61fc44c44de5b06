// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns

//! Trending-topic aggregation: crawl ranked lists from many platforms, keep
//! what matches the keyword rules, score it, and push it to chat webhooks
//! inside a configured time window.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod database;
pub mod error;
pub mod exporter;
pub mod filter;
pub mod models;
pub mod notifier;
pub mod pipeline;
pub mod rank;
pub mod scheduler;
pub mod utils;

pub use cache::ContentCache;
pub use config::{Config, ReportMode};
pub use crawler::{Crawler, NewsNowCrawler};
pub use database::{PushRecordStore, Store};
pub use error::{PipelineError, Result};
pub use exporter::{ExportManifest, JsonExporter};
pub use filter::{ItemFilter, KeywordFilter, KeywordMatcher, KeywordRules, load_rules};
pub use models::{CrawlSnapshot, GroupedItems, Item, Platform, PushRecord, PushStatus};
pub use notifier::{NotificationManager, Notifier};
pub use pipeline::{CollectStats, CycleReport, DailyCollector, Pipeline, PipelineParts};
pub use rank::{Ranker, WeightedRanker};
pub use scheduler::{GateOutcome, PushScheduler, PushTask, TimeWindow};
pub use utils::OperationTimer;
