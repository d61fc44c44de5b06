// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{PipelineError, Result};
use crate::models::Platform;
use crate::scheduler::TimeWindow;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub crawler: CrawlerConfig,
    pub report: ReportConfig,
    pub notification: NotificationConfig,
    pub weight: WeightConfig,
    pub cache: CacheConfig,
    pub keywords: KeywordConfig,
    pub platforms: Vec<Platform>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/trendhub.db"),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub enabled: bool,
    pub api_base: String,
    /// Pause between two platform requests, plus jitter.
    pub request_interval_ms: u64,
    pub request_timeout_secs: u64,
    /// Upper bound for one full crawl across all platforms.
    pub crawl_timeout_secs: u64,
    /// Daily collector period.
    pub collect_interval_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: "https://newsnow.busiyi.world".to_string(),
            request_interval_ms: 1000,
            request_timeout_secs: 10,
            crawl_timeout_secs: 300,
            collect_interval_secs: 300,
        }
    }
}

impl CrawlerConfig {
    pub fn crawl_timeout(&self) -> Duration {
        Duration::from_secs(self.crawl_timeout_secs)
    }

    /// Periods under one minute fall back to five minutes.
    pub fn collect_interval(&self) -> Duration {
        if self.collect_interval_secs < 60 {
            Duration::from_secs(5 * 60)
        } else {
            Duration::from_secs(self.collect_interval_secs)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    #[default]
    Current,
    Daily,
    Incremental,
}

impl fmt::Display for ReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportMode::Current => write!(f, "current"),
            ReportMode::Daily => write!(f, "daily"),
            ReportMode::Incremental => write!(f, "incremental"),
        }
    }
}

impl FromStr for ReportMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" => Ok(ReportMode::Current),
            "daily" => Ok(ReportMode::Daily),
            "incremental" => Ok(ReportMode::Incremental),
            other => Err(PipelineError::Config(format!(
                "unknown report mode '{}', expected current, daily or incremental",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub mode: ReportMode,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub push_window: PushWindowConfig,
    pub webhooks: WebhooksConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PushWindowConfig {
    pub enabled: bool,
    pub start: String,
    pub end: String,
    pub once_per_day: bool,
    /// Zero disables pruning of the push-record ledger.
    pub push_record_retention_days: u32,
}

impl Default for PushWindowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "08:00".to_string(),
            end: "22:00".to_string(),
            once_per_day: false,
            push_record_retention_days: 30,
        }
    }
}

impl PushWindowConfig {
    /// Fields whose change requires restarting a running scheduler.
    pub fn same_schedule(&self, other: &PushWindowConfig) -> bool {
        self.enabled == other.enabled
            && self.start == other.start
            && self.end == other.end
            && self.once_per_day == other.once_per_day
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhooksConfig {
    pub feishu_url: Option<String>,
    pub dingtalk_url: Option<String>,
    pub wps_url: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub bark_server_url: Option<String>,
    pub bark_device_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeightConfig {
    pub rank_weight: f64,
    pub frequency_weight: f64,
    pub hotness_weight: f64,
    pub keyword_weight: f64,
    pub freshness_weight: f64,
    /// How strongly per-platform weights bend the total, 1.0 is full effect.
    pub platform_weight_effect: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            rank_weight: 0.6,
            frequency_weight: 0.3,
            hotness_weight: 0.1,
            keyword_weight: 0.3,
            freshness_weight: 0.1,
            platform_weight_effect: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub pushed_retention_days: u32,
    /// Zero keeps crawl history forever.
    pub history_retention_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            pushed_retention_days: 7,
            history_retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub file: PathBuf,
    pub required_weight: f64,
    pub normal_weight: f64,
    /// Priority that leaves a group score unchanged.
    pub neutral_priority: u8,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("config/frequency_words.txt"),
            required_weight: 20.0,
            normal_weight: 10.0,
            neutral_priority: 5,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(
                config::File::from(Path::new("config/default.toml")).required(false),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TRENDHUB")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.crawler.crawl_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "crawler.crawl_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.crawler.request_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "crawler.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.notification.push_window.enabled {
            TimeWindow::parse(
                &self.notification.push_window.start,
                &self.notification.push_window.end,
            )
            .map_err(|e| PipelineError::Config(format!("notification.push_window: {}", e)))?;
        }

        let weights = [
            ("rank_weight", self.weight.rank_weight),
            ("frequency_weight", self.weight.frequency_weight),
            ("hotness_weight", self.weight.hotness_weight),
            ("keyword_weight", self.weight.keyword_weight),
            ("freshness_weight", self.weight.freshness_weight),
            ("platform_weight_effect", self.weight.platform_weight_effect),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::Config(format!(
                    "weight.{} must be a non-negative number",
                    name
                )));
            }
        }

        if self.keywords.neutral_priority == 0 {
            return Err(PipelineError::Config(
                "keywords.neutral_priority must be greater than 0".to_string(),
            ));
        }

        if let Some(platform) = self.platforms.iter().find(|p| p.id.trim().is_empty()) {
            return Err(PipelineError::Config(format!(
                "platform '{}' has an empty id",
                platform.name
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.report.mode, ReportMode::Current);
        assert_eq!(config.cache.pushed_retention_days, 7);
        assert_eq!(config.weight.keyword_weight, 0.3);
        assert_eq!(config.weight.freshness_weight, 0.1);
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[report]
mode = "incremental"

[notification.push_window]
enabled = true
start = "22:00"
end = "02:00"
once_per_day = true

[[platforms]]
id = "zhihu"
name = "Zhihu"
weight = 1.2

[[platforms]]
id = "weibo"
name = "Weibo"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.report.mode, ReportMode::Incremental);
        assert!(config.notification.push_window.once_per_day);
        assert_eq!(config.platforms.len(), 2);
        assert_eq!(config.platforms[1].weight, 1.0);
        assert_eq!(config.crawler.crawl_timeout_secs, 300);
    }

    #[test]
    fn test_invalid_push_window_rejected() {
        let mut config = Config::default_config();
        config.notification.push_window.enabled = true;
        config.notification.push_window.start = "25:99".to_string();
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = Config::default_config();
        config.weight.rank_weight = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_collect_interval_floor() {
        let mut crawler = CrawlerConfig::default();
        crawler.collect_interval_secs = 10;
        assert_eq!(crawler.collect_interval(), Duration::from_secs(300));
        crawler.collect_interval_secs = 120;
        assert_eq!(crawler.collect_interval(), Duration::from_secs(120));
    }

    #[test]
    fn test_report_mode_from_str() {
        assert_eq!("Daily".parse::<ReportMode>().unwrap(), ReportMode::Daily);
        assert_eq!(
            " incremental ".parse::<ReportMode>().unwrap(),
            ReportMode::Incremental
        );
        assert!("weekly".parse::<ReportMode>().is_err());
    }

    #[test]
    fn test_same_schedule_ignores_retention() {
        let a = PushWindowConfig::default();
        let mut b = a.clone();
        b.push_record_retention_days = 3;
        assert!(a.same_schedule(&b));
        b.end = "23:00".to_string();
        assert!(!a.same_schedule(&b));
    }
}
