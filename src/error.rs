// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Keyword file {path} could not be read: {source}")]
    KeywordFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Crawl failed: {0}")]
    Crawl(String),

    #[error("Notification via {channel} failed: {message}")]
    Notify { channel: String, message: String },

    #[error("No crawl history found for date {0}")]
    SnapshotNotFound(String),

    #[error("Push record not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid time of day '{0}', expected HH:MM")]
    InvalidTimeOfDay(String),

    #[error("A pipeline cycle is already running")]
    AlreadyRunning,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),
}

impl PipelineError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PipelineError::SnapshotNotFound(_) | PipelineError::RecordNotFound(_)
        )
    }
}
