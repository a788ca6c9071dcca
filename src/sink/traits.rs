//! Page sink trait and error types

use crate::crawler::PageMetadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while persisting pages
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Page sink lock poisoned")]
    Poisoned,

    #[error("Page sink task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// A successfully fetched page, ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub html: String,
    pub metadata: PageMetadata,
    pub links: Vec<String>,
    pub images: Vec<String>,
    pub crawled_at: DateTime<Utc>,
}

/// Destination for crawled pages
#[async_trait]
pub trait PageSink: Send + Sync {
    /// Stores one page; re-persisting a URL replaces the earlier row
    async fn persist(&self, page: &Page) -> SinkResult<()>;
}
