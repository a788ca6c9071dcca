//! SQLite page sink
//!
//! Stores crawled pages in a `pages` table, one row per URL.

use crate::sink::traits::{Page, PageSink, SinkError, SinkResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQL schema for the pages database
pub const PAGES_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    status INTEGER NOT NULL,
    html TEXT NOT NULL,
    metadata TEXT NOT NULL,
    links TEXT NOT NULL,
    images TEXT NOT NULL,
    crawled_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_crawled_at ON pages(crawled_at);
"#;

/// SQLite page sink
#[derive(Clone)]
pub struct SqlitePageSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePageSink {
    /// Opens or creates the pages database at `path`
    pub fn open(path: &Path) -> SinkResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        conn.execute_batch(PAGES_SCHEMA_SQL)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(PAGES_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of stored pages
    pub async fn count(&self) -> SinkResult<u64> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| SinkError::Poisoned)?;
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await?
    }
}

#[async_trait]
impl PageSink for SqlitePageSink {
    async fn persist(&self, page: &Page) -> SinkResult<()> {
        let metadata = serde_json::to_string(&page.metadata)?;
        let links = serde_json::to_string(&page.links)?;
        let images = serde_json::to_string(&page.images)?;
        let url = page.url.clone();
        let status = page.status;
        let html = page.html.clone();
        let crawled_at = page.crawled_at.to_rfc3339();

        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| SinkError::Poisoned)?;
            conn.execute(
                "INSERT INTO pages (url, status, html, metadata, links, images, crawled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(url) DO UPDATE SET
                    status = excluded.status,
                    html = excluded.html,
                    metadata = excluded.metadata,
                    links = excluded.links,
                    images = excluded.images,
                    crawled_at = excluded.crawled_at",
                params![url, status, html, metadata, links, images, crawled_at],
            )?;
            Ok(())
        })
        .await?
    }
}
