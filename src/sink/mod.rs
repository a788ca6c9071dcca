//! Page sink module
//!
//! Crawled pages leave the crawl loop through a bounded channel and are
//! written by a background task, so slow persistence never stalls a worker
//! beyond the channel's capacity.

mod sqlite;
mod traits;
mod writer;

pub use sqlite::{SqlitePageSink, PAGES_SCHEMA_SQL};
pub use traits::{Page, PageSink, SinkError, SinkResult};
pub use writer::{PageSender, PageWriter, WriterSummary};
