//! Statistics from the frontier and the pages database
//!
//! This module provides functionality for collecting and displaying
//! crawl statistics for `--stats` and the end-of-run summary.

use crate::crawler::EngineSummary;
use crate::frontier::{FrontierStats, FrontierStore};
use crate::sink::SqlitePageSink;
use crate::SpiderError;
use std::fmt::Write;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    pub frontier: FrontierStats,

    /// Rows in the pages database, if it was available
    pub stored_pages: Option<u64>,
}

/// Loads statistics from the frontier store and optionally the pages database
///
/// # Arguments
///
/// * `store` - The frontier to query
/// * `pages` - The pages database, when it exists
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(SpiderError)` - Failed to query statistics
pub async fn load_statistics(
    store: &dyn FrontierStore,
    pages: Option<&SqlitePageSink>,
) -> Result<CrawlStatistics, SpiderError> {
    let frontier = store.stats().await?;
    let stored_pages = match pages {
        Some(sink) => Some(sink.count().await?),
        None => None,
    };

    Ok(CrawlStatistics {
        frontier,
        stored_pages,
    })
}

/// Renders statistics as a human-readable report
pub fn render_statistics(stats: &CrawlStatistics) -> String {
    let f = &stats.frontier;
    let mut out = String::new();

    let _ = writeln!(out, "=== Crawl Statistics ===\n");

    let _ = writeln!(out, "Hosts:");
    let _ = writeln!(out, "  Waiting entries: {}", f.new_entries);
    let _ = writeln!(out, "  Claimed: {}", f.claimed);
    let _ = writeln!(out, "  Active: {}", f.active);
    let _ = writeln!(out, "  Completed: {}", f.completed);
    let _ = writeln!(out, "  Abandoned: {}", f.abandoned);
    let _ = writeln!(out);

    let _ = writeln!(out, "URLs:");
    let _ = writeln!(out, "  Queued: {}", f.queued_urls);
    let _ = writeln!(out, "  Visited: {}", f.visited_urls);
    let _ = writeln!(out, "  Cached policies: {}", f.cached_policies);

    if let Some(pages) = stats.stored_pages {
        let _ = writeln!(out);
        let _ = writeln!(out, "Pages stored: {}", pages);
    }

    let finished = f.completed + f.abandoned;
    if finished > 0 {
        let completion_rate = (f.completed as f64 / finished as f64) * 100.0;
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Completion Rate: {:.1}% ({} / {} finished hosts completed)",
            completion_rate, f.completed, finished
        );
    }

    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &CrawlStatistics) {
    print!("{}", render_statistics(stats));
}

/// Renders the totals of one engine run
pub fn render_run_summary(summary: &EngineSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Crawl Finished ===\n");
    let _ = writeln!(out, "  Hosts claimed: {}", summary.hosts_claimed);
    let _ = writeln!(out, "  Hosts completed: {}", summary.hosts_completed);
    let _ = writeln!(out, "  Hosts abandoned: {}", summary.hosts_abandoned);
    if summary.hosts_interrupted > 0 {
        let _ = writeln!(out, "  Hosts interrupted: {}", summary.hosts_interrupted);
    }
    if summary.hosts_failed > 0 {
        let _ = writeln!(out, "  Hosts failed: {}", summary.hosts_failed);
    }
    let _ = writeln!(out, "  Pages crawled: {}", summary.pages);
    let _ = writeln!(out, "  Pages persisted: {}", summary.pages_persisted);
    let _ = writeln!(out, "  Failed fetches: {}", summary.fetch_failures);
    out
}
