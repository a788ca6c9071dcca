//! Output module for crawl statistics and run summaries
//!
//! This module handles:
//! - Collecting frontier and page-store statistics
//! - Formatting them for the terminal

pub mod stats;

pub use stats::{
    load_statistics, print_statistics, render_run_summary, render_statistics, CrawlStatistics,
};
