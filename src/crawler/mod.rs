//! Crawler module for host claiming, fetching and page processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - HTML extraction of links, images and metadata
//! - The per-host worker
//! - The engine that runs workers against the frontier

mod engine;
mod extract;
mod fetcher;
mod retry;
mod worker;

pub use engine::{shutdown_on_ctrl_c, Engine, EngineOptions, EngineSummary};
pub use extract::{extract_page, ExtractedPage, PageMetadata};
pub use fetcher::{
    AttemptError, Fetch, FetchError, FetchResult, Fetched, HttpFetcher, DEFAULT_USER_AGENT,
};
pub use retry::StoreRetry;
pub use worker::{Worker, WorkerContext, WorkerOutcome, WorkerReport};
