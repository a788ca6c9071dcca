//! Spider: a polite, distributed crawl coordination engine
//!
//! Workers claim hosts from a shared frontier store, fetch their pages
//! under each host's robots policy and crawl delay, and hand finished
//! pages to an asynchronous sink. All cross-worker coordination goes
//! through the atomic operations of [`frontier::FrontierStore`].

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod output;
pub mod robots;
pub mod sink;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Spider operations
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Frontier error: {0}")]
    Frontier(#[from] frontier::FrontierError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Robots policy error: {0}")]
    Policy(#[from] robots::PolicyError),

    #[error("Page sink error: {0}")]
    Sink(#[from] sink::SinkError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Frontier store unavailable after {attempts} consecutive failures: {last}")]
    StoreUnavailable {
        attempts: u32,
        last: frontier::FrontierError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid seed URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Spider operations
pub type Result<T> = std::result::Result<T, SpiderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Engine, Fetch, HttpFetcher};
pub use frontier::{FrontierStore, SqliteFrontier};
pub use state::{HostPolicy, HostStatus};
pub use url::{host_key, normalize};
