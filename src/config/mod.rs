//! Configuration module for Spider
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every key has a default, so an empty file is a valid
//! configuration.
//!
//! # Example
//!
//! ```no_run
//! use spider::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawling with {} workers", config.crawler.max_workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, StoreBackend, StoreConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash, parse_config,
    ENV_MAX_WORKERS, ENV_STORE_URL,
};
pub use validation::validate;
