//! Robots.txt handling module
//!
//! This module fetches a host's robots.txt and sitemaps and turns them into
//! a [`HostPolicy`](crate::state::HostPolicy) plus sitemap seed URLs.

mod builder;
mod parser;
mod sitemap;

pub use builder::{BuilderLimits, BuiltPolicy, PolicyBuilder, PolicyError};
pub use parser::{parse_robots, RobotsRules};
pub use sitemap::{parse_sitemap, Sitemap, SitemapError};
