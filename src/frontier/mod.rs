//! Frontier module
//!
//! This module provides the shared coordination store: the new-host set,
//! per-host URL queues, the visited set, politeness cooldowns, host claims
//! and cached host policies. Two backends implement [`FrontierStore`]:
//! SQLite for single-machine crawls and Redis for crawls spread across
//! processes.

mod redis;
mod schema;
mod sqlite;
mod traits;

pub use self::redis::RedisFrontier;
pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteFrontier;
pub use traits::{
    ClaimOutcome, ClaimedHost, FrontierError, FrontierResult, FrontierStats, FrontierStore,
    PopOutcome, PushSummary,
};
