//! Frontier store trait and error types
//!
//! This module defines the atomic operations every coordination backend
//! must provide, and the outcomes they report.

use crate::state::{HostPolicy, HostStatus};
use crate::UrlError;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during frontier operations
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Host {0} is not claimed")]
    NotClaimed(String),

    #[error("Invalid frontier URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: UrlError,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected store reply: {0}")]
    Protocol(String),

    #[error("Frontier connection lock poisoned")]
    Poisoned,

    #[error("Frontier task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl FrontierError {
    /// Returns true for backend failures worth retrying
    ///
    /// Rejections such as [`FrontierError::NotClaimed`] describe the store's
    /// state and will not change on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Sqlite(_) | Self::Redis(_) | Self::Task(_))
    }
}

/// Result type for frontier operations
pub type FrontierResult<T> = Result<T, FrontierError>;

/// A host won by `claim_new_host`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedHost {
    pub host: String,
    /// The new-host entry that produced the claim, already in the host's queue
    pub seed_url: String,
}

/// Result of one claim attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed(ClaimedHost),
    /// The popped entry's host is in progress or finished; no claim was made
    /// and the caller should try again
    Ineligible { host: String, url: String },
    /// The new-host set is empty
    Empty,
}

/// Result of one pop attempt on a host queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopOutcome {
    /// URL to fetch; the host cooldown has been armed
    Ready(String),
    /// URL was already visited and has been dropped; pop again
    Discarded(String),
    /// Host is cooling down for this long; nothing was removed
    CoolingDown(Duration),
    /// Queue is exhausted
    Empty,
}

/// How `push_urls` routed its input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushSummary {
    /// Enqueued on the caller's own host queue
    pub local: usize,
    /// Sent to the new-host set
    pub remote: usize,
    /// Dropped because no host could be derived
    pub rejected: usize,
}

/// Frontier-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    pub new_entries: u64,
    pub claimed: u64,
    pub active: u64,
    pub completed: u64,
    pub abandoned: u64,
    pub queued_urls: u64,
    pub visited_urls: u64,
    pub cached_policies: u64,
}

/// Shared coordination store for crawl workers
///
/// Every method is atomic with respect to concurrent callers, including
/// callers in other processes sharing the same backend. Implementations
/// rely on backend transactions or server-side scripts, never on
/// in-process locks for correctness.
#[async_trait]
pub trait FrontierStore: Send + Sync {
    // ===== Host Claims =====

    /// Pops one new-host entry and claims its host if no worker holds it and
    /// it was never finished
    ///
    /// An entry whose host is currently in progress is moved onto that
    /// host's queue; an entry whose host is finished is dropped.
    async fn claim_new_host(&self) -> FrontierResult<ClaimOutcome>;

    /// Records that the claim-holder finished building the host policy
    async fn mark_active(&self, host: &str) -> FrontierResult<()>;

    /// Releases a claimed host as completed and clears its queue
    ///
    /// Fails with [`FrontierError::NotClaimed`] if the host is not in progress.
    async fn mark_completed(&self, host: &str) -> FrontierResult<()>;

    /// Releases a claimed host as abandoned; it is never claimed again
    async fn mark_abandoned(&self, host: &str, reason: &str) -> FrontierResult<()>;

    /// Returns hosts claimed longer than `lease` to the new-host set
    ///
    /// # Returns
    ///
    /// The hosts that were released
    async fn requeue_stale_claims(&self, lease: Duration) -> FrontierResult<Vec<String>>;

    /// Current lifecycle status of a host
    async fn host_status(&self, host: &str) -> FrontierResult<HostStatus>;

    // ===== URL Queue =====

    /// Adds a URL to the new-host set
    async fn push_url(&self, url: &str) -> FrontierResult<()>;

    /// Routes URLs: same-host ones onto `current_host`'s queue, the rest to
    /// the new-host set
    async fn push_urls(&self, current_host: &str, urls: &[String]) -> FrontierResult<PushSummary>;

    /// Pops the oldest queued URL of `host`, checking cooldown and the
    /// visited set, and arms a cooldown of `delay` when a URL is returned
    async fn pop_url(&self, host: &str, delay: Duration) -> FrontierResult<PopOutcome>;

    /// Marks a URL as visited (idempotent)
    async fn add_visited(&self, url: &str) -> FrontierResult<()>;

    async fn is_visited(&self, url: &str) -> FrontierResult<bool>;

    // ===== Politeness =====

    /// Sets or refreshes the host's cooldown marker; a zero delay clears it
    async fn set_cooldown(&self, host: &str, delay: Duration) -> FrontierResult<()>;

    // ===== Host Policies =====

    async fn get_host_policy(&self, host: &str) -> FrontierResult<Option<HostPolicy>>;

    async fn put_host_policy(&self, policy: &HostPolicy) -> FrontierResult<()>;

    // ===== Statistics =====

    async fn stats(&self) -> FrontierResult<FrontierStats>;
}
