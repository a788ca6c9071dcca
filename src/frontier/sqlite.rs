//! SQLite frontier implementation
//!
//! Every operation runs in its own `BEGIN IMMEDIATE` transaction, which takes
//! the database write lock up front. Workers in other processes that open
//! the same file therefore see each check-and-set as one indivisible step.

use crate::frontier::schema::initialize_schema;
use crate::frontier::traits::{
    ClaimOutcome, ClaimedHost, FrontierError, FrontierResult, FrontierStats, FrontierStore,
    PopOutcome, PushSummary,
};
use crate::state::{HostPolicy, HostStatus};
use crate::url::host_key;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long a connection waits for another process's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite frontier backend
///
/// The mutex only serializes use of the single connection inside this
/// process; cross-process atomicity comes from the transactions.
#[derive(Clone)]
pub struct SqliteFrontier {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFrontier {
    /// Opens (or creates) a frontier database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn open(path: &Path) -> FrontierResult<Self> {
        let conn = Connection::open(path)?;

        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory frontier (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> FrontierResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` inside an immediate transaction on the blocking pool
    async fn write<T, F>(&self, f: F) -> FrontierResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> FrontierResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| FrontierError::Poisoned)?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
        .await?
    }

    /// Runs a read-only query on the blocking pool
    async fn read<T, F>(&self, f: F) -> FrontierResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> FrontierResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| FrontierError::Poisoned)?;
            f(&conn)
        })
        .await?
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

fn host_of(url: &str) -> FrontierResult<String> {
    host_key(url).map_err(|source| FrontierError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

fn status_of(tx: &Connection, host: &str) -> FrontierResult<Option<HostStatus>> {
    let status: Option<String> = tx
        .query_row(
            "SELECT status FROM hosts WHERE host = ?1",
            params![host],
            |row| row.get(0),
        )
        .optional()?;

    status
        .map(|s| {
            HostStatus::from_db_string(&s)
                .ok_or_else(|| FrontierError::Protocol(format!("unknown host status {}", s)))
        })
        .transpose()
}

fn enqueue_local(tx: &Connection, host: &str, url: &str) -> FrontierResult<bool> {
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO url_queue (host, url) VALUES (?1, ?2)",
        params![host, url],
    )?;
    Ok(inserted > 0)
}

fn enqueue_new_host(tx: &Connection, host: &str, url: &str) -> FrontierResult<bool> {
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO new_hosts (url, host, added_at)
         SELECT ?1, ?2, ?3 WHERE NOT EXISTS (SELECT 1 FROM visited WHERE url = ?1)",
        params![url, host, Utc::now().to_rfc3339()],
    )?;
    Ok(inserted > 0)
}

/// Moves an in-progress host to a finished status
fn release(
    tx: &Connection,
    host: &str,
    status: HostStatus,
    reason: Option<&str>,
) -> FrontierResult<()> {
    let updated = tx.execute(
        "UPDATE hosts SET status = ?1, finished_at = ?2, reason = ?3
         WHERE host = ?4 AND status IN ('claimed', 'active')",
        params![
            status.to_db_string(),
            Utc::now().to_rfc3339(),
            reason,
            host
        ],
    )?;

    if updated == 0 {
        return Err(FrontierError::NotClaimed(host.to_string()));
    }

    tx.execute("DELETE FROM url_queue WHERE host = ?1", params![host])?;
    Ok(())
}

fn count(conn: &Connection, sql: &str) -> FrontierResult<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n.max(0) as u64)
}

#[async_trait]
impl FrontierStore for SqliteFrontier {
    // ===== Host Claims =====

    async fn claim_new_host(&self) -> FrontierResult<ClaimOutcome> {
        self.write(|tx| {
            let entry: Option<(i64, String, String)> = tx
                .query_row(
                    "SELECT id, url, host FROM new_hosts ORDER BY id LIMIT 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let Some((id, url, host)) = entry else {
                return Ok(ClaimOutcome::Empty);
            };
            tx.execute("DELETE FROM new_hosts WHERE id = ?1", params![id])?;

            match status_of(tx, &host)? {
                Some(status) if status.is_in_progress() => {
                    enqueue_local(tx, &host, &url)?;
                    Ok(ClaimOutcome::Ineligible { host, url })
                }
                Some(status) if status.is_terminal() => Ok(ClaimOutcome::Ineligible { host, url }),
                _ => {
                    tx.execute(
                        "INSERT OR REPLACE INTO hosts (host, status, claimed_at, finished_at, reason)
                         VALUES (?1, ?2, ?3, NULL, NULL)",
                        params![host, HostStatus::Claimed.to_db_string(), now_ms()],
                    )?;
                    enqueue_local(tx, &host, &url)?;
                    Ok(ClaimOutcome::Claimed(ClaimedHost {
                        host,
                        seed_url: url,
                    }))
                }
            }
        })
        .await
    }

    async fn mark_active(&self, host: &str) -> FrontierResult<()> {
        let host = host.to_string();
        self.write(move |tx| {
            let updated = tx.execute(
                "UPDATE hosts SET status = ?1, claimed_at = ?2
                 WHERE host = ?3 AND status IN ('claimed', 'active')",
                params![HostStatus::Active.to_db_string(), now_ms(), host],
            )?;
            if updated == 0 {
                return Err(FrontierError::NotClaimed(host));
            }
            Ok(())
        })
        .await
    }

    async fn mark_completed(&self, host: &str) -> FrontierResult<()> {
        let host = host.to_string();
        self.write(move |tx| release(tx, &host, HostStatus::Completed, None))
            .await
    }

    async fn mark_abandoned(&self, host: &str, reason: &str) -> FrontierResult<()> {
        let host = host.to_string();
        let reason = reason.to_string();
        self.write(move |tx| release(tx, &host, HostStatus::Abandoned, Some(&reason)))
            .await
    }

    async fn requeue_stale_claims(&self, lease: Duration) -> FrontierResult<Vec<String>> {
        let cutoff = now_ms().saturating_sub(duration_ms(lease));
        self.write(move |tx| {
            let stale: Vec<String> = tx
                .prepare(
                    "SELECT host FROM hosts
                     WHERE status IN ('claimed', 'active') AND claimed_at < ?1
                     ORDER BY host",
                )?
                .query_map(params![cutoff], |row| row.get(0))?
                .collect::<Result<_, _>>()?;

            for host in &stale {
                // Reuse the oldest queued URL as the seed so the queue survives
                let seed: String = tx
                    .query_row(
                        "SELECT url FROM url_queue WHERE host = ?1 ORDER BY id LIMIT 1",
                        params![host],
                        |row| row.get(0),
                    )
                    .optional()?
                    .unwrap_or_else(|| format!("https://{}/", host));

                tx.execute("DELETE FROM hosts WHERE host = ?1", params![host])?;
                tx.execute(
                    "INSERT OR IGNORE INTO new_hosts (url, host, added_at) VALUES (?1, ?2, ?3)",
                    params![seed, host, Utc::now().to_rfc3339()],
                )?;
            }

            Ok(stale)
        })
        .await
    }

    async fn host_status(&self, host: &str) -> FrontierResult<HostStatus> {
        let host = host.to_string();
        self.read(move |conn| Ok(status_of(conn, &host)?.unwrap_or(HostStatus::New)))
            .await
    }

    // ===== URL Queue =====

    async fn push_url(&self, url: &str) -> FrontierResult<()> {
        let host = host_of(url)?;
        let url = url.to_string();
        self.write(move |tx| {
            enqueue_new_host(tx, &host, &url)?;
            Ok(())
        })
        .await
    }

    async fn push_urls(&self, current_host: &str, urls: &[String]) -> FrontierResult<PushSummary> {
        let current_host = current_host.to_string();
        let urls = urls.to_vec();
        self.write(move |tx| {
            let mut summary = PushSummary::default();
            for url in &urls {
                match host_key(url) {
                    Ok(host) if host == current_host => {
                        enqueue_local(tx, &host, url)?;
                        summary.local += 1;
                    }
                    Ok(host) => {
                        enqueue_new_host(tx, &host, url)?;
                        summary.remote += 1;
                    }
                    Err(_) => summary.rejected += 1,
                }
            }
            Ok(summary)
        })
        .await
    }

    async fn pop_url(&self, host: &str, delay: Duration) -> FrontierResult<PopOutcome> {
        let host = host.to_string();
        self.write(move |tx| {
            let now = now_ms();

            let until: Option<i64> = tx
                .query_row(
                    "SELECT until_ms FROM cooldowns WHERE host = ?1",
                    params![host],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(until) = until.filter(|until| *until > now) {
                return Ok(PopOutcome::CoolingDown(Duration::from_millis(
                    (until - now) as u64,
                )));
            }

            let next: Option<(i64, String)> = tx
                .query_row(
                    "SELECT id, url FROM url_queue WHERE host = ?1 ORDER BY id LIMIT 1",
                    params![host],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((id, url)) = next else {
                return Ok(PopOutcome::Empty);
            };
            tx.execute("DELETE FROM url_queue WHERE id = ?1", params![id])?;

            let visited = tx
                .query_row(
                    "SELECT 1 FROM visited WHERE url = ?1",
                    params![url],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if visited {
                return Ok(PopOutcome::Discarded(url));
            }

            tx.execute(
                "INSERT OR REPLACE INTO cooldowns (host, until_ms) VALUES (?1, ?2)",
                params![host, now.saturating_add(duration_ms(delay))],
            )?;
            Ok(PopOutcome::Ready(url))
        })
        .await
    }

    async fn add_visited(&self, url: &str) -> FrontierResult<()> {
        let url = url.to_string();
        self.write(move |tx| {
            tx.execute(
                "INSERT OR IGNORE INTO visited (url, visited_at) VALUES (?1, ?2)",
                params![url, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn is_visited(&self, url: &str) -> FrontierResult<bool> {
        let url = url.to_string();
        self.read(move |conn| {
            Ok(conn
                .query_row("SELECT 1 FROM visited WHERE url = ?1", params![url], |_| {
                    Ok(())
                })
                .optional()?
                .is_some())
        })
        .await
    }

    // ===== Politeness =====

    async fn set_cooldown(&self, host: &str, delay: Duration) -> FrontierResult<()> {
        let host = host.to_string();
        self.write(move |tx| {
            if delay.is_zero() {
                tx.execute("DELETE FROM cooldowns WHERE host = ?1", params![host])?;
            } else {
                tx.execute(
                    "INSERT OR REPLACE INTO cooldowns (host, until_ms) VALUES (?1, ?2)",
                    params![host, now_ms().saturating_add(duration_ms(delay))],
                )?;
            }
            Ok(())
        })
        .await
    }

    // ===== Host Policies =====

    async fn get_host_policy(&self, host: &str) -> FrontierResult<Option<HostPolicy>> {
        let host = host.to_string();
        self.read(move |conn| {
            let json: Option<String> = conn
                .query_row(
                    "SELECT policy FROM host_policies WHERE host = ?1",
                    params![host],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(json.map(|j| serde_json::from_str(&j)).transpose()?)
        })
        .await
    }

    async fn put_host_policy(&self, policy: &HostPolicy) -> FrontierResult<()> {
        let host = policy.name.clone();
        let json = serde_json::to_string(policy)?;
        self.write(move |tx| {
            tx.execute(
                "INSERT OR REPLACE INTO host_policies (host, policy, updated_at) VALUES (?1, ?2, ?3)",
                params![host, json, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    // ===== Statistics =====

    async fn stats(&self) -> FrontierResult<FrontierStats> {
        self.read(|conn| {
            let by_status = |status: HostStatus| {
                conn.query_row(
                    "SELECT COUNT(*) FROM hosts WHERE status = ?1",
                    params![status.to_db_string()],
                    |row| row.get::<_, i64>(0),
                )
                .map(|n| n.max(0) as u64)
            };

            Ok(FrontierStats {
                new_entries: count(conn, "SELECT COUNT(*) FROM new_hosts")?,
                claimed: by_status(HostStatus::Claimed)?,
                active: by_status(HostStatus::Active)?,
                completed: by_status(HostStatus::Completed)?,
                abandoned: by_status(HostStatus::Abandoned)?,
                queued_urls: count(conn, "SELECT COUNT(*) FROM url_queue")?,
                visited_urls: count(conn, "SELECT COUNT(*) FROM visited")?,
                cached_policies: count(conn, "SELECT COUNT(*) FROM host_policies")?,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PolicyDefaults;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn claim(store: &SqliteFrontier) -> ClaimedHost {
        match store.claim_new_host().await.unwrap() {
            ClaimOutcome::Claimed(claimed) => claimed,
            other => panic!("expected a claim, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_claim_empty() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        assert_eq!(store.claim_new_host().await.unwrap(), ClaimOutcome::Empty);
    }

    #[tokio::test]
    async fn test_claim_enqueues_seed() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store.push_url("https://example.com/start/").await.unwrap();

        let claimed = claim(&store).await;
        assert_eq!(claimed.host, "example.com");
        assert_eq!(claimed.seed_url, "https://example.com/start/");
        assert_eq!(
            store.host_status("example.com").await.unwrap(),
            HostStatus::Claimed
        );

        let popped = store.pop_url("example.com", Duration::ZERO).await.unwrap();
        assert_eq!(popped, PopOutcome::Ready("https://example.com/start/".to_string()));
    }

    #[tokio::test]
    async fn test_in_progress_entry_moves_to_queue() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store.push_url("https://example.com/a/").await.unwrap();
        store.push_url("https://example.com/b/").await.unwrap();

        claim(&store).await;
        let second = store.claim_new_host().await.unwrap();
        assert_eq!(
            second,
            ClaimOutcome::Ineligible {
                host: "example.com".to_string(),
                url: "https://example.com/b/".to_string(),
            }
        );

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.new_entries, 0);
        assert_eq!(stats.queued_urls, 2);
    }

    #[tokio::test]
    async fn test_completed_host_not_reclaimed() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store.push_url("https://example.com/a/").await.unwrap();
        claim(&store).await;
        store.mark_completed("example.com").await.unwrap();

        store.push_url("https://example.com/later/").await.unwrap();
        assert!(matches!(
            store.claim_new_host().await.unwrap(),
            ClaimOutcome::Ineligible { .. }
        ));
        assert_eq!(store.claim_new_host().await.unwrap(), ClaimOutcome::Empty);
    }

    #[tokio::test]
    async fn test_double_release_detected() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store.push_url("https://example.com/").await.unwrap();
        claim(&store).await;

        store.mark_completed("example.com").await.unwrap();
        assert!(matches!(
            store.mark_completed("example.com").await,
            Err(FrontierError::NotClaimed(_))
        ));
        assert!(matches!(
            store.mark_completed("never-claimed.com").await,
            Err(FrontierError::NotClaimed(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_completed_clears_queue() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store.push_url("https://example.com/").await.unwrap();
        claim(&store).await;
        store
            .push_urls("example.com", &urls(&["https://example.com/a/", "https://example.com/b/"]))
            .await
            .unwrap();

        store.mark_completed("example.com").await.unwrap();
        assert_eq!(store.stats().await.unwrap().queued_urls, 0);
        assert_eq!(
            store.host_status("example.com").await.unwrap(),
            HostStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_abandoned_host_is_terminal() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store.push_url("https://down.example/").await.unwrap();
        claim(&store).await;

        store
            .mark_abandoned("down.example", "robots.txt unreachable")
            .await
            .unwrap();
        assert_eq!(
            store.host_status("down.example").await.unwrap(),
            HostStatus::Abandoned
        );

        store.push_url("https://down.example/again/").await.unwrap();
        assert!(matches!(
            store.claim_new_host().await.unwrap(),
            ClaimOutcome::Ineligible { .. }
        ));
    }

    #[tokio::test]
    async fn test_push_urls_routes_by_host() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        let summary = store
            .push_urls(
                "example.com",
                &urls(&[
                    "https://example.com/a/",
                    "https://other.org/",
                    "https://example.com/a/",
                    "not a url",
                ]),
            )
            .await
            .unwrap();

        assert_eq!(
            summary,
            PushSummary {
                local: 2,
                remote: 1,
                rejected: 1
            }
        );
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.queued_urls, 1);
        assert_eq!(stats.new_entries, 1);
    }

    #[tokio::test]
    async fn test_pop_fifo_order() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store
            .push_urls(
                "example.com",
                &urls(&[
                    "https://example.com/1/",
                    "https://example.com/2/",
                    "https://example.com/3/",
                ]),
            )
            .await
            .unwrap();

        for expected in ["1", "2", "3"] {
            let popped = store.pop_url("example.com", Duration::ZERO).await.unwrap();
            assert_eq!(
                popped,
                PopOutcome::Ready(format!("https://example.com/{}/", expected))
            );
        }
        assert_eq!(
            store.pop_url("example.com", Duration::ZERO).await.unwrap(),
            PopOutcome::Empty
        );
    }

    #[tokio::test]
    async fn test_pop_discards_visited() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store
            .push_urls(
                "example.com",
                &urls(&["https://example.com/seen/", "https://example.com/new/"]),
            )
            .await
            .unwrap();
        store.add_visited("https://example.com/seen/").await.unwrap();
        store.add_visited("https://example.com/seen/").await.unwrap();

        assert_eq!(
            store.pop_url("example.com", Duration::ZERO).await.unwrap(),
            PopOutcome::Discarded("https://example.com/seen/".to_string())
        );
        assert_eq!(
            store.pop_url("example.com", Duration::ZERO).await.unwrap(),
            PopOutcome::Ready("https://example.com/new/".to_string())
        );
    }

    #[tokio::test]
    async fn test_pop_respects_cooldown() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store
            .push_urls(
                "example.com",
                &urls(&["https://example.com/1/", "https://example.com/2/"]),
            )
            .await
            .unwrap();

        let first = store
            .pop_url("example.com", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(first, PopOutcome::Ready(_)));

        match store.pop_url("example.com", Duration::from_secs(60)).await.unwrap() {
            PopOutcome::CoolingDown(remaining) => {
                assert!(remaining > Duration::from_secs(50));
                assert!(remaining <= Duration::from_secs(60));
            }
            other => panic!("expected cooldown, got {:?}", other),
        }
        // Nothing was removed while cooling down
        assert_eq!(store.stats().await.unwrap().queued_urls, 1);
    }

    #[tokio::test]
    async fn test_consecutive_pops_separated_by_delay() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store
            .push_urls(
                "example.com",
                &urls(&["https://example.com/1/", "https://example.com/2/"]),
            )
            .await
            .unwrap();
        let delay = Duration::from_millis(200);

        let start = std::time::Instant::now();
        assert!(matches!(
            store.pop_url("example.com", delay).await.unwrap(),
            PopOutcome::Ready(_)
        ));

        loop {
            match store.pop_url("example.com", delay).await.unwrap() {
                PopOutcome::Ready(_) => break,
                PopOutcome::CoolingDown(wait) => tokio::time::sleep(wait).await,
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(start.elapsed() >= delay);
    }

    #[tokio::test]
    async fn test_set_cooldown_blocks_pop() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store
            .push_urls("example.com", &urls(&["https://example.com/1/"]))
            .await
            .unwrap();
        store
            .set_cooldown("example.com", Duration::from_secs(30))
            .await
            .unwrap();

        assert!(matches!(
            store.pop_url("example.com", Duration::ZERO).await.unwrap(),
            PopOutcome::CoolingDown(_)
        ));
    }

    #[tokio::test]
    async fn test_zero_cooldown_clears_marker() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store
            .push_urls("example.com", &urls(&["https://example.com/1/"]))
            .await
            .unwrap();
        store
            .set_cooldown("example.com", Duration::from_secs(30))
            .await
            .unwrap();
        store
            .set_cooldown("example.com", Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(
            store.pop_url("example.com", Duration::ZERO).await.unwrap(),
            PopOutcome::Ready("https://example.com/1/".to_string())
        );
    }

    #[tokio::test]
    async fn test_visited_url_not_pushed_to_new_hosts() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store.add_visited("https://other.org/").await.unwrap();
        store.push_url("https://other.org/").await.unwrap();

        assert!(store.is_visited("https://other.org/").await.unwrap());
        assert_eq!(store.stats().await.unwrap().new_entries, 0);
    }

    #[tokio::test]
    async fn test_policy_cache() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        assert_eq!(store.get_host_policy("example.com").await.unwrap(), None);

        let mut policy = HostPolicy::with_defaults("example.com", &PolicyDefaults::default());
        policy.disallowed_prefixes.push("/private/".to_string());
        store.put_host_policy(&policy).await.unwrap();

        policy.pages_crawled = 4;
        store.put_host_policy(&policy).await.unwrap();

        assert_eq!(
            store.get_host_policy("example.com").await.unwrap(),
            Some(policy)
        );
    }

    #[tokio::test]
    async fn test_requeue_stale_claims() {
        let store = SqliteFrontier::open_in_memory().unwrap();
        store.push_url("https://example.com/").await.unwrap();
        claim(&store).await;
        store
            .push_urls("example.com", &urls(&["https://example.com/next/"]))
            .await
            .unwrap();

        // A generous lease keeps fresh claims
        assert!(store
            .requeue_stale_claims(Duration::from_secs(3600))
            .await
            .unwrap()
            .is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let released = store
            .requeue_stale_claims(Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(released, vec!["example.com".to_string()]);
        assert_eq!(
            store.host_status("example.com").await.unwrap(),
            HostStatus::New
        );

        let reclaimed = claim(&store).await;
        assert_eq!(reclaimed.host, "example.com");
        assert_eq!(reclaimed.seed_url, "https://example.com/");
        assert_eq!(store.stats().await.unwrap().queued_urls, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_at_most_one_claim_across_connections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frontier.db");

        let seeder = SqliteFrontier::open(&path).unwrap();
        for host in 0..5 {
            for page in 0..4 {
                seeder
                    .push_url(&format!("https://host{}.example/{}/", host, page))
                    .await
                    .unwrap();
            }
        }

        // Separate connections stand in for separate worker processes
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = SqliteFrontier::open(&path).unwrap();
            handles.push(tokio::spawn(async move {
                let mut won = Vec::new();
                loop {
                    match store.claim_new_host().await.unwrap() {
                        ClaimOutcome::Claimed(claimed) => won.push(claimed.host),
                        ClaimOutcome::Ineligible { .. } => continue,
                        ClaimOutcome::Empty => break,
                    }
                }
                won
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), 5, "claims: {:?}", all);
        assert_eq!(unique.len(), 5);
        assert_eq!(seeder.stats().await.unwrap().queued_urls, 20);
    }
}
