//! Redis frontier implementation
//!
//! Multi-step check-and-set operations (claim, release, pop, stale-claim
//! recovery) run as Lua scripts, which Redis executes atomically. Single
//! commands and atomic pipelines cover the rest.
//!
//! # Key layout
//!
//! | Key | Type | Content |
//! |-----|------|---------|
//! | `{ns}:new_hosts` | list | `host\nurl` entries, oldest first |
//! | `{ns}:hosts` | hash | host → status |
//! | `{ns}:claimed_at` | hash | host → claim time (unix ms), in-progress hosts only |
//! | `{ns}:reasons` | hash | host → abandonment reason |
//! | `{ns}:queue:{host}` | list | per-host FIFO queue |
//! | `{ns}:visited` | set | visited URLs |
//! | `{ns}:cooldown:{host}` | string | politeness marker with a PX expiry |
//! | `{ns}:policies` | hash | host → policy JSON |
//!
//! Scripts derive per-host keys from the namespace, so all keys must live
//! on one Redis node.

use crate::frontier::traits::{
    ClaimOutcome, ClaimedHost, FrontierError, FrontierResult, FrontierStats, FrontierStore,
    PopOutcome, PushSummary,
};
use crate::state::{HostPolicy, HostStatus};
use crate::url::host_key;
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;
use std::time::Duration;

const CLAIM_SCRIPT: &str = r#"
local entry = redis.call('LPOP', KEYS[1])
if not entry then
    return {'empty'}
end
local sep = string.find(entry, '\n', 1, true)
if not sep then
    return {'invalid', entry}
end
local host = string.sub(entry, 1, sep - 1)
local url = string.sub(entry, sep + 1)
local status = redis.call('HGET', KEYS[2], host)
if status == 'claimed' or status == 'active' then
    redis.call('RPUSH', ARGV[1] .. host, url)
    return {'ineligible', host, url}
end
if status then
    return {'ineligible', host, url}
end
redis.call('HSET', KEYS[2], host, 'claimed')
redis.call('HSET', KEYS[3], host, ARGV[2])
redis.call('RPUSH', ARGV[1] .. host, url)
return {'claimed', host, url}
"#;

const TRANSITION_SCRIPT: &str = r#"
local status = redis.call('HGET', KEYS[1], ARGV[1])
if status ~= 'claimed' and status ~= 'active' then
    return 0
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
if ARGV[3] == '1' then
    redis.call('DEL', KEYS[2])
end
if ARGV[4] ~= '' then
    redis.call('HSET', KEYS[3], ARGV[1], ARGV[4])
end
if ARGV[2] == 'active' then
    redis.call('HSET', KEYS[4], ARGV[1], ARGV[5])
else
    redis.call('HDEL', KEYS[4], ARGV[1])
end
return 1
"#;

const POP_SCRIPT: &str = r#"
local ttl = redis.call('PTTL', KEYS[3])
if ttl > 0 then
    return {'cooling', tostring(ttl)}
end
local url = redis.call('LPOP', KEYS[1])
if not url then
    return {'empty'}
end
if redis.call('SISMEMBER', KEYS[2], url) == 1 then
    return {'discarded', url}
end
if tonumber(ARGV[1]) > 0 then
    redis.call('SET', KEYS[3], '1', 'PX', ARGV[1])
end
return {'ready', url}
"#;

const REQUEUE_SCRIPT: &str = r#"
local released = {}
local claims = redis.call('HGETALL', KEYS[2])
for i = 1, #claims, 2 do
    local host = claims[i]
    local claimed_at = tonumber(claims[i + 1])
    local status = redis.call('HGET', KEYS[1], host)
    if (status == 'claimed' or status == 'active') and claimed_at < tonumber(ARGV[2]) then
        local seed = redis.call('LINDEX', ARGV[1] .. host, 0)
        if not seed then
            seed = 'https://' .. host .. '/'
        end
        redis.call('HDEL', KEYS[1], host)
        redis.call('HDEL', KEYS[2], host)
        redis.call('RPUSH', KEYS[3], host .. '\n' .. seed)
        table.insert(released, host)
    end
end
return released
"#;

/// Keys requested per `SCAN` round trip
const SCAN_BATCH: usize = 500;

/// Redis frontier backend
#[derive(Clone)]
pub struct RedisFrontier {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisFrontier {
    /// Connects to Redis and verifies the connection
    ///
    /// # Arguments
    ///
    /// * `url` - Redis URL (e.g., redis://localhost:6379)
    /// * `namespace` - Prefix for every key this frontier touches
    pub async fn connect(url: &str, namespace: &str) -> FrontierResult<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        tracing::info!(url = %url, namespace = %namespace, "Connected to Redis frontier");

        Ok(Self {
            conn,
            namespace: namespace.to_string(),
        })
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.namespace, name)
    }

    fn queue_prefix(&self) -> String {
        self.key("queue:")
    }

    fn queue_key(&self, host: &str) -> String {
        format!("{}{}", self.queue_prefix(), host)
    }

    fn cooldown_key(&self, host: &str) -> String {
        self.key(&format!("cooldown:{}", host))
    }

    /// Lists per-host queue keys with cursor-based `SCAN`
    async fn queue_keys(&self) -> FrontierResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", self.queue_prefix());
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }

    async fn transition(
        &self,
        host: &str,
        status: HostStatus,
        clear_queue: bool,
        reason: &str,
    ) -> FrontierResult<()> {
        let mut conn = self.conn.clone();
        let updated: i64 = Script::new(TRANSITION_SCRIPT)
            .key(self.key("hosts"))
            .key(self.queue_key(host))
            .key(self.key("reasons"))
            .key(self.key("claimed_at"))
            .arg(host)
            .arg(status.to_db_string())
            .arg(if clear_queue { "1" } else { "0" })
            .arg(reason)
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await?;

        if updated == 0 {
            return Err(FrontierError::NotClaimed(host.to_string()));
        }
        Ok(())
    }
}

fn entry(host: &str, url: &str) -> String {
    format!("{}\n{}", host, url)
}

fn host_of(url: &str) -> FrontierResult<String> {
    host_key(url).map_err(|source| FrontierError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

/// Decodes a `{'claimed'|'ineligible'|'empty', host, url}` script reply
fn parse_claim_reply(reply: Vec<String>) -> FrontierResult<ClaimOutcome> {
    let mut parts = reply.into_iter();
    match (parts.next().as_deref(), parts.next(), parts.next()) {
        (Some("empty"), _, _) => Ok(ClaimOutcome::Empty),
        (Some("claimed"), Some(host), Some(url)) => Ok(ClaimOutcome::Claimed(ClaimedHost {
            host,
            seed_url: url,
        })),
        (Some("ineligible"), Some(host), Some(url)) => Ok(ClaimOutcome::Ineligible { host, url }),
        (Some("invalid"), Some(raw), _) => Err(FrontierError::Protocol(format!(
            "malformed new-host entry {:?}",
            raw
        ))),
        (tag, _, _) => Err(FrontierError::Protocol(format!(
            "unexpected claim reply {:?}",
            tag
        ))),
    }
}

/// Decodes a `{'ready'|'discarded'|'cooling'|'empty', value}` script reply
fn parse_pop_reply(reply: Vec<String>) -> FrontierResult<PopOutcome> {
    let mut parts = reply.into_iter();
    match (parts.next().as_deref(), parts.next()) {
        (Some("empty"), _) => Ok(PopOutcome::Empty),
        (Some("ready"), Some(url)) => Ok(PopOutcome::Ready(url)),
        (Some("discarded"), Some(url)) => Ok(PopOutcome::Discarded(url)),
        (Some("cooling"), Some(ttl)) => ttl
            .parse::<u64>()
            .map(|ms| PopOutcome::CoolingDown(Duration::from_millis(ms)))
            .map_err(|_| FrontierError::Protocol(format!("bad cooldown ttl {:?}", ttl))),
        (tag, _) => Err(FrontierError::Protocol(format!(
            "unexpected pop reply {:?}",
            tag
        ))),
    }
}

#[async_trait]
impl FrontierStore for RedisFrontier {
    // ===== Host Claims =====

    async fn claim_new_host(&self) -> FrontierResult<ClaimOutcome> {
        let mut conn = self.conn.clone();
        let reply: Vec<String> = Script::new(CLAIM_SCRIPT)
            .key(self.key("new_hosts"))
            .key(self.key("hosts"))
            .key(self.key("claimed_at"))
            .arg(self.queue_prefix())
            .arg(Utc::now().timestamp_millis())
            .invoke_async(&mut conn)
            .await?;

        parse_claim_reply(reply)
    }

    async fn mark_active(&self, host: &str) -> FrontierResult<()> {
        self.transition(host, HostStatus::Active, false, "").await
    }

    async fn mark_completed(&self, host: &str) -> FrontierResult<()> {
        self.transition(host, HostStatus::Completed, true, "").await
    }

    async fn mark_abandoned(&self, host: &str, reason: &str) -> FrontierResult<()> {
        self.transition(host, HostStatus::Abandoned, true, reason)
            .await
    }

    async fn requeue_stale_claims(&self, lease: Duration) -> FrontierResult<Vec<String>> {
        let lease_ms = i64::try_from(lease.as_millis()).unwrap_or(i64::MAX);
        let cutoff = Utc::now().timestamp_millis().saturating_sub(lease_ms);

        let mut conn = self.conn.clone();
        let released: Vec<String> = Script::new(REQUEUE_SCRIPT)
            .key(self.key("hosts"))
            .key(self.key("claimed_at"))
            .key(self.key("new_hosts"))
            .arg(self.queue_prefix())
            .arg(cutoff)
            .invoke_async(&mut conn)
            .await?;

        Ok(released)
    }

    async fn host_status(&self, host: &str) -> FrontierResult<HostStatus> {
        let mut conn = self.conn.clone();
        let status: Option<String> = conn.hget(self.key("hosts"), host).await?;

        match status {
            None => Ok(HostStatus::New),
            Some(s) => HostStatus::from_db_string(&s)
                .ok_or_else(|| FrontierError::Protocol(format!("unknown host status {}", s))),
        }
    }

    // ===== URL Queue =====

    async fn push_url(&self, url: &str) -> FrontierResult<()> {
        let host = host_of(url)?;
        let mut conn = self.conn.clone();
        let visited: bool = conn.sismember(self.key("visited"), url).await?;
        if !visited {
            let _: () = conn.rpush(self.key("new_hosts"), entry(&host, url)).await?;
        }
        Ok(())
    }

    async fn push_urls(&self, current_host: &str, urls: &[String]) -> FrontierResult<PushSummary> {
        let mut summary = PushSummary::default();
        let mut pipe = redis::pipe();
        pipe.atomic();

        for url in urls {
            match host_key(url) {
                Ok(host) if host == current_host => {
                    pipe.rpush(self.queue_key(&host), url).ignore();
                    summary.local += 1;
                }
                Ok(host) => {
                    pipe.rpush(self.key("new_hosts"), entry(&host, url))
                        .ignore();
                    summary.remote += 1;
                }
                Err(_) => summary.rejected += 1,
            }
        }

        if summary.local + summary.remote > 0 {
            let mut conn = self.conn.clone();
            let _: () = pipe.query_async(&mut conn).await?;
        }
        Ok(summary)
    }

    async fn pop_url(&self, host: &str, delay: Duration) -> FrontierResult<PopOutcome> {
        let mut conn = self.conn.clone();
        let reply: Vec<String> = Script::new(POP_SCRIPT)
            .key(self.queue_key(host))
            .key(self.key("visited"))
            .key(self.cooldown_key(host))
            .arg(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
            .invoke_async(&mut conn)
            .await?;

        parse_pop_reply(reply)
    }

    async fn add_visited(&self, url: &str) -> FrontierResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(self.key("visited"), url).await?;
        Ok(())
    }

    async fn is_visited(&self, url: &str) -> FrontierResult<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.sismember(self.key("visited"), url).await?)
    }

    // ===== Politeness =====

    async fn set_cooldown(&self, host: &str, delay: Duration) -> FrontierResult<()> {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let mut conn = self.conn.clone();
        if ms == 0 {
            let _: () = conn.del(self.cooldown_key(host)).await?;
            return Ok(());
        }

        let _: () = redis::cmd("SET")
            .arg(self.cooldown_key(host))
            .arg(1)
            .arg("PX")
            .arg(ms)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    // ===== Host Policies =====

    async fn get_host_policy(&self, host: &str) -> FrontierResult<Option<HostPolicy>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.hget(self.key("policies"), host).await?;
        Ok(json.map(|j| serde_json::from_str(&j)).transpose()?)
    }

    async fn put_host_policy(&self, policy: &HostPolicy) -> FrontierResult<()> {
        let json = serde_json::to_string(policy)?;
        let mut conn = self.conn.clone();
        let _: () = conn.hset(self.key("policies"), &policy.name, json).await?;
        Ok(())
    }

    // ===== Statistics =====

    async fn stats(&self) -> FrontierResult<FrontierStats> {
        let mut conn = self.conn.clone();

        let statuses: HashMap<String, String> = conn.hgetall(self.key("hosts")).await?;
        let count_status = |status: HostStatus| {
            statuses
                .values()
                .filter(|s| s.as_str() == status.to_db_string())
                .count() as u64
        };

        let mut queued_urls = 0u64;
        for key in self.queue_keys().await? {
            let len: u64 = conn.llen(key).await?;
            queued_urls += len;
        }

        Ok(FrontierStats {
            new_entries: conn.llen(self.key("new_hosts")).await?,
            claimed: count_status(HostStatus::Claimed),
            active: count_status(HostStatus::Active),
            completed: count_status(HostStatus::Completed),
            abandoned: count_status(HostStatus::Abandoned),
            queued_urls,
            visited_urls: conn.scard(self.key("visited")).await?,
            cached_policies: conn.hlen(self.key("policies")).await?,
        })
    }
}
