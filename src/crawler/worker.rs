//! Per-host crawl worker
//!
//! A worker owns exactly one claimed host. It loads or builds the host's
//! policy, then repeatedly pops a URL, fetches it, extracts links and hands
//! the page to the sink until the queue is exhausted or the page cap is
//! reached. The claim's lease is renewed after every fetch and every
//! cooldown wait. The host is released on every exit path except
//! abandonment, shutdown and a lost lease.

use crate::crawler::extract::extract_page;
use crate::crawler::retry::StoreRetry;
use crate::crawler::{Fetch, Fetched};
use crate::frontier::{ClaimedHost, FrontierError, FrontierResult, FrontierStore, PopOutcome};
use crate::robots::PolicyBuilder;
use crate::sink::{Page, PageSender};
use crate::state::HostPolicy;
use crate::url::{host_key, normalize};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

/// Shared dependencies handed to every worker
#[derive(Clone)]
pub struct WorkerContext {
    pub store: Arc<dyn FrontierStore>,
    pub fetcher: Arc<dyn Fetch>,
    pub policies: Arc<PolicyBuilder>,
    pub pages: PageSender,
    pub store_retry: StoreRetry,
}

/// How a worker finished with its host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Queue drained
    Exhausted,
    /// `max_pages` successful pages fetched
    PageCapReached,
    /// Policy could not be built; host marked abandoned
    Abandoned,
    /// Shutdown requested; the claim is left for lease recovery
    Interrupted,
    /// The claim expired and was recovered by another process
    LeaseLost,
    /// A store operation failed for good
    Failed,
}

/// Summary of one worker run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub host: String,
    pub outcome: WorkerOutcome,
    /// Successful (2xx) pages
    pub pages: u32,
    /// Fetches that exhausted their retries or returned a non-2xx status
    pub failures: u32,
}

/// Crawls a single claimed host
pub struct Worker {
    ctx: WorkerContext,
    claim: ClaimedHost,
    shutdown: watch::Receiver<bool>,
    pages: u32,
    failures: u32,
}

impl Worker {
    pub fn new(ctx: WorkerContext, claim: ClaimedHost, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            ctx,
            claim,
            shutdown,
            pages: 0,
            failures: 0,
        }
    }

    /// Runs the worker to completion
    pub async fn run(mut self) -> WorkerReport {
        let host = self.claim.host.clone();
        tracing::info!(host = %host, seed = %self.claim.seed_url, "Worker started");

        let outcome = match self.prepare_policy(&host).await {
            Ok(Some(mut policy)) => {
                let outcome = match self.crawl(&host, &mut policy).await {
                    Ok(outcome) => outcome,
                    Err(FrontierError::NotClaimed(_)) => WorkerOutcome::LeaseLost,
                    Err(e) => {
                        tracing::error!(host = %host, error = %e, "Worker stopped on store error");
                        WorkerOutcome::Failed
                    }
                };
                self.release(&host, Some(&policy), outcome).await;
                outcome
            }
            Ok(None) => WorkerOutcome::Abandoned,
            Err(FrontierError::NotClaimed(_)) => WorkerOutcome::LeaseLost,
            Err(e) => {
                tracing::error!(host = %host, error = %e, "Failed to prepare host policy");
                self.release(&host, None, WorkerOutcome::Failed).await;
                WorkerOutcome::Failed
            }
        };

        tracing::info!(
            host = %host,
            outcome = ?outcome,
            pages = self.pages,
            failures = self.failures,
            "Worker finished"
        );

        WorkerReport {
            host,
            outcome,
            pages: self.pages,
            failures: self.failures,
        }
    }

    /// Loads the cached policy or builds a fresh one
    ///
    /// Returns `None` when the host had to be abandoned.
    async fn prepare_policy(&self, host: &str) -> FrontierResult<Option<HostPolicy>> {
        let store = &self.ctx.store;
        let retry = self.ctx.store_retry;

        let cached = retry
            .run("get_host_policy", || store.get_host_policy(host))
            .await?;

        let policy = match cached {
            Some(policy) => {
                tracing::debug!(host = %host, pages_crawled = policy.pages_crawled, "Using cached policy");
                policy
            }
            None => match self.ctx.policies.build(host).await {
                Ok(built) => {
                    let seeds: Vec<String> = built
                        .seeds
                        .into_iter()
                        .filter(|url| built.policy.is_allowed(url))
                        .collect();

                    retry
                        .run("put_host_policy", || store.put_host_policy(&built.policy))
                        .await?;
                    if !seeds.is_empty() {
                        let summary = retry
                            .run("push_urls", || store.push_urls(host, &seeds))
                            .await?;
                        tracing::debug!(host = %host, local = summary.local, remote = summary.remote, "Queued sitemap seeds");
                    }
                    built.policy
                }
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "Abandoning host");
                    let reason = e.to_string();
                    retry
                        .run("mark_abandoned", || store.mark_abandoned(host, &reason))
                        .await?;
                    return Ok(None);
                }
            },
        };

        retry.run("mark_active", || store.mark_active(host)).await?;
        Ok(Some(policy))
    }

    async fn crawl(&mut self, host: &str, policy: &mut HostPolicy) -> FrontierResult<WorkerOutcome> {
        let store = Arc::clone(&self.ctx.store);
        let retry = self.ctx.store_retry;
        let delay = policy.crawl_delay();

        loop {
            if *self.shutdown.borrow() {
                return Ok(WorkerOutcome::Interrupted);
            }
            if policy.page_cap_reached() {
                tracing::info!(host = %host, max_pages = policy.max_pages, "Page cap reached");
                return Ok(WorkerOutcome::PageCapReached);
            }

            let popped = retry
                .run("pop_url", || store.pop_url(host, delay))
                .await?;

            let url = match popped {
                PopOutcome::Ready(url) => url,
                PopOutcome::Discarded(url) => {
                    tracing::debug!(url = %url, "Skipping visited URL");
                    continue;
                }
                PopOutcome::CoolingDown(remaining) => {
                    tokio::select! {
                        _ = tokio::time::sleep(remaining) => {}
                        _ = self.shutdown.changed() => {}
                    }
                    self.renew_lease(host).await?;
                    continue;
                }
                PopOutcome::Empty => return Ok(WorkerOutcome::Exhausted),
            };

            if !policy.is_allowed(&url) {
                tracing::debug!(url = %url, "Disallowed by robots.txt");
                retry.run("add_visited", || store.add_visited(&url)).await?;
                // Nothing was fetched, so the pop's cooldown is released
                retry
                    .run("set_cooldown", || store.set_cooldown(host, Duration::ZERO))
                    .await?;
                continue;
            }

            let fetched = self
                .ctx
                .fetcher
                .get(&url, policy.max_retries, delay)
                .await;

            retry.run("add_visited", || store.add_visited(&url)).await?;
            retry
                .run("set_cooldown", || store.set_cooldown(host, delay))
                .await?;
            self.renew_lease(host).await?;

            match fetched {
                Ok(fetched) if fetched.is_success() => {
                    self.handle_page(host, &url, fetched, policy).await?;
                }
                Ok(fetched) => {
                    self.failures += 1;
                    tracing::debug!(url = %url, status = fetched.status, "Non-success response");
                }
                Err(e) => {
                    self.failures += 1;
                    tracing::warn!(host = %host, url = %url, error = %e, "Fetch failed");
                }
            }
        }
    }

    /// Refreshes the claim timestamp so lease recovery leaves the host alone
    ///
    /// Fails with [`FrontierError::NotClaimed`] once the claim is gone.
    async fn renew_lease(&self, host: &str) -> FrontierResult<()> {
        let store = &self.ctx.store;
        self.ctx
            .store_retry
            .run("mark_active", || store.mark_active(host))
            .await
    }

    /// Extracts a 2xx page, enqueues its links and hands it to the sink
    async fn handle_page(
        &mut self,
        host: &str,
        url: &str,
        fetched: Fetched,
        policy: &mut HostPolicy,
    ) -> FrontierResult<()> {
        let store = &self.ctx.store;
        let retry = self.ctx.store_retry;

        if let Some(final_url) = normalize(&fetched.final_url, host) {
            if final_url != url {
                retry.run("add_visited", || store.add_visited(&final_url)).await?;
            }
        }

        let html = String::from_utf8_lossy(&fetched.body).into_owned();
        let base = Url::parse(&fetched.final_url).or_else(|_| Url::parse(url));
        let extracted = match base {
            Ok(base) => extract_page(&html, &base),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Cannot resolve links, skipping extraction");
                Default::default()
            }
        };

        let links = self.filter_links(host, &extracted.links, policy);
        if !links.is_empty() {
            let summary = retry.run("push_urls", || store.push_urls(host, &links)).await?;
            tracing::debug!(
                url = %url,
                local = summary.local,
                remote = summary.remote,
                rejected = summary.rejected,
                "Enqueued links"
            );
        }

        self.ctx
            .pages
            .send(Page {
                url: url.to_string(),
                status: fetched.status,
                html,
                metadata: extracted.metadata,
                links,
                images: extracted.images,
                crawled_at: Utc::now(),
            })
            .await;

        policy.record_page();
        self.pages += 1;
        tracing::info!(url = %url, pages = policy.pages_crawled, "Crawled page");
        Ok(())
    }

    /// Normalizes and dedups links, dropping same-host URLs the policy forbids
    fn filter_links(&self, host: &str, raw: &[String], policy: &HostPolicy) -> Vec<String> {
        let mut seen = HashSet::new();
        raw.iter()
            .filter_map(|link| normalize(link, host))
            .filter(|link| match host_key(link) {
                Ok(key) if key == host => policy.is_allowed(link),
                Ok(_) => true,
                Err(_) => false,
            })
            .filter(|link| seen.insert(link.clone()))
            .collect()
    }

    /// Saves the final policy and releases the claim
    async fn release(&self, host: &str, policy: Option<&HostPolicy>, outcome: WorkerOutcome) {
        let store = &self.ctx.store;
        let retry = self.ctx.store_retry;

        if outcome == WorkerOutcome::LeaseLost {
            tracing::warn!(host = %host, "Claim lost to lease recovery, leaving host to its new holder");
            return;
        }

        if let Some(policy) = policy {
            if let Err(e) = retry
                .run("put_host_policy", || store.put_host_policy(policy))
                .await
            {
                tracing::error!(host = %host, error = %e, "Failed to save host policy");
            }
        }

        if outcome == WorkerOutcome::Interrupted {
            tracing::info!(host = %host, "Leaving claim for lease recovery");
            return;
        }

        if let Err(e) = retry
            .run("mark_completed", || store.mark_completed(host))
            .await
        {
            tracing::error!(host = %host, error = %e, "Failed to release host");
        }
    }
}
