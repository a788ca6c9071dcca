//! Crawl engine - worker pool and claim loop
//!
//! The engine repeatedly claims hosts from the frontier and runs one
//! [`Worker`] per claimed host, never more than `max_workers` at a time.
//! It exits when a shutdown signal arrives, when the frontier stays empty
//! with no worker running (if configured), or when the store has failed
//! too many times in a row.

use crate::config::Config;
use crate::crawler::retry::StoreRetry;
use crate::crawler::worker::{Worker, WorkerContext, WorkerOutcome, WorkerReport};
use crate::crawler::Fetch;
use crate::frontier::{ClaimOutcome, FrontierError, FrontierStore};
use crate::robots::{BuilderLimits, PolicyBuilder};
use crate::sink::{PageSink, PageWriter};
use crate::state::PolicyDefaults;
use crate::url::normalize;
use crate::SpiderError;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

/// Tunables for the claim loop
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub max_workers: usize,
    /// Base sleep when the new-host set is empty
    pub idle_backoff: Duration,
    /// Claims older than this are released at startup
    pub claim_lease: Duration,
    /// Consecutive claim failures before the engine gives up
    pub max_store_failures: u32,
    /// Return once the frontier is empty and no worker is running
    pub exit_when_idle: bool,
    /// Pages buffered between workers and the sink
    pub queue_capacity: usize,
    pub store_retry: StoreRetry,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_workers: 10,
            idle_backoff: Duration::from_millis(500),
            claim_lease: Duration::from_secs(3600),
            max_store_failures: 10,
            exit_when_idle: false,
            queue_capacity: 64,
            store_retry: StoreRetry::default(),
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.crawler.max_workers,
            idle_backoff: config.crawler.idle_backoff(),
            claim_lease: config.crawler.claim_lease(),
            max_store_failures: config.crawler.max_store_failures,
            exit_when_idle: config.crawler.exit_when_idle,
            queue_capacity: config.output.queue_capacity,
            store_retry: StoreRetry::default(),
        }
    }
}

/// Totals for one engine run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSummary {
    pub hosts_claimed: u64,
    pub hosts_completed: u64,
    pub hosts_abandoned: u64,
    pub hosts_interrupted: u64,
    pub hosts_failed: u64,
    pub pages: u64,
    pub fetch_failures: u64,
    pub pages_persisted: u64,
}

impl EngineSummary {
    fn record(&mut self, report: &WorkerReport) {
        match report.outcome {
            WorkerOutcome::Exhausted | WorkerOutcome::PageCapReached => self.hosts_completed += 1,
            WorkerOutcome::Abandoned => self.hosts_abandoned += 1,
            WorkerOutcome::Interrupted | WorkerOutcome::LeaseLost => self.hosts_interrupted += 1,
            WorkerOutcome::Failed => self.hosts_failed += 1,
        }
        self.pages += u64::from(report.pages);
        self.fetch_failures += u64::from(report.failures);
    }
}

/// Owns the worker pool and the claim loop
pub struct Engine {
    store: Arc<dyn FrontierStore>,
    fetcher: Arc<dyn Fetch>,
    policies: Arc<PolicyBuilder>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(
        store: Arc<dyn FrontierStore>,
        fetcher: Arc<dyn Fetch>,
        policies: PolicyBuilder,
        options: EngineOptions,
    ) -> Self {
        Self {
            store,
            fetcher,
            policies: Arc::new(policies),
            options,
        }
    }

    /// Builds an engine with policy defaults and limits taken from `config`
    pub fn from_config(
        config: &Config,
        store: Arc<dyn FrontierStore>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        let defaults = PolicyDefaults {
            crawl_delay_secs: config.crawler.crawl_delay,
            max_pages: config.crawler.max_pages,
            max_retries: config.crawler.max_retries,
        };
        let limits = BuilderLimits {
            robots_retries: config.crawler.robots_retries,
            sitemap_retries: config.crawler.sitemap_retries,
            retry_delay: config.crawler.crawl_delay(),
        };
        let policies = PolicyBuilder::new(
            Arc::clone(&fetcher),
            config.user_agent.name.clone(),
            defaults,
            limits,
        );

        Self::new(store, fetcher, policies, EngineOptions::from_config(config))
    }

    /// Normalizes seed URLs and pushes them to the new-host set
    ///
    /// # Returns
    ///
    /// The number of seeds accepted
    pub async fn seed(&self, seeds: &[String]) -> crate::Result<usize> {
        let mut accepted = 0;
        for raw in seeds {
            let Some(url) = normalize(raw, "") else {
                tracing::warn!(seed = %raw, "Rejected seed URL");
                continue;
            };

            let store = &self.store;
            self.options
                .store_retry
                .run("push_url", || store.push_url(&url))
                .await?;
            tracing::debug!(url = %url, "Seeded");
            accepted += 1;
        }
        Ok(accepted)
    }

    /// Runs the claim loop until shutdown, idleness or store failure
    ///
    /// In every case the loop stops claiming, waits for running workers and
    /// drains the page sink before returning.
    pub async fn run(
        &self,
        sink: Arc<dyn PageSink>,
        mut shutdown: watch::Receiver<bool>,
    ) -> crate::Result<EngineSummary> {
        match self.store.requeue_stale_claims(self.options.claim_lease).await {
            Ok(released) if !released.is_empty() => {
                tracing::warn!(count = released.len(), hosts = ?released, "Released stale claims");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to release stale claims"),
        }

        let writer = PageWriter::spawn(sink, self.options.queue_capacity);
        let context = WorkerContext {
            store: Arc::clone(&self.store),
            fetcher: Arc::clone(&self.fetcher),
            policies: Arc::clone(&self.policies),
            pages: writer.sender(),
            store_retry: self.options.store_retry,
        };

        let semaphore = Arc::new(Semaphore::new(self.options.max_workers.max(1)));
        let mut workers: JoinSet<WorkerReport> = JoinSet::new();
        let mut summary = EngineSummary::default();
        let mut consecutive_failures = 0u32;
        let mut fatal: Option<FrontierError> = None;

        tracing::info!(max_workers = self.options.max_workers, "Engine started");

        loop {
            while let Some(joined) = workers.try_join_next() {
                Self::collect(joined, &mut summary);
            }

            if *shutdown.borrow() {
                tracing::info!("Shutdown requested, no further claims");
                break;
            }

            let permit = tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("Worker semaphore closed");
                        break;
                    }
                },
                _ = shutdown.changed() => continue,
            };

            match self.store.claim_new_host().await {
                Ok(ClaimOutcome::Claimed(claim)) => {
                    consecutive_failures = 0;
                    summary.hosts_claimed += 1;
                    tracing::debug!(host = %claim.host, "Claimed host");

                    let worker = Worker::new(context.clone(), claim, shutdown.clone());
                    workers.spawn(async move {
                        let report = worker.run().await;
                        drop(permit);
                        report
                    });
                }
                Ok(ClaimOutcome::Ineligible { host, url }) => {
                    consecutive_failures = 0;
                    tracing::trace!(host = %host, url = %url, "Entry not claimable");
                }
                Ok(ClaimOutcome::Empty) => {
                    consecutive_failures = 0;
                    drop(permit);

                    if self.options.exit_when_idle && workers.is_empty() {
                        tracing::info!("Frontier empty and no workers running");
                        break;
                    }
                    self.idle(&mut shutdown, &mut workers, &mut summary).await;
                }
                Err(e) => {
                    drop(permit);
                    consecutive_failures += 1;
                    if !e.is_transient() || consecutive_failures >= self.options.max_store_failures
                    {
                        tracing::error!(
                            failures = consecutive_failures,
                            error = %e,
                            "Frontier store unavailable, stopping"
                        );
                        fatal = Some(e);
                        break;
                    }
                    tracing::warn!(failures = consecutive_failures, error = %e, "Claim failed, backing off");
                    let backoff = self.options.store_retry.backoff * consecutive_failures;
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            Self::collect(joined, &mut summary);
        }

        drop(context);
        let written = writer.close().await;
        summary.pages_persisted = written.persisted;

        tracing::info!(
            hosts = summary.hosts_claimed,
            pages = summary.pages,
            persisted = summary.pages_persisted,
            "Engine stopped"
        );

        match fatal {
            Some(last) => Err(SpiderError::StoreUnavailable {
                attempts: consecutive_failures,
                last,
            }),
            None => Ok(summary),
        }
    }

    /// Sleeps a jittered backoff, waking early for shutdown or a finished worker
    async fn idle(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        workers: &mut JoinSet<WorkerReport>,
        summary: &mut EngineSummary,
    ) {
        let base = self.options.idle_backoff;
        let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
        let backoff = base + Duration::from_millis(jitter_ms);

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = shutdown.changed() => {}
            Some(joined) = workers.join_next() => Self::collect(joined, summary),
        }
    }

    fn collect(joined: Result<WorkerReport, tokio::task::JoinError>, summary: &mut EngineSummary) {
        match joined {
            Ok(report) => summary.record(&report),
            Err(e) => {
                summary.hosts_failed += 1;
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
    }
}

/// Returns a shutdown channel that flips to `true` on Ctrl-C
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, initiating graceful shutdown");
                let _ = tx.send(true);
            }
            Err(e) => {
                // A dropped sender would wake every `changed()` waiter
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                tx.closed().await;
            }
        }
    });
    rx
}
