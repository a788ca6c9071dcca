//! Host policy construction from robots.txt and sitemaps

use crate::crawler::{Fetch, FetchError};
use crate::robots::parser::parse_robots;
use crate::robots::sitemap::{parse_sitemap, Sitemap, SitemapError};
use crate::state::{HostPolicy, PolicyDefaults};
use crate::url::{canonical_host, normalize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on sitemap documents fetched per host, index children included
const MAX_SITEMAPS_PER_HOST: usize = 50;

/// Errors that prevent a host policy from being built
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("robots.txt unreachable for {host}: {source}")]
    RobotsUnreachable {
        host: String,
        #[source]
        source: FetchError,
    },
}

/// Result of building a policy for one host
#[derive(Debug, Clone)]
pub struct BuiltPolicy {
    pub policy: HostPolicy,
    /// Normalized page URLs found in the host's sitemaps
    pub seeds: Vec<String>,
    /// Sitemaps that could not be fetched or parsed
    pub failed_sitemaps: usize,
}

/// Retry budgets for the requests made while building a policy
#[derive(Debug, Clone, Copy)]
pub struct BuilderLimits {
    pub robots_retries: u32,
    pub sitemap_retries: u32,
    /// Pause between retries
    pub retry_delay: Duration,
}

impl Default for BuilderLimits {
    fn default() -> Self {
        Self {
            robots_retries: 3,
            sitemap_retries: 1,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Builds [`HostPolicy`] values by fetching robots.txt and sitemaps
pub struct PolicyBuilder {
    fetcher: Arc<dyn Fetch>,
    agent: String,
    defaults: PolicyDefaults,
    limits: BuilderLimits,
    scheme: String,
}

impl PolicyBuilder {
    /// Creates a builder that reads robots groups for `agent` and `*`
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        agent: impl Into<String>,
        defaults: PolicyDefaults,
        limits: BuilderLimits,
    ) -> Self {
        Self {
            fetcher,
            agent: agent.into(),
            defaults,
            limits,
            scheme: "https".to_string(),
        }
    }

    /// Overrides the scheme used for the robots.txt URL (plain-HTTP test servers)
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Builds the policy for `host`
    ///
    /// A robots.txt fetch that exhausts its retries is an error. A robots.txt
    /// answered with a non-2xx status means "no rules". Sitemap failures are
    /// counted and skipped.
    pub async fn build(&self, host: &str) -> Result<BuiltPolicy, PolicyError> {
        let host = canonical_host(host);
        let robots_url = format!("{}://{}/robots.txt", self.scheme, host);

        let fetched = self
            .fetcher
            .get(
                &robots_url,
                self.limits.robots_retries,
                self.limits.retry_delay,
            )
            .await
            .map_err(|source| PolicyError::RobotsUnreachable {
                host: host.clone(),
                source,
            })?;

        let mut policy = HostPolicy::with_defaults(host.clone(), &self.defaults);

        if !fetched.is_success() {
            tracing::debug!(host = %host, status = fetched.status, "No robots.txt, using defaults");
            return Ok(BuiltPolicy {
                policy,
                seeds: Vec::new(),
                failed_sitemaps: 0,
            });
        }

        let rules = parse_robots(&String::from_utf8_lossy(&fetched.body), &self.agent);
        policy.allowed_prefixes = rules.allow;
        policy.disallowed_prefixes = rules.disallow;
        if let Some(delay) = rules.crawl_delay {
            policy.crawl_delay_secs = delay;
        }

        let (seeds, failed_sitemaps) = self.collect_sitemap_urls(&host, rules.sitemaps).await;

        tracing::info!(
            host = %host,
            disallowed = policy.disallowed_prefixes.len(),
            crawl_delay = policy.crawl_delay_secs,
            seeds = seeds.len(),
            failed_sitemaps,
            "Built host policy"
        );

        Ok(BuiltPolicy {
            policy,
            seeds,
            failed_sitemaps,
        })
    }

    /// Fetches sitemaps breadth-first, expanding indexes one level
    ///
    /// Seeds keep document order; repeats are dropped.
    async fn collect_sitemap_urls(&self, host: &str, sitemaps: Vec<String>) -> (Vec<String>, usize) {
        let mut pending: VecDeque<(String, bool)> =
            sitemaps.into_iter().map(|url| (url, true)).collect();
        let mut seeds = Vec::new();
        let mut seen = HashSet::new();
        let mut failed = 0;
        let mut fetched_count = 0;

        while let Some((url, may_expand)) = pending.pop_front() {
            if fetched_count == MAX_SITEMAPS_PER_HOST {
                tracing::debug!(host, skipped = pending.len() + 1, "Sitemap limit reached");
                break;
            }
            fetched_count += 1;

            match self.fetch_sitemap(&url).await {
                Ok(Sitemap::UrlSet(locs)) => {
                    seeds.extend(
                        locs.iter()
                            .filter_map(|loc| normalize(loc, host))
                            .filter(|url| seen.insert(url.clone())),
                    );
                }
                Ok(Sitemap::Index(children)) if may_expand => {
                    pending.extend(children.into_iter().map(|child| (child, false)));
                }
                Ok(Sitemap::Index(_)) => {
                    tracing::debug!(url = %url, "Skipping nested sitemap index");
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Skipping sitemap");
                    failed += 1;
                }
            }
        }

        (seeds, failed)
    }

    async fn fetch_sitemap(&self, url: &str) -> Result<Sitemap, SitemapFailure> {
        let fetched = self
            .fetcher
            .get(url, self.limits.sitemap_retries, self.limits.retry_delay)
            .await?;

        if !fetched.is_success() {
            return Err(SitemapFailure::Status(fetched.status));
        }

        Ok(parse_sitemap(&fetched.body)?)
    }
}

/// Why a single sitemap was skipped
#[derive(Debug, Error)]
enum SitemapFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("status {0}")]
    Status(u16),

    #[error(transparent)]
    Parse(#[from] SitemapError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::HttpFetcher;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn limits() -> BuilderLimits {
        BuilderLimits {
            robots_retries: 3,
            sitemap_retries: 1,
            retry_delay: Duration::ZERO,
        }
    }

    fn builder() -> PolicyBuilder {
        let fetcher = HttpFetcher::new("test-agent", Duration::from_secs(5)).unwrap();
        PolicyBuilder::new(Arc::new(fetcher), "spider", PolicyDefaults::default(), limits())
            .with_scheme("http")
    }

    /// Host key of the mock server, e.g. `127.0.0.1:41234`
    fn host_of(server: &MockServer) -> String {
        server.address().to_string()
    }

    #[tokio::test]
    async fn test_policy_from_robots() {
        let server = MockServer::start().await;
        let sitemap_url = format!("{}/sitemap.xml", server.uri());
        let robots = format!(
            "User-agent: *\nDisallow: /private/\nAllow: /private/open/\nCrawl-delay: 2\nSitemap: {}\n",
            sitemap_url
        );
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(robots))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<urlset><url><loc>/about</loc></url><url><loc>/login</loc></url></urlset>",
            ))
            .mount(&server)
            .await;

        let host = host_of(&server);
        let built = builder().build(&host).await.unwrap();

        assert_eq!(built.policy.name, host);
        assert_eq!(built.policy.disallowed_prefixes, vec!["/private/"]);
        assert_eq!(built.policy.allowed_prefixes, vec!["/private/open/"]);
        assert_eq!(built.policy.crawl_delay_secs, 2);
        assert_eq!(built.seeds, vec![format!("https://{}/about/", host)]);
        assert_eq!(built.failed_sitemaps, 0);
    }

    #[tokio::test]
    async fn test_missing_robots_uses_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let built = builder().build(&host_of(&server)).await.unwrap();

        assert!(built.policy.disallowed_prefixes.is_empty());
        assert_eq!(built.policy.crawl_delay_secs, 5);
        assert!(built.seeds.is_empty());
    }

    #[tokio::test]
    async fn test_robots_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let result = builder().build(&host_of(&server)).await;
        assert!(matches!(result, Err(PolicyError::RobotsUnreachable { .. })));
    }

    #[tokio::test]
    async fn test_failed_sitemaps_are_counted() {
        let server = MockServer::start().await;
        let robots = format!(
            "Sitemap: {0}/broken.xml\nSitemap: {0}/html.xml\nSitemap: {0}/good.xml\n",
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(robots))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/html.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/good.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<urlset><url><loc>/kept</loc></url></urlset>"),
            )
            .mount(&server)
            .await;

        let host = host_of(&server);
        let built = builder().build(&host).await.unwrap();

        assert_eq!(built.failed_sitemaps, 2);
        assert_eq!(built.seeds, vec![format!("https://{}/kept/", host)]);
    }

    #[tokio::test]
    async fn test_sitemap_index_expanded_once() {
        let server = MockServer::start().await;
        let robots = format!("Sitemap: {}/index.xml\n", server.uri());
        let index = format!(
            "<sitemapindex><sitemap><loc>{0}/posts.xml</loc></sitemap><sitemap><loc>{0}/nested.xml</loc></sitemap></sitemapindex>",
            server.uri()
        );
        let nested = format!(
            "<sitemapindex><sitemap><loc>{}/deeper.xml</loc></sitemap></sitemapindex>",
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(robots))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/index.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/posts.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<urlset><url><loc>/post-1</loc></url></urlset>"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/nested.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(nested))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/deeper.xml"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let host = host_of(&server);
        let built = builder().build(&host).await.unwrap();

        assert_eq!(built.seeds, vec![format!("https://{}/post-1/", host)]);
        assert_eq!(built.failed_sitemaps, 0);
    }

    #[tokio::test]
    async fn test_sitemap_seeds_keep_document_order() {
        let server = MockServer::start().await;
        let robots = format!("Sitemap: {}/sitemap.xml\n", server.uri());
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(robots))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<urlset><url><loc>/zeta</loc></url><url><loc>/alpha</loc></url>\
                 <url><loc>/zeta</loc></url><url><loc>/middle</loc></url></urlset>",
            ))
            .mount(&server)
            .await;

        let host = host_of(&server);
        let built = builder().build(&host).await.unwrap();

        assert_eq!(
            built.seeds,
            vec![
                format!("https://{}/zeta/", host),
                format!("https://{}/alpha/", host),
                format!("https://{}/middle/", host),
            ]
        );
    }
}
