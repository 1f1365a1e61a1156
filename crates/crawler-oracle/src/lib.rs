//! Robots & Politeness Oracle: a per-host cache of fetch permission and
//! minimum request delay, consulted before every fetch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crawler_types::CanonicalUrl;
use dashmap::DashMap;
use rand::Rng;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Crawl delay assumed when a host's robots.txt is unreachable or
    /// returns a server error: conservative, not zero.
    pub failure_delay: Duration,
    /// Delay used when robots.txt has no crawl-delay directive.
    pub default_delay: Duration,
    pub max_delay: Duration,
    pub cache_ttl: Duration,
    pub user_agent: String,
    pub fetch_timeout: Duration,
    /// +/- fraction of jitter applied on top of the computed delay.
    pub jitter_factor: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            failure_delay: Duration::from_secs(3),
            default_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(3600),
            user_agent: "CrawlerBot/1.0".to_string(),
            fetch_timeout: Duration::from_secs(10),
            jitter_factor: 0.2,
        }
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("failed to build robots.txt HTTP client: {0}")]
    ClientBuild(String),
}

#[derive(Debug, Clone)]
struct CachedRobots {
    robots_content: String,
    crawl_delay: Duration,
    fetched_at: Instant,
}

impl CachedRobots {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() > ttl
    }
}

/// Per-host robots cache with copy-on-write entries and single-flight
/// refresh: concurrent callers for the same stale/missing host block on
/// one fetch instead of stampeding the target.
pub struct RobotsOracle {
    config: OracleConfig,
    entries: DashMap<String, Arc<CachedRobots>>,
    refresh_locks: DashMap<String, Arc<AsyncMutex<()>>>,
    http_client: Client,
}

impl RobotsOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let http_client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| OracleError::ClientBuild(e.to_string()))?;
        Ok(Self {
            config,
            entries: DashMap::new(),
            refresh_locks: DashMap::new(),
            http_client,
        })
    }

    /// Whether `user_agent` may fetch `url` per the host's robots.txt.
    pub async fn allowed(&self, url: &CanonicalUrl, user_agent: &str) -> bool {
        let robots = self.robots_for_host(url.host(), url.scheme()).await;
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&robots.robots_content, user_agent, url.as_str())
    }

    /// Minimum delay to observe between requests to the host `url` points at.
    pub async fn delay_for(&self, url: &CanonicalUrl) -> Duration {
        self.robots_for_host(url.host(), url.scheme()).await.crawl_delay
    }

    async fn robots_for_host(&self, host: &str, scheme: &str) -> Arc<CachedRobots> {
        if let Some(cached) = self.entries.get(host) {
            if !cached.is_expired(self.config.cache_ttl) {
                return cached.clone();
            }
        }

        let lock = self
            .refresh_locks
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check: another caller may have refreshed while we waited.
        if let Some(cached) = self.entries.get(host) {
            if !cached.is_expired(self.config.cache_ttl) {
                return cached.clone();
            }
        }

        let cached = Arc::new(self.fetch_and_parse(host, scheme).await);
        self.entries.insert(host.to_string(), cached.clone());
        cached
    }

    async fn fetch_and_parse(&self, host: &str, scheme: &str) -> CachedRobots {
        let robots_url = format!("{scheme}://{host}/robots.txt");
        debug!(host, %robots_url, "fetching robots.txt");

        match self.http_client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => {
                    let crawl_delay = self.extract_crawl_delay(&body).unwrap_or(self.config.default_delay);
                    CachedRobots {
                        robots_content: body,
                        crawl_delay,
                        fetched_at: Instant::now(),
                    }
                }
                Err(e) => {
                    warn!(host, error = %e, "failed to read robots.txt body, assuming allowed");
                    self.permissive_entry()
                }
            },
            Ok(resp) if resp.status().is_server_error() => {
                warn!(host, status = %resp.status(), "robots.txt server error, assuming allowed");
                self.permissive_entry()
            }
            Ok(resp) => {
                // Any other status (404, etc.) means no robots.txt exists:
                // permissive, but at the normal default delay, not the
                // conservative failure delay.
                debug!(host, status = %resp.status(), "no robots.txt, default policy");
                CachedRobots {
                    robots_content: String::new(),
                    crawl_delay: self.config.default_delay,
                    fetched_at: Instant::now(),
                }
            }
            Err(e) => {
                warn!(host, error = %e, "robots.txt fetch failed, assuming allowed");
                self.permissive_entry()
            }
        }
    }

    fn permissive_entry(&self) -> CachedRobots {
        CachedRobots {
            robots_content: String::new(),
            crawl_delay: self.config.failure_delay,
            fetched_at: Instant::now(),
        }
    }

    fn extract_crawl_delay(&self, robots_content: &str) -> Option<Duration> {
        for line in robots_content.lines() {
            let line = line.trim().to_lowercase();
            if let Some(rest) = line.strip_prefix("crawl-delay:") {
                if let Ok(secs) = rest.trim().parse::<f64>() {
                    let clamped = secs
                        .max(1.0)
                        .min(self.config.max_delay.as_secs_f64());
                    return Some(Duration::from_secs_f64(clamped));
                }
            }
        }
        None
    }

    /// Apply configured jitter around a base delay (used by callers that
    /// want some desynchronization between workers hitting the same host).
    pub fn jittered(&self, base: Duration) -> Duration {
        let base_s = base.as_secs_f64();
        let range = base_s * self.config.jitter_factor;
        let jitter = if range > 0.0 {
            rand::thread_rng().gen_range(-range..=range)
        } else {
            0.0
        };
        Duration::from_secs_f64((base_s + jitter).max(0.1))
    }

    pub fn clear_cache(&self) {
        self.entries.clear();
        self.refresh_locks.clear();
        info!("cleared robots.txt cache");
    }

    pub fn cache_len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_oracle() -> RobotsOracle {
        RobotsOracle::new(OracleConfig::default()).unwrap()
    }

    #[test]
    fn extracts_and_clamps_crawl_delay() {
        let oracle = test_oracle();
        let delay = oracle
            .extract_crawl_delay("User-agent: *\nCrawl-delay: 100\n")
            .unwrap();
        assert_eq!(delay, oracle.config.max_delay);
    }

    #[test]
    fn missing_crawl_delay_is_none() {
        let oracle = test_oracle();
        assert!(oracle.extract_crawl_delay("User-agent: *\nDisallow: /admin\n").is_none());
    }

    #[tokio::test]
    async fn fetch_failure_is_permissive_with_conservative_delay() {
        let oracle = test_oracle();
        // No mock server behind this host: the connection will fail.
        let cached = oracle.fetch_and_parse("nonexistent.invalid.example", "https").await;
        assert!(cached.robots_content.is_empty());
        assert_eq!(cached.crawl_delay, oracle.config.failure_delay);
    }

    #[tokio::test]
    async fn fetch_and_parse_uses_the_given_scheme() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 2\n"))
            .mount(&server)
            .await;

        let oracle = test_oracle();
        let authority = server.uri().trim_start_matches("http://").to_string();
        let cached = oracle.fetch_and_parse(&authority, "http").await;
        assert_eq!(cached.crawl_delay, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn explicit_disallow_blocks_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
            .mount(&server)
            .await;

        let mut matcher = DefaultMatcher::default();
        let allowed = matcher.one_agent_allowed_by_robots(
            "User-agent: *\nDisallow: /private\n",
            "CrawlerBot/1.0",
            &format!("{}/private/page", server.uri()),
        );
        assert!(!allowed);
    }
}
