//! Fetcher: turns a URL into a link set plus an extracted document, or a
//! classified [`FetchError`]. Holds no state beyond a per-host "last
//! fetched at" map and a reference to the shared [`RobotsOracle`], so one
//! process can run many fetchers concurrently without coordination beyond
//! that shared oracle.

mod extract;
mod transport;

pub use transport::{FetchResponse, ReqwestTransport, Transport, TransportError};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crawler_oracle::RobotsOracle;
use crawler_types::{CanonicalUrl, FetchDocument, FetchError, FetchErrorKind, FetchResult};
use dashmap::DashMap;
use tracing::{debug, info};

pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "CrawlerBot/1.0".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Per-host request/success/failure counters. No external metrics
/// exporter here, just log fields and an accessor an operator can poll.
#[derive(Debug, Clone, Default)]
pub struct HostMetrics {
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
}

pub struct Fetcher {
    transport: Arc<dyn Transport>,
    oracle: Arc<RobotsOracle>,
    config: FetcherConfig,
    last_fetch_per_host: DashMap<String, Instant>,
    metrics_per_host: DashMap<String, HostMetrics>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, oracle: Arc<RobotsOracle>, config: FetcherConfig) -> Self {
        Self {
            transport,
            oracle,
            config,
            last_fetch_per_host: DashMap::new(),
            metrics_per_host: DashMap::new(),
        }
    }

    /// Snapshot of request/success/failure counters for one host, for logs
    /// or an operator status endpoint. `None` if the host has never been
    /// fetched.
    pub fn host_metrics(&self, host: &str) -> Option<HostMetrics> {
        self.metrics_per_host.get(host).map(|m| m.clone())
    }

    pub async fn fetch(&self, url: &CanonicalUrl) -> Result<FetchResult, FetchError> {
        let host = url.host().to_string();
        let result = self.fetch_inner(url, &host).await;
        self.record_metrics(&host, result.is_ok());
        result
    }

    fn record_metrics(&self, host: &str, success: bool) {
        let mut entry = self.metrics_per_host.entry(host.to_string()).or_default();
        entry.request_count += 1;
        if success {
            entry.success_count += 1;
        } else {
            entry.failure_count += 1;
        }
    }

    async fn fetch_inner(&self, url: &CanonicalUrl, host: &str) -> Result<FetchResult, FetchError> {
        if !self.oracle.allowed(url, &self.config.user_agent).await {
            debug!(url = %url, "disallowed by robots.txt");
            return Err(FetchError::new(FetchErrorKind::DisallowedByRobots, "robots.txt disallow"));
        }

        self.wait_for_politeness(url).await;

        let response = self
            .transport
            .get(url.as_str(), self.config.timeout)
            .await
            .map_err(|e| match e {
                TransportError::Timeout => FetchError::new(FetchErrorKind::Timeout, "request timed out"),
                TransportError::Network(detail) => FetchError::new(FetchErrorKind::Network, detail),
            })?;

        self.last_fetch_per_host.insert(host.to_string(), Instant::now());

        if response.status != 200 {
            return Err(FetchError::new(
                FetchErrorKind::HttpStatus { code: response.status },
                format!("unexpected status {}", response.status),
            ));
        }

        let final_url = CanonicalUrl::parse(&response.final_url)
            .map_err(|e| FetchError::new(FetchErrorKind::Parse, e.to_string()))?;

        let extracted = extract::extract(&response.body, &final_url)
            .map_err(|e| FetchError::new(FetchErrorKind::Parse, e))?;

        info!(url = %final_url, host, links = extracted.links.len(), "fetched document");

        Ok(FetchResult {
            final_url,
            links: extracted.links,
            document: FetchDocument {
                title: extracted.title,
                body: extracted.body,
            },
        })
    }

    async fn wait_for_politeness(&self, url: &CanonicalUrl) {
        let delay = self.oracle.delay_for(url).await;
        if let Some(last) = self.last_fetch_per_host.get(url.host()) {
            let elapsed = last.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crawler_oracle::OracleConfig;
    use std::sync::Mutex;

    struct StubTransport {
        responses: Mutex<Vec<Result<FetchResponse, TransportError>>>,
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn get(&self, _url: &str, _timeout: Duration) -> Result<FetchResponse, TransportError> {
            self.responses.lock().unwrap().pop().unwrap()
        }
    }

    fn oracle() -> Arc<RobotsOracle> {
        Arc::new(RobotsOracle::new(OracleConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn non_200_status_is_classified() {
        let transport = Arc::new(StubTransport {
            responses: Mutex::new(vec![Ok(FetchResponse {
                final_url: "https://example.com/a".to_string(),
                status: 503,
                body: String::new(),
            })]),
        });
        let fetcher = Fetcher::new(transport, oracle(), FetcherConfig::default());
        let url = CanonicalUrl::parse("https://example.com/a").unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::HttpStatus { code: 503 });
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn successful_fetch_extracts_links_and_document() {
        let html = r#"<html><head><title>Hi</title></head><body><p>Hello world</p><a href="/about">About</a></body></html>"#;
        let transport = Arc::new(StubTransport {
            responses: Mutex::new(vec![Ok(FetchResponse {
                final_url: "https://example.com/".to_string(),
                status: 200,
                body: html.to_string(),
            })]),
        });
        let fetcher = Fetcher::new(transport, oracle(), FetcherConfig::default());
        let url = CanonicalUrl::parse("https://example.com/").unwrap();
        let result = fetcher.fetch(&url).await.unwrap();
        assert_eq!(result.document.title.as_deref(), Some("Hi"));
        assert_eq!(result.links.len(), 1);
        assert_eq!(result.links[0].as_str(), "https://example.com/about");
    }

    #[tokio::test]
    async fn host_metrics_track_successes_and_failures() {
        let transport = Arc::new(StubTransport {
            responses: Mutex::new(vec![
                Ok(FetchResponse {
                    final_url: "https://example.com/".to_string(),
                    status: 200,
                    body: "<html><body>ok</body></html>".to_string(),
                }),
                Err(TransportError::Timeout),
            ]),
        });
        let fetcher = Fetcher::new(transport, oracle(), FetcherConfig::default());
        let url = CanonicalUrl::parse("https://example.com/").unwrap();

        assert!(fetcher.fetch(&url).await.is_err());
        assert!(fetcher.fetch(&url).await.is_ok());

        let metrics = fetcher.host_metrics("example.com").unwrap();
        assert_eq!(metrics.request_count, 2);
        assert_eq!(metrics.success_count, 1);
        assert_eq!(metrics.failure_count, 1);
        assert!(fetcher.host_metrics("other.test").is_none());
    }
}
