//! The worker's main loop: heartbeat on a fixed interval, poll the
//! coordinator for work with exponential backoff while idle, fetch,
//! report the result, and push successful documents to the indexer.

use std::sync::Arc;
use std::time::Duration;

use crawler_fetch::Fetcher;
use tracing::{info, warn};

use crate::client::{CoordinatorClient, IndexPublisher};

pub struct WorkerRuntime {
    pub worker_id: String,
    pub coordinator: Arc<dyn CoordinatorClient>,
    pub indexer: Arc<dyn IndexPublisher>,
    pub fetcher: Arc<Fetcher>,
    pub heartbeat_interval: Duration,
    pub poll_backoff_min: Duration,
    pub poll_backoff_max: Duration,
}

impl WorkerRuntime {
    /// Runs until `shutdown` resolves. Heartbeats continue on their own
    /// task; the poll loop exits as soon as the current fetch (if any)
    /// completes.
    pub async fn run(self: Arc<Self>, shutdown: impl std::future::Future<Output = ()>) {
        let heartbeat_handle = tokio::spawn(self.clone().heartbeat_loop());

        tokio::pin!(shutdown);
        tokio::select! {
            _ = self.poll_loop() => {}
            _ = &mut shutdown => {
                info!(worker_id = %self.worker_id, "shutdown signal received, finishing in-flight fetch");
            }
        }

        heartbeat_handle.abort();
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.heartbeat_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.coordinator.heartbeat(&self.worker_id).await {
                warn!(worker_id = %self.worker_id, error = %e, "heartbeat failed");
            }
        }
    }

    async fn poll_loop(&self) {
        let mut backoff = self.poll_backoff_min;
        loop {
            match self.coordinator.assign_task(&self.worker_id).await {
                Ok(Some(task)) => {
                    backoff = self.poll_backoff_min;
                    self.run_one(task.lease_id, task.url).await;
                }
                Ok(None) => {
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.poll_backoff_max);
                }
                Err(e) => {
                    warn!(worker_id = %self.worker_id, error = %e, "assign_task failed, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.poll_backoff_max);
                }
            }
        }
    }

    async fn run_one(&self, lease_id: crawler_types::LeaseId, url: crawler_types::CanonicalUrl) {
        info!(worker_id = %self.worker_id, %lease_id, %url, "starting fetch");

        match self.fetcher.fetch(&url).await {
            Ok(result) => {
                let link_count = result.links.len();
                info!(worker_id = %self.worker_id, %lease_id, %url, links = link_count, "fetch succeeded");

                let title = result.document.title.as_deref().unwrap_or("No Title");
                if let Err(e) = self.indexer.publish(result.final_url.as_str(), title, &result.document.body).await {
                    warn!(worker_id = %self.worker_id, url = %result.final_url, error = %e, "failed to publish document to indexer");
                }

                if let Err(e) = self
                    .coordinator
                    .submit_result(lease_id, true, result.links, None)
                    .await
                {
                    warn!(worker_id = %self.worker_id, %lease_id, error = %e, "failed to submit successful result");
                }
            }
            Err(err) => {
                let retryable = err.is_retryable();
                warn!(worker_id = %self.worker_id, %lease_id, %url, error = %err, retryable, "fetch failed");
                if let Err(e) = self
                    .coordinator
                    .submit_result(lease_id, false, Vec::new(), Some(err.detail.clone()))
                    .await
                {
                    warn!(worker_id = %self.worker_id, %lease_id, error = %e, "failed to submit failed result");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crawler_oracle::{OracleConfig, RobotsOracle};
    use crawler_types::{CanonicalUrl, LeaseId};
    use std::sync::Mutex as StdMutex;

    struct StubCoordinator {
        tasks: StdMutex<Vec<(LeaseId, String)>>,
        results: StdMutex<Vec<(LeaseId, bool)>>,
    }

    #[async_trait]
    impl CoordinatorClient for StubCoordinator {
        async fn assign_task(&self, _worker_id: &str) -> Result<Option<crate::client::AssignedTask>, crate::client::WorkerClientError> {
            let mut tasks = self.tasks.lock().unwrap();
            Ok(tasks.pop().map(|(lease_id, url)| crate::client::AssignedTask {
                lease_id,
                url: CanonicalUrl::parse(&url).unwrap(),
            }))
        }

        async fn submit_result(
            &self,
            lease_id: LeaseId,
            success: bool,
            _extracted_urls: Vec<CanonicalUrl>,
            _error: Option<String>,
        ) -> Result<(), crate::client::WorkerClientError> {
            self.results.lock().unwrap().push((lease_id, success));
            Ok(())
        }

        async fn heartbeat(&self, _worker_id: &str) -> Result<(), crate::client::WorkerClientError> {
            Ok(())
        }
    }

    struct RecordingIndexer {
        published: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl IndexPublisher for RecordingIndexer {
        async fn publish(&self, url: &str, _title: &str, _content: &str) -> Result<(), crate::client::WorkerClientError> {
            self.published.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl crawler_fetch::Transport for FailingTransport {
        async fn get(&self, _url: &str, _timeout: Duration) -> Result<crawler_fetch::FetchResponse, crawler_fetch::TransportError> {
            Err(crawler_fetch::TransportError::Network("connection refused".to_string()))
        }
    }

    fn fetcher_that_always_fails() -> Arc<Fetcher> {
        Arc::new(Fetcher::new(
            Arc::new(FailingTransport),
            Arc::new(RobotsOracle::new(OracleConfig::default()).unwrap()),
            crawler_fetch::FetcherConfig::default(),
        ))
    }

    #[tokio::test]
    async fn run_one_submits_failure_on_fetch_error() {
        let coordinator = Arc::new(StubCoordinator {
            tasks: StdMutex::new(vec![]),
            results: StdMutex::new(vec![]),
        });
        let indexer = Arc::new(RecordingIndexer {
            published: StdMutex::new(vec![]),
        });
        let runtime = WorkerRuntime {
            worker_id: "w1".to_string(),
            coordinator: coordinator.clone(),
            indexer,
            fetcher: fetcher_that_always_fails(),
            heartbeat_interval: Duration::from_secs(30),
            poll_backoff_min: Duration::from_millis(10),
            poll_backoff_max: Duration::from_millis(100),
        };

        let lease_id = LeaseId::new();
        let url = CanonicalUrl::parse("https://example.com/").unwrap();
        runtime.run_one(lease_id, url).await;

        let results = coordinator.results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0], (lease_id, false));
    }
}
