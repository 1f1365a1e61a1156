//! HTTP clients for the two services a fetch worker talks to: the
//! coordinator (task assignment, result submission, heartbeats) and the
//! indexer (pushing crawled documents). Both are behind small traits so
//! the run loop can be exercised against stub implementations in tests.

use std::time::Duration;

use async_trait::async_trait;
use crawler_types::{CanonicalUrl, LeaseId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerClientError {
    #[error("request to {0} timed out")]
    Timeout(String),
    #[error("network error talking to {0}: {1}")]
    Network(String, String),
    #[error("{0} returned an unexpected response: {1}")]
    Protocol(String, String),
}

#[derive(Debug, Clone)]
pub struct AssignedTask {
    pub lease_id: LeaseId,
    pub url: CanonicalUrl,
}

/// The coordinator RPC surface a worker needs. A trait so the poll loop
/// can be driven by a stub in tests instead of a live HTTP server.
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    async fn assign_task(&self, worker_id: &str) -> Result<Option<AssignedTask>, WorkerClientError>;

    async fn submit_result(
        &self,
        lease_id: LeaseId,
        success: bool,
        extracted_urls: Vec<CanonicalUrl>,
        error: Option<String>,
    ) -> Result<(), WorkerClientError>;

    async fn heartbeat(&self, worker_id: &str) -> Result<(), WorkerClientError>;
}

pub struct HttpCoordinatorClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCoordinatorClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client configuration is static and always valid"),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn classify(op: &str, err: reqwest::Error) -> WorkerClientError {
    if err.is_timeout() {
        WorkerClientError::Timeout(op.to_string())
    } else {
        WorkerClientError::Network(op.to_string(), err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct AssignTaskRequest<'a> {
    worker_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AssignTaskResponse {
    Task { lease_id: LeaseId, url: String },
    NoTask { status: String },
}

#[derive(Debug, Serialize)]
struct SubmitResultRequest<'a> {
    lease_id: LeaseId,
    success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    extracted_urls: Vec<&'a str>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct HeartbeatRequest<'a> {
    worker_id: &'a str,
}

#[async_trait]
impl CoordinatorClient for HttpCoordinatorClient {
    async fn assign_task(&self, worker_id: &str) -> Result<Option<AssignedTask>, WorkerClientError> {
        let resp = self
            .http
            .post(self.url("/assign_task"))
            .json(&AssignTaskRequest { worker_id })
            .send()
            .await
            .map_err(|e| classify("assign_task", e))?;

        let parsed: AssignTaskResponse = resp
            .json()
            .await
            .map_err(|e| WorkerClientError::Protocol("assign_task".to_string(), e.to_string()))?;

        match parsed {
            AssignTaskResponse::Task { lease_id, url } => {
                let url = CanonicalUrl::parse(&url)
                    .map_err(|e| WorkerClientError::Protocol("assign_task".to_string(), e.to_string()))?;
                Ok(Some(AssignedTask { lease_id, url }))
            }
            AssignTaskResponse::NoTask { .. } => Ok(None),
        }
    }

    async fn submit_result(
        &self,
        lease_id: LeaseId,
        success: bool,
        extracted_urls: Vec<CanonicalUrl>,
        error: Option<String>,
    ) -> Result<(), WorkerClientError> {
        let urls: Vec<&str> = extracted_urls.iter().map(|u| u.as_str()).collect();
        self.http
            .post(self.url("/submit_result"))
            .json(&SubmitResultRequest {
                lease_id,
                success,
                extracted_urls: urls,
                error,
            })
            .send()
            .await
            .map_err(|e| classify("submit_result", e))?;
        Ok(())
    }

    async fn heartbeat(&self, worker_id: &str) -> Result<(), WorkerClientError> {
        self.http
            .post(self.url("/heartbeat"))
            .json(&HeartbeatRequest { worker_id })
            .send()
            .await
            .map_err(|e| classify("heartbeat", e))?;
        Ok(())
    }
}

/// The indexer's single write RPC, as its own trait so a worker running
/// without a configured indexer can use a no-op implementation.
#[async_trait]
pub trait IndexPublisher: Send + Sync {
    async fn publish(&self, url: &str, title: &str, content: &str) -> Result<(), WorkerClientError>;
}

pub struct HttpIndexPublisher {
    http: reqwest::Client,
    base_url: String,
}

impl HttpIndexPublisher {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client configuration is static and always valid"),
            base_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct IndexRequest<'a> {
    url: &'a str,
    title: &'a str,
    content: &'a str,
}

#[async_trait]
impl IndexPublisher for HttpIndexPublisher {
    async fn publish(&self, url: &str, title: &str, content: &str) -> Result<(), WorkerClientError> {
        let endpoint = format!("{}/index", self.base_url.trim_end_matches('/'));
        self.http
            .post(endpoint)
            .json(&IndexRequest { url, title, content })
            .send()
            .await
            .map_err(|e| classify("index", e))?;
        Ok(())
    }
}

/// Used when no indexer is configured: crawling still proceeds, documents
/// are simply not published anywhere.
pub struct NullIndexPublisher;

#[async_trait]
impl IndexPublisher for NullIndexPublisher {
    async fn publish(&self, _url: &str, _title: &str, _content: &str) -> Result<(), WorkerClientError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn assign_task_parses_task_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assign_task"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "lease_id": LeaseId::new(),
                "url": "https://example.com/a",
            })))
            .mount(&server)
            .await;

        let client = HttpCoordinatorClient::new(server.uri(), Duration::from_secs(5));
        let task = client.assign_task("w1").await.unwrap().unwrap();
        assert_eq!(task.url.as_str(), "https://example.com/a");
    }

    #[tokio::test]
    async fn assign_task_no_task_response_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assign_task"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "no-task" })))
            .mount(&server)
            .await;

        let client = HttpCoordinatorClient::new(server.uri(), Duration::from_secs(5));
        assert!(client.assign_task("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn publish_sends_expected_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })))
            .mount(&server)
            .await;

        let publisher = HttpIndexPublisher::new(server.uri(), Duration::from_secs(5));
        publisher.publish("https://a.test/", "Title", "body text").await.unwrap();
    }
}
