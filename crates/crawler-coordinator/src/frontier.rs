//! The crawl frontier: SeenSet, pending queue, lease table, and worker
//! registry. A URL is admitted to the SeenSet before it is enqueued, so a
//! link extracted twice is enqueued once; it stays in the SeenSet forever,
//! which also prevents a completed or terminally-failed URL from being
//! dispatched again.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crawler_types::{CanonicalUrl, LeaseId, WorkerId};
use dashmap::DashMap;
use tokio::sync::Mutex;

/// The capability the Coordinator actually depends on for task
/// distribution: enqueue a URL, dequeue the next one for a worker, and
/// acknowledge its outcome. `Frontier` is the only implementation in this
/// workspace (an external queue would be a second one behind this same
/// trait, never plumbed through as a Frontier method directly).
#[async_trait]
pub trait TaskTransport: Send + Sync {
    async fn enqueue(&self, url: CanonicalUrl) -> bool;
    async fn dequeue(&self, worker_id: WorkerId) -> Option<(LeaseId, CanonicalUrl)>;
    async fn ack(&self, lease_id: LeaseId, success: bool, extracted_urls: Vec<CanonicalUrl>, error: Option<String>) -> CompleteOutcome;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FrontierError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

struct Lease {
    worker_id: WorkerId,
    url: CanonicalUrl,
    deadline: Instant,
    attempt: u32,
}

#[derive(Debug, Clone)]
pub struct FrontierStats {
    pub queued: usize,
    pub in_flight: usize,
    pub visited: usize,
    pub failed: usize,
    pub workers_alive: usize,
    pub uptime_secs: u64,
}

pub enum CompleteOutcome {
    Ignored,
    Completed,
    Retried { attempt: u32 },
    TerminallyFailed,
}

/// Owns all frontier state. The pending queue is protected by a single
/// `tokio::sync::Mutex` so FIFO ordering and re-admission-at-tail are
/// trivially correct; the SeenSet, lease table, and worker registry use
/// `DashMap` since their operations are keyed and don't need global
/// ordering.
pub struct Frontier {
    max_attempts: u32,
    lease_timeout: Duration,
    heartbeat_timeout: Duration,
    started_at: Instant,

    seen: DashMap<String, ()>,
    queue: Mutex<VecDeque<CanonicalUrl>>,
    leases: DashMap<LeaseId, Lease>,
    active_url_lease: DashMap<String, LeaseId>,
    attempts: DashMap<String, u32>,
    visited: DashMap<String, ()>,
    failed: DashMap<String, ()>,
    workers: DashMap<WorkerId, Instant>,
    task_counter: AtomicU64,
}

impl Frontier {
    pub fn new(max_attempts: u32, lease_timeout: Duration, heartbeat_timeout: Duration) -> Self {
        Self {
            max_attempts,
            lease_timeout,
            heartbeat_timeout,
            started_at: Instant::now(),
            seen: DashMap::new(),
            queue: Mutex::new(VecDeque::new()),
            leases: DashMap::new(),
            active_url_lease: DashMap::new(),
            attempts: DashMap::new(),
            visited: DashMap::new(),
            failed: DashMap::new(),
            workers: DashMap::new(),
            task_counter: AtomicU64::new(0),
        }
    }

    /// Restore from a snapshot: re-seed the SeenSet, pending queue, and
    /// failed set. Outstanding leases are intentionally discarded; workers
    /// reconnect and request fresh dispatches.
    pub fn restore(
        max_attempts: u32,
        lease_timeout: Duration,
        heartbeat_timeout: Duration,
        seen_urls: Vec<String>,
        frontier_queue: Vec<CanonicalUrl>,
        failed_urls: Vec<String>,
        task_counter: u64,
    ) -> Self {
        let seen = DashMap::new();
        for url in &seen_urls {
            seen.insert(url.clone(), ());
        }
        let failed = DashMap::new();
        for url in &failed_urls {
            failed.insert(url.clone(), ());
            seen.insert(url.clone(), ());
        }
        let mut queue = VecDeque::new();
        for url in frontier_queue {
            seen.insert(url.as_str().to_string(), ());
            queue.push_back(url);
        }

        Self {
            max_attempts,
            lease_timeout,
            heartbeat_timeout,
            started_at: Instant::now(),
            seen,
            queue: Mutex::new(queue),
            leases: DashMap::new(),
            active_url_lease: DashMap::new(),
            attempts: DashMap::new(),
            visited: DashMap::new(),
            failed,
            workers: DashMap::new(),
            task_counter: AtomicU64::new(task_counter),
        }
    }

    /// Insert `url` into the SeenSet and enqueue it if it was not already
    /// present. Returns `true` if this call admitted a new URL.
    pub async fn admit(&self, url: CanonicalUrl) -> bool {
        let key = url.as_str().to_string();
        if self.seen.insert(key, ()).is_some() {
            return false;
        }
        self.queue.lock().await.push_back(url);
        true
    }

    pub async fn submit_seed(&self, raw: &str) -> Result<bool, FrontierError> {
        let url = CanonicalUrl::parse(raw).map_err(|e| FrontierError::InvalidUrl(e.to_string()))?;
        Ok(self.admit(url).await)
    }

    pub async fn dispatch(&self, worker_id: WorkerId) -> Option<(LeaseId, CanonicalUrl)> {
        let url = self.queue.lock().await.pop_front()?;
        let lease_id = LeaseId::new();
        let key = url.as_str().to_string();
        self.workers.insert(worker_id.clone(), Instant::now());
        self.leases.insert(
            lease_id,
            Lease {
                worker_id,
                url: url.clone(),
                deadline: Instant::now() + self.lease_timeout,
                attempt: self.attempts.get(&key).map(|a| *a).unwrap_or(0),
            },
        );
        self.active_url_lease.insert(key, lease_id);
        self.task_counter.fetch_add(1, Ordering::Relaxed);
        Some((lease_id, url))
    }

    pub fn task_counter(&self) -> u64 {
        self.task_counter.load(Ordering::Relaxed)
    }

    pub async fn heartbeat(&self, worker_id: WorkerId) {
        self.workers.insert(worker_id, Instant::now());
    }

    pub async fn complete(
        &self,
        lease_id: LeaseId,
        success: bool,
        extracted_urls: Vec<CanonicalUrl>,
        _error: Option<String>,
    ) -> CompleteOutcome {
        let Some((_, lease)) = self.leases.remove(&lease_id) else {
            return CompleteOutcome::Ignored;
        };
        let key = lease.url.as_str().to_string();
        self.active_url_lease.remove(&key);

        if success {
            self.visited.insert(key, ());
            for link in extracted_urls {
                self.admit(link).await;
            }
            CompleteOutcome::Completed
        } else {
            self.retry_or_fail(key, lease.url, lease.attempt).await
        }
    }

    async fn retry_or_fail(&self, key: String, url: CanonicalUrl, attempt: u32) -> CompleteOutcome {
        let next_attempt = attempt + 1;
        if next_attempt < self.max_attempts {
            self.attempts.insert(key, next_attempt);
            self.queue.lock().await.push_back(url);
            CompleteOutcome::Retried { attempt: next_attempt }
        } else {
            self.failed.insert(key, ());
            CompleteOutcome::TerminallyFailed
        }
    }

    /// Reclaim leases whose deadline has passed or whose worker has gone
    /// silent past `heartbeat_timeout`. Called from the sweeper loop.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<LeaseId> = self
            .leases
            .iter()
            .filter(|entry| {
                let lease = entry.value();
                lease.deadline < now
                    || self
                        .workers
                        .get(&lease.worker_id)
                        .map(|seen| now.duration_since(*seen) > self.heartbeat_timeout)
                        .unwrap_or(true)
            })
            .map(|entry| *entry.key())
            .collect();

        let count = expired.len();
        for lease_id in expired {
            if let Some((_, lease)) = self.leases.remove(&lease_id) {
                let key = lease.url.as_str().to_string();
                self.active_url_lease.remove(&key);
                self.retry_or_fail(key, lease.url, lease.attempt).await;
            }
        }
        count
    }

    pub async fn status(&self) -> FrontierStats {
        let now = Instant::now();
        let workers_alive = self
            .workers
            .iter()
            .filter(|entry| now.duration_since(*entry.value()) <= self.heartbeat_timeout)
            .count();
        FrontierStats {
            queued: self.queue.lock().await.len(),
            in_flight: self.leases.len(),
            visited: self.visited.len(),
            failed: self.failed.len(),
            workers_alive,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    pub async fn snapshot_parts(&self) -> (Vec<String>, Vec<CanonicalUrl>, Vec<String>) {
        let seen_urls = self.seen.iter().map(|e| e.key().clone()).collect();
        let failed_urls = self.failed.iter().map(|e| e.key().clone()).collect();
        let queue = self.queue.lock().await.iter().cloned().collect();
        (seen_urls, queue, failed_urls)
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

#[async_trait]
impl TaskTransport for Frontier {
    async fn enqueue(&self, url: CanonicalUrl) -> bool {
        self.admit(url).await
    }

    async fn dequeue(&self, worker_id: WorkerId) -> Option<(LeaseId, CanonicalUrl)> {
        self.dispatch(worker_id).await
    }

    async fn ack(&self, lease_id: LeaseId, success: bool, extracted_urls: Vec<CanonicalUrl>, error: Option<String>) -> CompleteOutcome {
        self.complete(lease_id, success, extracted_urls, error).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontier() -> Frontier {
        Frontier::new(3, Duration::from_secs(300), Duration::from_secs(60))
    }

    fn url(s: &str) -> CanonicalUrl {
        CanonicalUrl::parse(s).unwrap()
    }

    #[tokio::test]
    async fn duplicate_admission_is_enqueued_once() {
        let f = frontier();
        assert!(f.admit(url("https://a.test/")).await);
        assert!(!f.admit(url("https://a.test/")).await);
        assert_eq!(f.status().await.queued, 1);
    }

    #[tokio::test]
    async fn dispatch_then_complete_marks_visited() {
        let f = frontier();
        f.admit(url("https://a.test/")).await;
        let (lease_id, dispatched) = f.dispatch(WorkerId::new("w1")).await.unwrap();
        assert_eq!(dispatched.as_str(), "https://a.test/");
        assert_eq!(f.status().await.in_flight, 1);

        assert!(matches!(
            f.complete(lease_id, true, vec![], None).await,
            CompleteOutcome::Completed
        ));
        let stats = f.status().await;
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.visited, 1);
    }

    #[tokio::test]
    async fn failure_retries_until_max_attempts_then_terminal() {
        let f = Frontier::new(2, Duration::from_secs(300), Duration::from_secs(60));
        f.admit(url("https://a.test/")).await;

        let (lease1, _) = f.dispatch(WorkerId::new("w1")).await.unwrap();
        assert!(matches!(
            f.complete(lease1, false, vec![], Some("boom".into())).await,
            CompleteOutcome::Retried { attempt: 1 }
        ));
        assert_eq!(f.status().await.queued, 1);

        let (lease2, _) = f.dispatch(WorkerId::new("w1")).await.unwrap();
        assert!(matches!(
            f.complete(lease2, false, vec![], Some("boom".into())).await,
            CompleteOutcome::TerminallyFailed
        ));
        let stats = f.status().await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test]
    async fn unknown_lease_completion_is_ignored() {
        let f = frontier();
        assert!(matches!(
            f.complete(LeaseId::new(), true, vec![], None).await,
            CompleteOutcome::Ignored
        ));
    }

    #[tokio::test]
    async fn task_transport_trait_object_drives_frontier() {
        let f: std::sync::Arc<dyn TaskTransport> = std::sync::Arc::new(frontier());
        assert!(f.enqueue(url("https://a.test/")).await);
        let (lease_id, dispatched) = f.dequeue(WorkerId::new("w1")).await.unwrap();
        assert_eq!(dispatched.as_str(), "https://a.test/");
        assert!(matches!(f.ack(lease_id, true, vec![], None).await, CompleteOutcome::Completed));
    }

    #[tokio::test]
    async fn expired_lease_is_swept_and_retried() {
        let f = Frontier::new(3, Duration::from_millis(1), Duration::from_secs(60));
        f.admit(url("https://a.test/")).await;
        f.dispatch(WorkerId::new("w1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let swept = f.sweep().await;
        assert_eq!(swept, 1);
        let stats = f.status().await;
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.in_flight, 0);
    }
}
