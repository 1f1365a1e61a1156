//! Typed configuration records for each binary in the workspace, plus a
//! small env-var loader. Configuration is always built explicitly and
//! passed into constructors; nothing here is a hidden global singleton,
//! so tests can build as many independently-configured components as they
//! like in one process.

mod env;

pub use env::{EnvConfigLoader, EnvError};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the coordinator (frontier) process.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub bind_addr: SocketAddr,
    pub lease_timeout: Duration,
    pub heartbeat_timeout: Duration,
    pub sweep_interval: Duration,
    pub max_attempts: u32,
    pub snapshot_interval: Duration,
    pub snapshot_path: PathBuf,
    pub pending_seed_log_path: PathBuf,
    pub pending_seed_retry_interval: Duration,
    pub indexer_base_url: Option<String>,
    pub shutdown_grace: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".parse().unwrap(),
            lease_timeout: Duration::from_secs(5 * 60),
            heartbeat_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
            max_attempts: 3,
            snapshot_interval: Duration::from_secs(30),
            snapshot_path: PathBuf::from("coordinator_snapshot.json"),
            pending_seed_log_path: PathBuf::from("pending_seeds.log"),
            pending_seed_retry_interval: Duration::from_secs(60),
            indexer_base_url: None,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_env(loader: &EnvConfigLoader) -> Result<Self, EnvError> {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: loader
                .get_optional("BIND_ADDR")
                .map(|s| s.parse())
                .transpose()
                .map_err(|_| EnvError::InvalidValue {
                    var: "BIND_ADDR".into(),
                    reason: "not a socket address".into(),
                })?
                .unwrap_or(defaults.bind_addr),
            lease_timeout: loader
                .get_duration("LEASE_TIMEOUT")
                .unwrap_or(defaults.lease_timeout),
            heartbeat_timeout: loader
                .get_duration("HEARTBEAT_TIMEOUT")
                .unwrap_or(defaults.heartbeat_timeout),
            sweep_interval: loader
                .get_duration("SWEEP_INTERVAL")
                .unwrap_or(defaults.sweep_interval),
            max_attempts: loader
                .get_uint("MAX_ATTEMPTS")
                .map(|v| v as u32)
                .unwrap_or(defaults.max_attempts),
            snapshot_interval: loader
                .get_duration("SNAPSHOT_INTERVAL")
                .unwrap_or(defaults.snapshot_interval),
            snapshot_path: loader
                .get_optional("SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_path),
            pending_seed_log_path: loader
                .get_optional("PENDING_SEED_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.pending_seed_log_path),
            pending_seed_retry_interval: loader
                .get_duration("PENDING_SEED_RETRY_INTERVAL")
                .unwrap_or(defaults.pending_seed_retry_interval),
            indexer_base_url: loader.get_optional("INDEXER_BASE_URL"),
            shutdown_grace: loader
                .get_duration("SHUTDOWN_GRACE")
                .unwrap_or(defaults.shutdown_grace),
        })
    }
}

/// Configuration for a fetch worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub coordinator_base_url: String,
    pub indexer_base_url: Option<String>,
    pub worker_id: String,
    pub user_agent: String,
    pub heartbeat_interval: Duration,
    pub poll_backoff_min: Duration,
    pub poll_backoff_max: Duration,
    pub fetch_timeout: Duration,
    pub default_politeness_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            coordinator_base_url: "http://127.0.0.1:5000".to_string(),
            indexer_base_url: Some("http://127.0.0.1:5002".to_string()),
            worker_id: format!("worker-{}", uuid::Uuid::new_v4()),
            user_agent: "CrawlerBot/1.0".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            poll_backoff_min: Duration::from_millis(500),
            poll_backoff_max: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
            default_politeness_delay: Duration::from_secs(1),
        }
    }
}

impl WorkerConfig {
    pub fn from_env(loader: &EnvConfigLoader) -> Result<Self, EnvError> {
        let defaults = Self::default();
        Ok(Self {
            coordinator_base_url: loader
                .get_optional("COORDINATOR_URL")
                .unwrap_or(defaults.coordinator_base_url),
            indexer_base_url: loader
                .get_optional("INDEXER_URL")
                .or(defaults.indexer_base_url),
            worker_id: loader.get_optional("WORKER_ID").unwrap_or(defaults.worker_id),
            user_agent: loader.get_optional("USER_AGENT").unwrap_or(defaults.user_agent),
            heartbeat_interval: loader
                .get_duration("HEARTBEAT_INTERVAL")
                .unwrap_or(defaults.heartbeat_interval),
            poll_backoff_min: loader
                .get_duration("POLL_BACKOFF_MIN")
                .unwrap_or(defaults.poll_backoff_min),
            poll_backoff_max: loader
                .get_duration("POLL_BACKOFF_MAX")
                .unwrap_or(defaults.poll_backoff_max),
            fetch_timeout: loader
                .get_duration("FETCH_TIMEOUT")
                .unwrap_or(defaults.fetch_timeout),
            default_politeness_delay: loader
                .get_duration("DEFAULT_POLITENESS_DELAY")
                .unwrap_or(defaults.default_politeness_delay),
        })
    }
}

/// Configuration for the index/query-engine process.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub default_k: usize,
    pub title_weight: f64,
    pub body_weight: f64,
    pub snippet_max_fragments: usize,
    pub snippet_fallback_chars: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5002".parse().unwrap(),
            data_dir: PathBuf::from("index_data"),
            default_k: 10,
            title_weight: 2.0,
            body_weight: 1.0,
            snippet_max_fragments: 2,
            snippet_fallback_chars: 200,
        }
    }
}

impl IndexConfig {
    pub fn from_env(loader: &EnvConfigLoader) -> Result<Self, EnvError> {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: loader
                .get_optional("BIND_ADDR")
                .map(|s| s.parse())
                .transpose()
                .map_err(|_| EnvError::InvalidValue {
                    var: "BIND_ADDR".into(),
                    reason: "not a socket address".into(),
                })?
                .unwrap_or(defaults.bind_addr),
            data_dir: loader
                .get_optional("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            default_k: loader
                .get_uint("DEFAULT_K")
                .map(|v| v as usize)
                .unwrap_or(defaults.default_k),
            title_weight: loader.get_float("TITLE_WEIGHT").unwrap_or(defaults.title_weight),
            body_weight: loader.get_float("BODY_WEIGHT").unwrap_or(defaults.body_weight),
            snippet_max_fragments: defaults.snippet_max_fragments,
            snippet_fallback_chars: defaults.snippet_fallback_chars,
        })
    }
}
