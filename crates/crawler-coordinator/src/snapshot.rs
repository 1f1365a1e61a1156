//! Coordinator state persistence: a versioned snapshot of the SeenSet,
//! pending queue, and terminal-failure set, plus a plain one-URL-per-line
//! pending-seed log for URLs accepted while the indexer is unreachable.
//! On restart the coordinator reconstructs its state from the snapshot and
//! discards all outstanding leases; workers reconnect and request fresh
//! dispatches.

use std::path::Path;

use crawler_types::CanonicalUrl;
use serde::{Deserialize, Serialize};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct CoordinatorSnapshot {
    pub schema_version: u32,
    pub seen_urls: Vec<String>,
    pub frontier_queue: Vec<String>,
    pub failed_urls: Vec<String>,
    pub task_counter: u64,
}

impl CoordinatorSnapshot {
    pub fn new(seen_urls: Vec<String>, frontier_queue: Vec<CanonicalUrl>, failed_urls: Vec<String>, task_counter: u64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            seen_urls,
            frontier_queue: frontier_queue.into_iter().map(|u| u.into_inner()).collect(),
            failed_urls,
            task_counter,
        }
    }

    pub fn frontier_queue_urls(&self) -> Vec<CanonicalUrl> {
        self.frontier_queue
            .iter()
            .filter_map(|raw| CanonicalUrl::parse(raw).ok())
            .collect()
    }
}

pub fn save(path: &Path, snapshot: &CoordinatorSnapshot) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn load(path: &Path) -> std::io::Result<Option<CoordinatorSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Append one URL per line to the pending-seed log, used when a seed is
/// accepted but hand-off to the indexer could not be confirmed.
pub fn append_pending_seed(path: &Path, url: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{url}")
}

pub fn read_pending_seeds(path: &Path) -> std::io::Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
}

pub fn clear_pending_seeds(path: &Path) -> std::io::Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
