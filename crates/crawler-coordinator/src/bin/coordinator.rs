use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crawler_config::{CoordinatorConfig, EnvConfigLoader};
use crawler_coordinator::http::{router, AppState};
use crawler_coordinator::snapshot::{self, CoordinatorSnapshot};
use crawler_coordinator::Frontier;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coordinator")]
#[command(about = "Frontier and lease coordinator for the distributed crawler")]
struct Args {
    #[arg(long)]
    bind_addr: Option<String>,

    #[arg(long)]
    seed_urls: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let loader = EnvConfigLoader::new();
    let mut config = CoordinatorConfig::from_env(&loader).context("loading coordinator configuration")?;
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr.parse().context("parsing --bind-addr")?;
    }

    tracing::info!(bind_addr = %config.bind_addr, "starting coordinator");

    let frontier = match snapshot::load(&config.snapshot_path).context("loading coordinator snapshot")? {
        Some(snap) => {
            tracing::info!(
                seen = snap.seen_urls.len(),
                queued = snap.frontier_queue.len(),
                failed = snap.failed_urls.len(),
                "restored coordinator state from snapshot"
            );
            Arc::new(Frontier::restore(
                config.max_attempts,
                config.lease_timeout,
                config.heartbeat_timeout,
                snap.seen_urls,
                snap.frontier_queue_urls(),
                snap.failed_urls,
                snap.task_counter,
            ))
        }
        None => Arc::new(Frontier::new(config.max_attempts, config.lease_timeout, config.heartbeat_timeout)),
    };

    for seed in &args.seed_urls {
        if let Err(e) = frontier.submit_seed(seed).await {
            tracing::warn!(url = %seed, error = %e, "rejected seed URL from command line");
        }
    }

    let ready = Arc::new(AtomicBool::new(true));
    let indexer_unreachable = Arc::new(AtomicBool::new(false));

    spawn_sweeper(frontier.clone(), config.sweep_interval);
    spawn_snapshotter(frontier.clone(), config.snapshot_path.clone(), config.snapshot_interval);
    if let Some(indexer_base_url) = config.indexer_base_url.clone() {
        spawn_pending_seed_drain(
            indexer_base_url,
            config.pending_seed_log_path.clone(),
            config.pending_seed_retry_interval,
            indexer_unreachable.clone(),
            frontier.clone(),
        );
    }

    let app = router(AppState {
        frontier: frontier.clone(),
        ready,
        indexer_unreachable,
        pending_seed_log_path: config.indexer_base_url.as_ref().map(|_| config.pending_seed_log_path.clone()),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding coordinator listener on {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("coordinator server failed")?;

    persist_snapshot(&frontier, &config.snapshot_path).await.context("persisting final snapshot")?;
    tracing::info!("coordinator snapshot persisted, exiting");

    Ok(())
}

/// Waits for SIGINT or, on unix, SIGTERM, whichever arrives first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl_c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, draining in-flight leases"),
        _ = terminate => tracing::info!("received SIGTERM, draining in-flight leases"),
    }
}

fn spawn_sweeper(frontier: Arc<Frontier>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let reclaimed = frontier.sweep().await;
            if reclaimed > 0 {
                tracing::info!(reclaimed, "swept expired leases");
            }
        }
    });
}

fn spawn_snapshotter(frontier: Arc<Frontier>, path: std::path::PathBuf, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = persist_snapshot(&frontier, &path).await {
                tracing::error!(error = %e, "periodic snapshot failed");
            }
        }
    });
}

async fn persist_snapshot(frontier: &Frontier, path: &std::path::Path) -> Result<()> {
    let (seen_urls, frontier_queue, failed_urls) = frontier.snapshot_parts().await;
    let snap = CoordinatorSnapshot::new(seen_urls, frontier_queue, failed_urls, frontier.task_counter());
    snapshot::save(path, &snap)?;
    Ok(())
}

fn spawn_pending_seed_drain(
    indexer_base_url: String,
    path: std::path::PathBuf,
    interval: Duration,
    indexer_unreachable: Arc<AtomicBool>,
    frontier: Arc<Frontier>,
) {
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let healthz_url = format!("{}/healthz", indexer_base_url.trim_end_matches('/'));
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let reachable = matches!(
                client.get(&healthz_url).timeout(Duration::from_secs(5)).send().await,
                Ok(resp) if resp.status().is_success()
            );
            indexer_unreachable.store(!reachable, Ordering::Relaxed);
            if !reachable {
                tracing::debug!("indexer still unreachable, pending-seed log retained");
                continue;
            }

            match snapshot::read_pending_seeds(&path) {
                Ok(seeds) if !seeds.is_empty() => {
                    tracing::info!(count = seeds.len(), "indexer reachable again, admitting buffered seeds");
                    for url in &seeds {
                        if let Err(e) = frontier.submit_seed(url).await {
                            tracing::warn!(url, error = %e, "dropping invalid buffered seed");
                        }
                    }
                    if let Err(e) = snapshot::clear_pending_seeds(&path) {
                        tracing::error!(error = %e, "failed to clear pending-seed log");
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "reading pending-seed log failed"),
            }
        }
    });
}
