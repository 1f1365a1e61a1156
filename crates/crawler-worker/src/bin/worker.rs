use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crawler_config::{EnvConfigLoader, WorkerConfig};
use crawler_fetch::{Fetcher, FetcherConfig, ReqwestTransport};
use crawler_oracle::{OracleConfig, RobotsOracle};
use crawler_worker::{HttpCoordinatorClient, HttpIndexPublisher, IndexPublisher, NullIndexPublisher, WorkerRuntime};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crawler-worker")]
#[command(about = "Fetch worker for the distributed crawler")]
struct Args {
    #[arg(long)]
    coordinator_url: Option<String>,

    #[arg(long)]
    indexer_url: Option<String>,

    #[arg(long)]
    worker_id: Option<String>,

    #[arg(long)]
    user_agent: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let loader = EnvConfigLoader::new();
    let mut config = WorkerConfig::from_env(&loader).context("loading worker configuration")?;
    if let Some(url) = args.coordinator_url {
        config.coordinator_base_url = url;
    }
    if let Some(url) = args.indexer_url {
        config.indexer_base_url = Some(url);
    }
    if let Some(id) = args.worker_id {
        config.worker_id = id;
    }
    if let Some(ua) = args.user_agent {
        config.user_agent = ua;
    }

    tracing::info!(
        worker_id = %config.worker_id,
        coordinator = %config.coordinator_base_url,
        indexer = ?config.indexer_base_url,
        "starting fetch worker"
    );

    let oracle = Arc::new(
        RobotsOracle::new(OracleConfig {
            user_agent: config.user_agent.clone(),
            default_delay: config.default_politeness_delay,
            fetch_timeout: config.fetch_timeout,
            ..OracleConfig::default()
        })
        .context("building robots oracle")?,
    );
    let transport = Arc::new(ReqwestTransport::new(config.user_agent.clone()).context("building HTTP transport")?);
    let fetcher = Arc::new(Fetcher::new(
        transport,
        oracle,
        FetcherConfig {
            user_agent: config.user_agent.clone(),
            timeout: config.fetch_timeout,
        },
    ));

    let coordinator = Arc::new(HttpCoordinatorClient::new(config.coordinator_base_url.clone(), Duration::from_secs(10)));
    let indexer: Arc<dyn IndexPublisher> = match &config.indexer_base_url {
        Some(url) => Arc::new(HttpIndexPublisher::new(url.clone(), Duration::from_secs(10))),
        None => Arc::new(NullIndexPublisher),
    };

    let runtime = Arc::new(WorkerRuntime {
        worker_id: config.worker_id.clone(),
        coordinator,
        indexer,
        fetcher,
        heartbeat_interval: config.heartbeat_interval,
        poll_backoff_min: config.poll_backoff_min,
        poll_backoff_max: config.poll_backoff_max,
    });

    runtime.run(shutdown_signal()).await;

    tracing::info!(worker_id = %config.worker_id, "fetch worker exiting");
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
        _ = ctrl_c => tracing::info!("received SIGINT"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
