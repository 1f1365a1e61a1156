use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use crawler_config::{EnvConfigLoader, IndexConfig};
use crawler_index::http::{router, AppState};
use crawler_index::{load_index, save_index, Index, IndexRuntimeConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Inverted index and BM25F search service")]
struct Args {
    #[arg(long)]
    bind_addr: Option<String>,

    #[arg(long)]
    data_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let loader = EnvConfigLoader::new();
    let mut config = IndexConfig::from_env(&loader).context("loading indexer configuration")?;
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr.parse().context("parsing --bind-addr")?;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir.into();
    }

    tracing::info!(bind_addr = %config.bind_addr, data_dir = ?config.data_dir, "starting indexer");

    std::fs::create_dir_all(&config.data_dir).context("creating index data directory")?;
    let snapshot_path = config.data_dir.join("index.json");

    let runtime_config = IndexRuntimeConfig::from(&config);
    let index = match load_index(&snapshot_path).context("loading index snapshot")? {
        Some((state, next_doc_id)) => {
            tracing::info!(documents = state.document_count(), "restored index from snapshot");
            Arc::new(Index::restore(runtime_config, state, next_doc_id))
        }
        None => Arc::new(Index::new(runtime_config)),
    };

    let app = router(AppState {
        index: index.clone(),
        started_at: Instant::now(),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding indexer listener on {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("indexer server failed")?;

    let state = index.snapshot_state();
    save_index(&snapshot_path, &state, index.next_doc_id()).context("persisting index snapshot on shutdown")?;
    tracing::info!("index snapshot persisted, exiting");

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
