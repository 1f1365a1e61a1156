//! The coordinator's HTTP control plane. Mirrors the RPC surface of the
//! original master node (`/assign_task`, `/submit_result`, `/heartbeat`,
//! `/status`, `/add_urls`) plus `/submit` for a single seed and `/healthz`
//! for liveness.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use crawler_types::{CanonicalUrl, LeaseId, WorkerId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::frontier::{CompleteOutcome, Frontier};
use crate::snapshot;

#[derive(Clone)]
pub struct AppState {
    pub frontier: Arc<Frontier>,
    pub ready: Arc<AtomicBool>,
    /// Set by the pending-seed drain loop; while true, newly accepted
    /// seeds are also appended to `pending_seed_log_path` for replay once
    /// the indexer answers again.
    pub indexer_unreachable: Arc<AtomicBool>,
    pub pending_seed_log_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(error = %self, "coordinator request rejected");
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub accepted: bool,
}

pub async fn submit(State(state): State<AppState>, Json(req): Json<SubmitRequest>) -> Result<Json<SubmitResponse>, ApiError> {
    let Ok(url) = CanonicalUrl::parse(&req.url) else {
        warn!(url = %req.url, "rejected malformed seed");
        return Ok(Json(SubmitResponse { accepted: false }));
    };

    if buffer_if_indexer_unreachable(&state, url.as_str()) {
        return Ok(Json(SubmitResponse { accepted: true }));
    }

    let accepted = state.frontier.admit(url).await;
    Ok(Json(SubmitResponse { accepted }))
}

/// While the indexer is unreachable, a newly accepted seed is appended to
/// the pending-seed log instead of being admitted to the frontier; the
/// drain loop admits it once the indexer answers again. Returns whether
/// the URL was buffered this way (the caller must not also admit it).
fn buffer_if_indexer_unreachable(state: &AppState, url: &str) -> bool {
    if !state.indexer_unreachable.load(std::sync::atomic::Ordering::Relaxed) {
        return false;
    }
    let Some(path) = &state.pending_seed_log_path else {
        return false;
    };
    if let Err(e) = snapshot::append_pending_seed(path, url) {
        warn!(url, error = %e, "failed to append pending-seed log entry");
    }
    true
}

#[derive(Debug, Deserialize)]
pub struct AssignTaskRequest {
    pub worker_id: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AssignTaskResponse {
    Task { lease_id: LeaseId, url: String },
    NoTask { status: &'static str },
}

pub async fn assign_task(State(state): State<AppState>, Json(req): Json<AssignTaskRequest>) -> Json<AssignTaskResponse> {
    let worker_id = WorkerId::new(req.worker_id);
    match state.frontier.dispatch(worker_id).await {
        Some((lease_id, url)) => Json(AssignTaskResponse::Task {
            lease_id,
            url: url.into_inner(),
        }),
        None => Json(AssignTaskResponse::NoTask { status: "no-task" }),
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitResultRequest {
    pub lease_id: LeaseId,
    pub success: bool,
    #[serde(default)]
    pub extracted_urls: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub async fn submit_result(State(state): State<AppState>, Json(req): Json<SubmitResultRequest>) -> Json<OkResponse> {
    let extracted: Vec<CanonicalUrl> = req
        .extracted_urls
        .iter()
        .filter_map(|raw| CanonicalUrl::parse(raw).ok())
        .collect();

    let outcome = state.frontier.complete(req.lease_id, req.success, extracted, req.error).await;
    match outcome {
        CompleteOutcome::Ignored => warn!(lease_id = %req.lease_id, "submit_result for unknown lease, ignoring"),
        CompleteOutcome::Completed => info!(lease_id = %req.lease_id, "crawl completed"),
        CompleteOutcome::Retried { attempt } => info!(lease_id = %req.lease_id, attempt, "crawl failed, retrying"),
        CompleteOutcome::TerminallyFailed => warn!(lease_id = %req.lease_id, "crawl permanently failed"),
    }
    Json(OkResponse { ok: true })
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub worker_id: String,
}

pub async fn heartbeat(State(state): State<AppState>, Json(req): Json<HeartbeatRequest>) -> Json<OkResponse> {
    state.frontier.heartbeat(WorkerId::new(req.worker_id)).await;
    Json(OkResponse { ok: true })
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub queued: usize,
    pub in_flight: usize,
    pub visited: usize,
    pub failed: usize,
    pub workers_alive: usize,
    pub uptime: u64,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let stats = state.frontier.status().await;
    Json(StatusResponse {
        queued: stats.queued,
        in_flight: stats.in_flight,
        visited: stats.visited,
        failed: stats.failed,
        workers_alive: stats.workers_alive,
        uptime: stats.uptime_secs,
    })
}

#[derive(Debug, Deserialize)]
pub struct AddUrlsRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AddUrlsResponse {
    pub added: usize,
}

pub async fn add_urls(State(state): State<AppState>, Json(req): Json<AddUrlsRequest>) -> Json<AddUrlsResponse> {
    let mut added = 0;
    for raw in req.urls {
        let Ok(url) = CanonicalUrl::parse(&raw) else {
            continue;
        };
        if buffer_if_indexer_unreachable(&state, url.as_str()) {
            added += 1;
            continue;
        }
        if state.frontier.admit(url).await {
            added += 1;
        }
    }
    Json(AddUrlsResponse { added })
}

pub async fn healthz(State(state): State<AppState>) -> Response {
    if state.ready.load(std::sync::atomic::Ordering::Relaxed) {
        (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "loading" }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/submit", axum::routing::post(submit))
        .route("/assign_task", axum::routing::post(assign_task))
        .route("/submit_result", axum::routing::post(submit_result))
        .route("/heartbeat", axum::routing::post(heartbeat))
        .route("/status", axum::routing::get(status))
        .route("/add_urls", axum::routing::post(add_urls))
        .route("/healthz", axum::routing::get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
