//! HTTP control surface for the indexer: ingest documents, run searches,
//! and expose basic operational status. Mirrors the coordinator's handler
//! shape: thin extractors, typed errors mapped to JSON at the edge.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query as QueryExtractor, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::document::Document;
use crate::index::{Index, IndexError};

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<Index>,
    pub started_at: Instant,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Index(IndexError::Query(_)) => StatusCode::BAD_REQUEST,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            warn!(error = %self, "indexer request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub url: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub success: bool,
}

pub async fn index_document(
    State(state): State<AppState>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, ApiError> {
    if req.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url must not be empty".to_string()));
    }
    let host = url::Url::parse(&req.url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    state.index.upsert(Document {
        url: req.url.clone(),
        title: req.title,
        body: req.content,
        host,
        crawl_timestamp: chrono::Utc::now(),
    });

    info!(url = %req.url, "document indexed");
    Ok(Json(IndexResponse { success: true }))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub max: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResultItem {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
    pub host: String,
    pub crawl_date: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
}

pub async fn search(
    State(state): State<AppState>,
    QueryExtractor(params): QueryExtractor<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let hits = state.index.search(&params.q, params.max)?;
    let results = hits
        .into_iter()
        .map(|h| SearchResultItem {
            url: h.url,
            title: h.title,
            snippet: h.snippet,
            score: h.score,
            host: h.host,
            crawl_date: h.crawl_timestamp,
        })
        .collect();
    Ok(Json(SearchResponse { results }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub pages_indexed: usize,
    pub index_size_bytes: u64,
    pub searches_performed: u64,
    pub document_count: usize,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let stats = state.index.stats();
    Json(StatusResponse {
        pages_indexed: stats.documents_indexed,
        index_size_bytes: stats.bytes_on_disk,
        searches_performed: stats.searches_performed,
        document_count: stats.documents_indexed,
    })
}

pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/index", axum::routing::post(index_document))
        .route("/search", axum::routing::get(search))
        .route("/status", axum::routing::get(status))
        .route("/healthz", axum::routing::get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexRuntimeConfig;
    use crate::scoring::Bm25Params;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            index: Arc::new(Index::new(IndexRuntimeConfig {
                title_weight: 2.0,
                body_weight: 1.0,
                default_k: 10,
                snippet_max_fragments: 2,
                snippet_fallback_chars: 200,
                bm25: Bm25Params::default(),
            })),
            started_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn index_then_search_round_trips_through_http() {
        let app = router(test_state());

        let index_req = Request::builder()
            .method("POST")
            .uri("/index")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({
                    "url": "https://example.com/a",
                    "title": "Rust Crawler",
                    "content": "a fast web crawler written in rust"
                }))
                .unwrap(),
            ))
            .unwrap();
        let resp = app.clone().oneshot(index_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let search_req = Request::builder()
            .uri("/search?q=crawler&max=5")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(search_req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_query_returns_bad_request() {
        let app = router(test_state());
        let req = Request::builder()
            .uri("/search?q=%20%20")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
