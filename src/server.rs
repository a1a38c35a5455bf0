//! JSON HTTP API over the query pipeline.
//!
//! The corpus snapshot is built eagerly at startup and held behind
//! `RwLock<Arc<CorpusIndex>>`: queries clone the `Arc` under a read lock,
//! and a rebuild constructs the entire replacement index before swapping
//! it in under a write lock, so in-flight requests always see a complete
//! index.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Health check (returns version) |
//! | `POST` | `/api/query` | Answer a query (JSON body or raw text) |
//! | `GET`  | `/api/query` | Answer a query via `?q=` |
//! | `POST` | `/api/trace` | Ranking trace for a query |
//! | `GET`  | `/api/eval` | Run the evaluation harness |
//! | `POST` | `/api/rebuild` | Reload the dataset and swap the snapshot |
//! | `GET`  | `/api/db/stats` | Corpus counts |
//! | `GET`  | `/api/db/list` | Chunk previews, filterable |
//! | `GET`  | `/api/db/show` | Full chunk by id |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `eval_failed` (500),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::dataset::load_all;
use crate::eval::{evaluate, safe_load_test_queries, EvalReport};
use crate::index::CorpusIndex;
use crate::inspect;
use crate::pipeline::{answer_query, trace_query, QueryResponse, Trace};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    index: Arc<RwLock<Arc<CorpusIndex>>>,
}

/// Builds the snapshot, binds to `[server].bind`, and serves until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let documents = load_all(&config.dataset.dir)?;
    let index = CorpusIndex::build(&config, documents).await?;
    println!(
        "Indexed {} documents into {} chunks",
        index.documents().len(),
        index.chunks().len()
    );

    let state = AppState {
        config,
        index: Arc::new(RwLock::new(Arc::new(index))),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/query", post(handle_query_post).get(handle_query_get))
        .route("/api/trace", post(handle_trace))
        .route("/api/eval", get(handle_eval))
        .route("/api/rebuild", post(handle_rebuild))
        .route("/api/db/stats", get(handle_db_stats))
        .route("/api/db/list", get(handle_db_list))
        .route("/api/db/show", get(handle_db_show))
        .layer(cors)
        .with_state(state);

    println!("API server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn eval_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "eval_failed".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ Snapshot access ============

async fn snapshot(state: &AppState) -> Arc<CorpusIndex> {
    state.index.read().await.clone()
}

/// Reload the dataset, build a complete replacement index, and swap it in.
async fn rebuild_snapshot(state: &AppState) -> anyhow::Result<Arc<CorpusIndex>> {
    let documents = load_all(&state.config.dataset.dir)?;
    let fresh = Arc::new(CorpusIndex::build(&state.config, documents).await?);
    *state.index.write().await = fresh.clone();
    Ok(fresh)
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/query ============

#[derive(Deserialize)]
struct QueryBody {
    #[serde(default)]
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    rebuild_index: bool,
}

/// Accepts either the JSON body `{query, top_k?, rebuild_index?}` or a raw
/// text body treated as the query itself.
async fn handle_query_post(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<QueryResponse>, AppError> {
    let parsed: QueryBody = match serde_json::from_str(&body) {
        Ok(b) => b,
        Err(_) => QueryBody {
            query: body.trim().to_string(),
            top_k: None,
            rebuild_index: false,
        },
    };

    if parsed.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let index = if parsed.rebuild_index {
        rebuild_snapshot(&state)
            .await
            .map_err(|e| internal(format!("rebuild failed: {:#}", e)))?
    } else {
        snapshot(&state).await
    };

    let top_k = parsed.top_k.unwrap_or(state.config.retrieval.top_k);
    Ok(Json(answer_query(&index, parsed.query.trim(), top_k).await))
}

// ============ GET /api/query ============

#[derive(Deserialize)]
struct QueryParams {
    #[serde(default)]
    q: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    rebuild_index: Option<String>,
}

async fn handle_query_get(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryResponse>, AppError> {
    if params.q.trim().is_empty() {
        return Err(bad_request("q parameter must not be empty"));
    }

    let index = if flag(&params.rebuild_index) {
        rebuild_snapshot(&state)
            .await
            .map_err(|e| internal(format!("rebuild failed: {:#}", e)))?
    } else {
        snapshot(&state).await
    };

    let top_k = params
        .top_k
        .unwrap_or(state.config.retrieval.top_k)
        .clamp(1, 20);
    Ok(Json(answer_query(&index, params.q.trim(), top_k).await))
}

/// Query-string flags: present and not an explicit negative.
fn flag(value: &Option<String>) -> bool {
    match value.as_deref() {
        None => false,
        Some(v) => !matches!(v, "" | "0" | "false" | "no"),
    }
}

// ============ POST /api/trace ============

async fn handle_trace(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Trace>, AppError> {
    let parsed: QueryBody = match serde_json::from_str(&body) {
        Ok(b) => b,
        Err(_) => QueryBody {
            query: body.trim().to_string(),
            top_k: None,
            rebuild_index: false,
        },
    };

    if parsed.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let index = snapshot(&state).await;
    let top_k = parsed.top_k.unwrap_or(state.config.retrieval.top_k);
    Ok(Json(trace_query(&index, parsed.query.trim(), top_k).await))
}

// ============ GET /api/eval ============

#[derive(Deserialize)]
struct EvalParams {
    #[serde(default)]
    rebuild_index: Option<String>,
}

async fn handle_eval(
    State(state): State<AppState>,
    Query(params): Query<EvalParams>,
) -> Result<Json<EvalReport>, AppError> {
    let index = if flag(&params.rebuild_index) {
        rebuild_snapshot(&state)
            .await
            .map_err(|e| eval_failed(format!("rebuild failed: {:#}", e)))?
    } else {
        snapshot(&state).await
    };

    let queries = safe_load_test_queries(&state.config.dataset.dir.join("test_queries.json"));
    Ok(Json(evaluate(&index, &queries).await))
}

// ============ POST /api/rebuild ============

#[derive(Serialize)]
struct RebuildResponse {
    status: String,
    chunks: usize,
}

async fn handle_rebuild(State(state): State<AppState>) -> Result<Json<RebuildResponse>, AppError> {
    let fresh = rebuild_snapshot(&state)
        .await
        .map_err(|e| internal(format!("rebuild failed: {:#}", e)))?;
    Ok(Json(RebuildResponse {
        status: "ok".to_string(),
        chunks: fresh.chunks().len(),
    }))
}

// ============ GET /api/db/* ============

async fn handle_db_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let index = snapshot(&state).await;
    Json(inspect::stats(&index))
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default, rename = "where")]
    where_filter: Option<String>,
}

async fn handle_db_list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let filter = match &params.where_filter {
        Some(raw) => Some(
            serde_json::from_str::<serde_json::Value>(raw)
                .map_err(|e| bad_request(format!("invalid where filter: {}", e)))?,
        ),
        None => None,
    };

    let index = snapshot(&state).await;
    let entries = inspect::list(&index, params.limit.unwrap_or(20), filter.as_ref())
        .map_err(|e| bad_request(e.to_string()))?;
    Ok(Json(serde_json::json!({ "chunks": entries })))
}

#[derive(Deserialize)]
struct ShowParams {
    id: String,
}

async fn handle_db_show(
    State(state): State<AppState>,
    Query(params): Query<ShowParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let index = snapshot(&state).await;
    inspect::show(&index, &params.id)
        .map(Json)
        .ok_or_else(|| not_found(format!("no chunk with id: {}", params.id)))
}
