//! Read-only HTTP API over an ingested session.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/report` | Ingestion report, errors truncated |
//! | `GET`  | `/api/months` | Year/month index with counts |
//! | `GET`  | `/api/posts` | One page of a month (`year`, `month`, `page`, `q`) |
//! | `GET`  | `/api/posts/{id}` | Full post |
//! | `GET`  | `/api/paths` | Top-level archive path segments |
//! | `GET`  | `/media/{key}` | Media bytes served from the blob store |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no post with id: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::browse::{
    format_datetime, format_month_day, format_time, month_index, page_numbers, paginate,
    post_summary, search, PageMarker, Selection, YearIndex,
};
use crate::config::{BrowseConfig, Config};
use crate::ingest::Session;
use crate::media::BlobStore;
use crate::models::Post;
use crate::report::IngestReport;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    session: Arc<Session>,
    store: Arc<BlobStore>,
    browse: Arc<BrowseConfig>,
}

impl AppState {
    /// `store` must be the resolver the session's handles were created with.
    pub fn new(session: Session, store: Arc<BlobStore>, browse: BrowseConfig) -> Self {
        Self {
            session: Arc::new(session),
            store,
            browse: Arc::new(browse),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/report", get(handle_report))
        .route("/api/months", get(handle_months))
        .route("/api/posts", get(handle_posts))
        .route("/api/posts/{id}", get(handle_post))
        .route("/api/paths", get(handle_paths))
        .route(&media_route(), get(handle_media))
        .layer(cors)
        .with_state(state)
}

/// Route serving blob-store handles; handles are `PREFIX` plus the key.
fn media_route() -> String {
    format!("{}{{key}}", BlobStore::PREFIX)
}

/// Serve `session` on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config, session: Session, store: Arc<BlobStore>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(AppState::new(session, store, config.browse.clone()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "server listening");
    println!("Serving posts on http://{}", bind_addr);
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
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
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

// ============ GET /health ============

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

// ============ GET /api/report ============

#[derive(Serialize)]
struct ReportResponse {
    report: IngestReport,
    /// Length of the untruncated error list.
    total_errors: usize,
}

async fn handle_report(State(state): State<AppState>) -> Json<ReportResponse> {
    let mut report = state.session.report.clone();
    let total_errors = report.errors.len();
    report.errors.truncate(state.browse.error_display_limit);
    Json(ReportResponse {
        report,
        total_errors,
    })
}

// ============ GET /api/months ============

#[derive(Serialize)]
struct MonthsResponse {
    years: Vec<YearIndex>,
    selection: Option<Selection>,
}

async fn handle_months(State(state): State<AppState>) -> Json<MonthsResponse> {
    let dataset = &state.session.dataset;
    Json(MonthsResponse {
        years: month_index(dataset),
        selection: Selection::newest(dataset),
    })
}

// ============ GET /api/posts ============

#[derive(Debug, Default, Deserialize)]
pub struct PostsQuery {
    year: Option<i32>,
    month: Option<u32>,
    page: Option<usize>,
    q: Option<String>,
}

#[derive(Serialize)]
struct PostRow {
    id: String,
    date: String,
    time: String,
    summary: String,
    media_count: usize,
}

#[derive(Serialize)]
struct PostsResponse {
    selection: Option<Selection>,
    page: usize,
    total_pages: usize,
    total_items: usize,
    page_numbers: Vec<PageMarker>,
    posts: Vec<PostRow>,
}

async fn handle_posts(
    State(state): State<AppState>,
    Query(query): Query<PostsQuery>,
) -> Result<Json<PostsResponse>, AppError> {
    if query.month.is_some() && query.year.is_none() {
        return Err(bad_request("month requires year"));
    }
    if let Some(month) = query.month {
        if !(1..=12).contains(&month) {
            return Err(bad_request(format!("month out of range: {}", month)));
        }
    }

    let dataset = &state.session.dataset;
    let selection = Selection::resolve(dataset, query.year, query.month);
    let month_posts = selection
        .map(|s| dataset.month(s.year, s.month))
        .unwrap_or(&[]);
    let filtered = search(month_posts, query.q.as_deref().unwrap_or(""));
    let page = paginate(&filtered, query.page.unwrap_or(1), state.browse.page_size);

    let zone = dataset.zone;
    let posts = page
        .items
        .iter()
        .map(|post| PostRow {
            id: post.id.clone(),
            date: format_month_day(zone, post.created_at),
            time: format_time(zone, post.created_at),
            summary: post_summary(post, state.browse.summary_length),
            media_count: post.media.len(),
        })
        .collect();

    Ok(Json(PostsResponse {
        selection,
        page: page.page,
        total_pages: page.total_pages,
        total_items: page.total_items,
        page_numbers: page_numbers(page.total_pages, page.page),
        posts,
    }))
}

// ============ GET /api/posts/{id} ============

#[derive(Serialize)]
struct PostDetail {
    date: String,
    post: Post,
}

async fn handle_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PostDetail>, AppError> {
    let dataset = &state.session.dataset;
    let post = dataset
        .get(&id)
        .ok_or_else(|| not_found(format!("no post with id: {}", id)))?;
    Ok(Json(PostDetail {
        date: format_datetime(dataset.zone, post.created_at),
        post: Post::clone(post),
    }))
}

// ============ GET /api/paths ============

#[derive(Serialize)]
struct PathsResponse {
    paths: Vec<String>,
}

async fn handle_paths(State(state): State<AppState>) -> Json<PathsResponse> {
    Json(PathsResponse {
        paths: state.session.top_paths.clone(),
    })
}

// ============ GET /media/{key} ============

async fn handle_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (bytes, mime) = state
        .store
        .get(&key)
        .ok_or_else(|| not_found(format!("no media with key: {}", key)))?;
    Ok(([(header::CONTENT_TYPE, mime)], bytes.to_vec()).into_response())
}
