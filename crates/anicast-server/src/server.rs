//! HTTP query surface
//!
//! Catalog responses carry `X-Cache-Freshness: fresh|stale`. Endpoints that
//! return catalog data also accept `format=text` for the plain-text rendition.

use crate::catalog::{Catalog, Served};
use crate::error::ServerError;
use crate::poster::{items_for_day, PosterService};
use crate::progress::compute_progress;
use crate::text::{daily_digest, format_detail, format_schedule, format_search};
use artifact_cache::{ArtifactCache, ArtifactKey, ArtifactKind, ArtifactStats, DEFAULT_VARIANT};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use catalog_clock::Clock;
use catalog_filter::{FilterError, RuleKind};
use category_cache::{FacadeStats, Freshness};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use daily_scheduler::Scheduler;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

const FRESHNESS_HEADER: &str = "x-cache-freshness";
const DEFAULT_SEARCH_LIMIT: u32 = 10;
const MAX_SEARCH_LIMIT: u32 = 25;

/// Shared state for the HTTP server
pub struct ServerState {
    pub catalog: Arc<Catalog>,
    pub artifacts: Arc<ArtifactCache>,
    pub posters: Arc<PosterService>,
    pub scheduler: Scheduler,
    pub clock: Arc<dyn Clock>,
    pub utc_offset: FixedOffset,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(
        catalog: Arc<Catalog>,
        artifacts: Arc<ArtifactCache>,
        posters: Arc<PosterService>,
        scheduler: Scheduler,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let utc_offset = scheduler.config().utc_offset;
        let started_at = clock.now();
        Self {
            catalog,
            artifacts,
            posters,
            scheduler,
            clock,
            utc_offset,
            started_at,
        }
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.utc_offset).date_naive()
    }
}

pub type SharedState = Arc<ServerState>;

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
    renderer: bool,
    cache: FacadeStats,
    artifacts: ArtifactStats,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Format {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Default, Deserialize)]
struct FetchParams {
    #[serde(default)]
    refresh: bool,
    #[serde(default)]
    format: Format,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    limit: Option<u32>,
    #[serde(default)]
    refresh: bool,
    #[serde(default)]
    format: Format,
}

#[derive(Debug, Deserialize)]
struct VariantParams {
    variant: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RuleAction {
    Add,
    Remove,
}

#[derive(Debug, Deserialize)]
struct BlacklistMutation {
    kind: RuleKind,
    action: RuleAction,
    pattern: String,
}

#[derive(Serialize)]
struct BlacklistMutated {
    changed: bool,
    rules: catalog_filter::RuleSet,
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/schedule", get(get_schedule))
        .route("/today", get(get_today))
        .route("/search", get(search))
        .route("/subjects/{id}", get(get_subject))
        .route("/subjects/{id}/episodes", get(get_episodes))
        .route("/subjects/{id}/progress", get(get_progress))
        .route("/artifacts", get(list_artifacts))
        .route("/artifacts/{kind}/{period}", get(get_artifact))
        .route("/posters/{kind}", post(generate_poster))
        .route("/blacklist", get(get_blacklist).post(mutate_blacklist))
        .route("/jobs", get(list_jobs))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn failure(err: ServerError) -> Response {
    let status = match &err {
        ServerError::Fetch(_) | ServerError::Upstream(_) | ServerError::Render(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ServerError::Filter(FilterError::EmptyPattern | FilterError::UnknownKind(_)) => {
            StatusCode::BAD_REQUEST
        }
        ServerError::Artifact(artifact_cache::ArtifactError::InvalidKey(_)) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(status = status.as_u16(), error = %err, "Request failed");
    error_response(status, err.to_string())
}

/// JSON or text body tagged with where the data came from
fn catalog_response<T: Serialize>(
    freshness: Freshness,
    format: Format,
    value: &T,
    text: impl FnOnce() -> String,
) -> Response {
    let headers = [(FRESHNESS_HEADER, freshness.as_str())];
    match format {
        Format::Json => (headers, Json(value)).into_response(),
        Format::Text => (headers, text()).into_response(),
    }
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (state.clock.now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        renderer: state.posters.has_renderer(),
        cache: state.catalog.stats().await,
        artifacts: state.artifacts.stats().await,
    })
}

async fn get_schedule(
    State(state): State<SharedState>,
    Query(params): Query<FetchParams>,
) -> Response {
    match state.catalog.schedule(params.refresh).await {
        Ok(Served { value, freshness }) => {
            let today = state.today();
            catalog_response(freshness, params.format, &value, || {
                format_schedule(&value, today)
            })
        }
        Err(e) => failure(e),
    }
}

/// Today's titles, best rated first
async fn get_today(
    State(state): State<SharedState>,
    Query(params): Query<FetchParams>,
) -> Response {
    match state.catalog.schedule(params.refresh).await {
        Ok(Served { value, freshness }) => {
            let today = state.today();
            let mut items = items_for_day(&value, today);
            items.sort_by(|a, b| b.score().total_cmp(&a.score()));
            catalog_response(freshness, params.format, &items, || {
                daily_digest(&value, today)
            })
        }
        Err(e) => failure(e),
    }
}

async fn search(State(state): State<SharedState>, Query(params): Query<SearchParams>) -> Response {
    let keyword = params.q.trim();
    if keyword.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Missing search keyword 'q'");
    }
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    match state.catalog.search(keyword, limit, params.refresh).await {
        Ok(Served { value, freshness }) => {
            catalog_response(freshness, params.format, &value, || {
                format_search(keyword, &value)
            })
        }
        Err(e) => failure(e),
    }
}

async fn get_subject(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    Query(params): Query<FetchParams>,
) -> Response {
    match state.catalog.detail(id, params.refresh).await {
        Ok(Served { value, freshness }) => {
            catalog_response(freshness, params.format, &value, || format_detail(&value, None))
        }
        Err(e) => failure(e),
    }
}

async fn get_episodes(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    Query(params): Query<FetchParams>,
) -> Response {
    match state.catalog.episodes(id, params.refresh).await {
        Ok(Served { value, freshness }) => {
            let headers = [(FRESHNESS_HEADER, freshness.as_str())];
            (headers, Json(value)).into_response()
        }
        Err(e) => failure(e),
    }
}

async fn get_progress(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    Query(params): Query<FetchParams>,
) -> Response {
    let (subject, episodes) = tokio::join!(
        state.catalog.detail(id, params.refresh),
        state.catalog.episodes(id, params.refresh),
    );
    let (subject, episodes) = match (subject, episodes) {
        (Ok(subject), Ok(episodes)) => (subject, episodes),
        (Err(e), _) | (_, Err(e)) => return failure(e),
    };

    let freshness = match (subject.freshness, episodes.freshness) {
        (Freshness::Fresh, Freshness::Fresh) => Freshness::Fresh,
        _ => Freshness::Stale,
    };
    let progress = compute_progress(&subject.value, &episodes.value, state.today());
    catalog_response(freshness, params.format, &progress, || {
        format_detail(&subject.value, Some(&progress))
    })
}

async fn list_artifacts(State(state): State<SharedState>) -> Response {
    Json(state.artifacts.list().await).into_response()
}

/// Serve a stored poster image
async fn get_artifact(
    State(state): State<SharedState>,
    Path((kind, period)): Path<(String, String)>,
    Query(params): Query<VariantParams>,
) -> Response {
    let key = kind.parse::<ArtifactKind>().and_then(|kind| {
        ArtifactKey::new(
            kind,
            period,
            params.variant.unwrap_or_else(|| DEFAULT_VARIANT.to_string()),
        )
    });
    let key = match key {
        Ok(key) => key,
        Err(e) => return failure(e.into()),
    };

    match state.artifacts.get(&key).await {
        Some(data) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/png")
            .header(header::CACHE_CONTROL, "public, max-age=3600")
            .body(Body::from(data))
            .unwrap_or_else(|e| {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }),
        None => error_response(StatusCode::NOT_FOUND, format!("Artifact {} not found", key)),
    }
}

/// Generate a poster now instead of waiting for the scheduled job
async fn generate_poster(State(state): State<SharedState>, Path(kind): Path<String>) -> Response {
    let kind = match kind.parse::<ArtifactKind>() {
        Ok(kind) => kind,
        Err(e) => return failure(e.into()),
    };

    match state.posters.generate(kind).await {
        Ok(Some(record)) => (StatusCode::CREATED, Json(record)).into_response(),
        Ok(None) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Render unavailable: no renderer configured",
        ),
        Err(e) => failure(e),
    }
}

async fn get_blacklist(State(state): State<SharedState>) -> Json<catalog_filter::RuleSet> {
    Json(state.catalog.blacklist().snapshot())
}

async fn mutate_blacklist(
    State(state): State<SharedState>,
    Json(mutation): Json<BlacklistMutation>,
) -> Response {
    let blacklist = Arc::clone(state.catalog.blacklist());

    // Mutations rewrite blacklist.json with blocking I/O
    let result = tokio::task::spawn_blocking(move || {
        let changed = match mutation.action {
            RuleAction::Add => blacklist.add(mutation.kind, &mutation.pattern),
            RuleAction::Remove => blacklist.remove(mutation.kind, &mutation.pattern),
        }?;
        Ok::<_, FilterError>((changed, blacklist.snapshot()))
    })
    .await;

    match result {
        Ok(Ok((changed, rules))) => Json(BlacklistMutated { changed, rules }).into_response(),
        Ok(Err(e)) => failure(e.into()),
        Err(e) => {
            warn!(error = %e, "Blacklist mutation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Blacklist mutation failed")
        }
    }
}

async fn list_jobs(State(state): State<SharedState>) -> Response {
    Json(state.scheduler.snapshot()).into_response()
}
