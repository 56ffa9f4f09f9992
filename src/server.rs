//! HTTP API.
//!
//! Thin JSON routes over [`ResolverContext`]. Authentication is left to the
//! deployment (reverse proxy, private network).
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/resolve` | Resolve mentions in `{text}` |
//! | `POST` | `/api/resolve/team` | Team summary over `{reports: [{user_name, text}]}` |
//! | `POST` | `/api/parse` | Parse `{this_week, next_week}` into work items |
//! | `GET`  | `/api/projects` | Active projects |
//! | `POST` | `/api/suggest/project` | Suggest a project for review |
//! | `POST` | `/api/suggest/sub-item` | Suggest a sub-item for review |
//! | `*`    | `/api/admin/...` | Review workflow and registry administration |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "conflict", "message": "alias 'PG' already belongs to project 'Payment Gateway'" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser front-end
//! can be served from another origin.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use project_resolver_core::registry::{ProjectUpdate, SubItemUpdate};
use project_resolver_core::{Project, RegistryError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::context::ResolverContext;

type Ctx = State<Arc<ResolverContext>>;
type ApiResult<T> = Result<Json<T>, AppError>;

/// Serve the API on `server.bind` until the process is terminated.
pub async fn run_server(ctx: Arc<ResolverContext>) -> anyhow::Result<()> {
    let bind_addr = ctx.config().server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("listening on http://{}", bind_addr);
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

/// Build the router over a shared context.
pub fn router(ctx: Arc<ResolverContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = Router::new()
        .route("/pending", get(list_pending))
        .route("/pending/{name}/approve", post(approve))
        .route("/pending/{name}/merge", post(merge))
        .route("/pending/{name}/reject", post(reject))
        .route("/pending/{parent}/sub-items/{name}/approve", post(approve_sub_item))
        .route("/pending/{parent}/sub-items/{name}/reject", post(reject_sub_item))
        .route("/rejected", get(list_rejected))
        .route("/rejected/{name}", delete(unreject))
        .route("/projects", get(list_all_projects).post(create_project))
        .route(
            "/projects/{name}",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/{name}/rename", post(rename_project))
        .route("/projects/{name}/aliases", post(add_alias))
        .route("/projects/{name}/sub-items", post(add_sub_item))
        .route(
            "/projects/{name}/sub-items/{sub_item}",
            axum::routing::patch(update_sub_item).delete(remove_sub_item),
        )
        .route("/categories", get(list_categories).post(add_category))
        .route("/categories/{name}", delete(remove_category))
        .route("/embeddings/rebuild", post(rebuild_embeddings));

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/resolve", post(resolve))
        .route("/api/resolve/team", post(resolve_team))
        .route("/api/parse", post(parse))
        .route("/api/projects", get(list_active_projects))
        .route("/api/suggest/project", post(suggest_project))
        .route("/api/suggest/sub-item", post(suggest_sub_item))
        .nest("/api/admin", admin)
        .layer(cors)
        .with_state(ctx)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"not_found"`, `"conflict"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Registry integrity errors map to 404/409/400; anything else is a 500.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<RegistryError>() {
            Some(RegistryError::EmptyName) => bad_request(err.to_string()),
            Some(e) if e.is_not_found() => AppError {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: e.to_string(),
            },
            Some(e) => AppError {
                status: StatusCode::CONFLICT,
                code: "conflict",
                message: e.to_string(),
            },
            None => {
                error!("request failed: {err:#}");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message: format!("{err:#}"),
                }
            }
        }
    }
}

#[derive(Serialize)]
struct Ack {
    ok: bool,
}

fn ack() -> Json<Ack> {
    Json(Ack { ok: true })
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

// ============ Collaborator routes ============

#[derive(Deserialize)]
struct ResolveRequest {
    text: String,
}

async fn resolve(
    State(ctx): Ctx,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<project_resolver_core::Resolution> {
    if req.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }
    Ok(Json(ctx.resolve_mentions(&req.text).await?))
}

#[derive(Deserialize)]
struct TeamReport {
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct TeamRequest {
    reports: Vec<TeamReport>,
}

async fn resolve_team(
    State(ctx): Ctx,
    Json(req): Json<TeamRequest>,
) -> ApiResult<project_resolver_core::TeamSummary> {
    let reports: Vec<(String, String)> = req
        .reports
        .into_iter()
        .map(|r| (r.user_name, r.text))
        .collect();
    Ok(Json(ctx.resolve_team_reports(&reports).await?))
}

#[derive(Deserialize)]
struct ParseRequest {
    this_week: Option<String>,
    next_week: Option<String>,
}

async fn parse(
    State(ctx): Ctx,
    Json(req): Json<ParseRequest>,
) -> ApiResult<project_resolver_core::ParsedReport> {
    let parsed = ctx
        .parse_report(req.this_week.as_deref(), req.next_week.as_deref())
        .await?;
    Ok(Json(parsed))
}

async fn list_active_projects(State(ctx): Ctx) -> ApiResult<Vec<Project>> {
    Ok(Json(ctx.projects(false).await?))
}

#[derive(Deserialize)]
struct SuggestProjectRequest {
    name: String,
    suggested_by: Option<String>,
}

async fn suggest_project(
    State(ctx): Ctx,
    Json(req): Json<SuggestProjectRequest>,
) -> ApiResult<Ack> {
    ctx.suggest_project(&req.name, req.suggested_by.as_deref())
        .await?;
    Ok(ack())
}

#[derive(Deserialize)]
struct SuggestSubItemRequest {
    parent: String,
    name: String,
    suggested_by: Option<String>,
}

async fn suggest_sub_item(
    State(ctx): Ctx,
    Json(req): Json<SuggestSubItemRequest>,
) -> ApiResult<Ack> {
    ctx.suggest_sub_item(&req.parent, &req.name, req.suggested_by.as_deref())
        .await?;
    Ok(ack())
}

// ============ Review workflow ============

async fn list_pending(State(ctx): Ctx) -> ApiResult<Vec<project_resolver_core::PendingMention>> {
    Ok(Json(ctx.pending().await?))
}

#[derive(Deserialize)]
struct ApproveQuery {
    category: Option<String>,
}

async fn approve(
    State(ctx): Ctx,
    Path(name): Path<String>,
    Query(q): Query<ApproveQuery>,
) -> ApiResult<Ack> {
    ctx.approve(&name, q.category.as_deref()).await?;
    Ok(ack())
}

#[derive(Deserialize)]
struct MergeRequest {
    target: String,
}

async fn merge(
    State(ctx): Ctx,
    Path(name): Path<String>,
    Json(req): Json<MergeRequest>,
) -> ApiResult<Ack> {
    ctx.merge(&name, &req.target).await?;
    Ok(ack())
}

async fn reject(State(ctx): Ctx, Path(name): Path<String>) -> ApiResult<Ack> {
    ctx.reject(&name).await?;
    Ok(ack())
}

async fn approve_sub_item(
    State(ctx): Ctx,
    Path((parent, name)): Path<(String, String)>,
) -> ApiResult<Ack> {
    ctx.approve_sub_item(&parent, &name).await?;
    Ok(ack())
}

async fn reject_sub_item(
    State(ctx): Ctx,
    Path((parent, name)): Path<(String, String)>,
) -> ApiResult<Ack> {
    ctx.reject_sub_item(&parent, &name).await?;
    Ok(ack())
}

async fn list_rejected(State(ctx): Ctx) -> ApiResult<Vec<String>> {
    Ok(Json(ctx.rejected().await?))
}

async fn unreject(State(ctx): Ctx, Path(name): Path<String>) -> ApiResult<Ack> {
    ctx.unreject(&name).await?;
    Ok(ack())
}

// ============ Registry administration ============

async fn list_all_projects(State(ctx): Ctx) -> ApiResult<Vec<Project>> {
    Ok(Json(ctx.projects(true).await?))
}

async fn create_project(State(ctx): Ctx, Json(project): Json<Project>) -> ApiResult<Ack> {
    ctx.create_project(project).await?;
    Ok(ack())
}

async fn get_project(State(ctx): Ctx, Path(name): Path<String>) -> ApiResult<Project> {
    Ok(Json(ctx.project(&name).await?))
}

async fn update_project(
    State(ctx): Ctx,
    Path(name): Path<String>,
    Json(update): Json<ProjectUpdate>,
) -> ApiResult<Project> {
    Ok(Json(ctx.update_project(&name, update).await?))
}

async fn delete_project(State(ctx): Ctx, Path(name): Path<String>) -> ApiResult<Project> {
    Ok(Json(ctx.delete_project(&name).await?))
}

#[derive(Deserialize)]
struct RenameRequest {
    new_name: String,
}

async fn rename_project(
    State(ctx): Ctx,
    Path(name): Path<String>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<Ack> {
    ctx.rename_project(&name, &req.new_name).await?;
    Ok(ack())
}

#[derive(Deserialize)]
struct AliasRequest {
    alias: String,
}

#[derive(Serialize)]
struct AliasResponse {
    added: bool,
}

async fn add_alias(
    State(ctx): Ctx,
    Path(name): Path<String>,
    Json(req): Json<AliasRequest>,
) -> ApiResult<AliasResponse> {
    let added = ctx.add_alias(&name, &req.alias).await?;
    Ok(Json(AliasResponse { added }))
}

#[derive(Deserialize)]
struct SubItemRequest {
    name: String,
    #[serde(default)]
    description: String,
}

async fn add_sub_item(
    State(ctx): Ctx,
    Path(project): Path<String>,
    Json(req): Json<SubItemRequest>,
) -> ApiResult<Ack> {
    ctx.add_sub_item(&project, &req.name, &req.description)
        .await?;
    Ok(ack())
}

async fn update_sub_item(
    State(ctx): Ctx,
    Path((project, sub_item)): Path<(String, String)>,
    Json(update): Json<SubItemUpdate>,
) -> ApiResult<Ack> {
    ctx.update_sub_item(&project, &sub_item, update).await?;
    Ok(ack())
}

async fn remove_sub_item(
    State(ctx): Ctx,
    Path((project, sub_item)): Path<(String, String)>,
) -> ApiResult<project_resolver_core::SubItem> {
    Ok(Json(ctx.remove_sub_item(&project, &sub_item).await?))
}

async fn list_categories(State(ctx): Ctx) -> ApiResult<Vec<String>> {
    Ok(Json(ctx.categories().await?))
}

#[derive(Deserialize)]
struct CategoryRequest {
    name: String,
}

async fn add_category(State(ctx): Ctx, Json(req): Json<CategoryRequest>) -> ApiResult<Ack> {
    ctx.add_category(&req.name).await?;
    Ok(ack())
}

async fn remove_category(State(ctx): Ctx, Path(name): Path<String>) -> ApiResult<Ack> {
    ctx.remove_category(&name).await?;
    Ok(ack())
}

#[derive(Deserialize)]
struct RebuildQuery {
    #[serde(default)]
    force: bool,
}

async fn rebuild_embeddings(
    State(ctx): Ctx,
    Query(q): Query<RebuildQuery>,
) -> ApiResult<project_resolver_core::RebuildReport> {
    Ok(Json(ctx.rebuild_embeddings(q.force).await?))
}
