use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::{header, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use tryon_shared::naming::{self, ParsedName};
use tryon_shared::protocol::{
    decode_data_uri, CopyRequest, DeleteQuery, DeleteResponse, GenerateRequest,
    GenerateResponse, ListFilesQuery, ListFilesResponse, RenameRequest, RenameResponse,
    UploadRequest, UploadResponse,
};
use tryon_shared::constants::DEFAULT_GARMENT_DESCRIPTION;
use tryon_shared::{SlotKind, UserId};
use tryon_store::BlobStore;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::inflight::InFlightGuard;
use crate::synthesis::{SynthesisRequest, Synthesizer};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub inflight: InFlightGuard,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let body_limit = state.config.max_request_body();

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/files",
            get(list_files).post(upload_file).delete(delete_file),
        )
        .route("/api/files/rename", post(rename_file))
        .route("/api/files/copy", post(copy_file))
        .route("/api/generate", post(generate))
        .route("/images/:name", get(serve_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    synthesis_configured: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        synthesis_configured: state.config.replicate_api_key.is_some(),
    })
}

fn bad_query(e: QueryRejection) -> ServerError {
    ServerError::BadRequest(e.body_text())
}

fn bad_json(e: JsonRejection) -> ServerError {
    ServerError::BadRequest(e.body_text())
}

/// A canonical slot name, optionally required to belong to `owner`.
fn slot_name(name: &str, owner: Option<&UserId>) -> Result<ParsedName, ServerError> {
    let parsed = naming::parse(name)
        .ok_or_else(|| ServerError::BadRequest(format!("Not a slot name: {name}")))?;
    if let Some(owner) = owner {
        if parsed.user_id != *owner {
            return Err(ServerError::BadRequest(format!(
                "{name} does not belong to {owner}"
            )));
        }
    }
    Ok(parsed)
}

/// Both names must be slots of the same user.
fn same_owner_pair(from: &str, to: &str) -> Result<(), ServerError> {
    let source = slot_name(from, None)?;
    slot_name(to, Some(&source.user_id))?;
    Ok(())
}

async fn list_files(
    State(state): State<AppState>,
    query: Result<Query<ListFilesQuery>, QueryRejection>,
) -> Result<Json<ListFilesResponse>, ServerError> {
    let Query(query) = query.map_err(bad_query)?;

    let files: Vec<String> = state
        .store
        .list(&naming::user_prefix(&query.user_id))
        .await?
        .into_iter()
        .filter(|name| naming::belongs_to(name, &query.user_id))
        .collect();

    Ok(Json(ListFilesResponse { files }))
}

async fn upload_file(
    State(state): State<AppState>,
    req: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>, ServerError> {
    let Json(req) = req.map_err(bad_json)?;

    if !req.kind.accepts(req.index) {
        return Err(ServerError::BadRequest(format!(
            "Index {} out of range for {}",
            req.index, req.kind
        )));
    }

    let data = decode_data_uri(&req.image_data)?;
    let file_name = naming::name_for(&req.user_id, req.kind, req.index);
    let size = data.len();
    state.store.put(&file_name, Bytes::from(data)).await?;

    info!(file = %file_name, size, "Image uploaded");
    Ok(Json(UploadResponse { file_name }))
}

async fn delete_file(
    State(state): State<AppState>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<Json<DeleteResponse>, ServerError> {
    let Query(query) = query.map_err(bad_query)?;

    if !naming::is_result_name(&query.file_name, &query.user_id) {
        slot_name(&query.file_name, Some(&query.user_id))?;
    }

    state.store.delete(&query.file_name).await?;

    info!(file = %query.file_name, "Image deleted");
    Ok(Json(DeleteResponse {
        message: format!("Deleted {}", query.file_name),
    }))
}

async fn rename_file(
    State(state): State<AppState>,
    req: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<RenameResponse>, ServerError> {
    let Json(req) = req.map_err(bad_json)?;
    same_owner_pair(&req.old_file_name, &req.new_file_name)?;

    state.store.copy(&req.old_file_name, &req.new_file_name).await?;
    state.store.delete(&req.old_file_name).await?;

    info!(from = %req.old_file_name, to = %req.new_file_name, "Image renamed");
    Ok(Json(RenameResponse {
        message: "Renamed".to_string(),
        old_file_name: req.old_file_name,
        new_file_name: req.new_file_name,
    }))
}

async fn copy_file(
    State(state): State<AppState>,
    req: Result<Json<CopyRequest>, JsonRejection>,
) -> Result<Json<UploadResponse>, ServerError> {
    let Json(req) = req.map_err(bad_json)?;
    same_owner_pair(&req.from, &req.to)?;

    state.store.copy(&req.from, &req.to).await?;

    info!(from = %req.from, to = %req.to, "Image copied");
    Ok(Json(UploadResponse { file_name: req.to }))
}

async fn serve_image(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state.store.get(&name).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        data,
    ))
}

async fn generate(
    State(state): State<AppState>,
    req: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ServerError> {
    let Json(req) = req.map_err(bad_json)?;
    let user = &req.user_id;

    let garment = slot_name(&req.garment_name, Some(user))?;
    let body = slot_name(&req.body_name, Some(user))?;
    if garment.kind != SlotKind::Cloth || body.kind != SlotKind::Body {
        return Err(ServerError::BadRequest(
            "Generation needs one garment and one body photo".into(),
        ));
    }

    for name in [&req.garment_name, &req.body_name] {
        if !state.store.exists(name).await? {
            return Err(ServerError::BlobNotFound(name.clone()));
        }
    }

    let _permit = state
        .inflight
        .try_acquire(user)
        .ok_or_else(|| ServerError::GenerationInFlight(user.clone()))?;

    let job_id = Uuid::new_v4();
    let request = SynthesisRequest {
        garment_url: state.config.public_image_url(&req.garment_name),
        body_url: state.config.public_image_url(&req.body_name),
        description: req
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GARMENT_DESCRIPTION.to_string()),
    };

    info!(job = %job_id, user = %user, body = %req.body_name, "Generation started");

    let timeout = state.config.synthesis_timeout;
    let image = match tokio::time::timeout(timeout, state.synthesizer.synthesize(&request)).await
    {
        Ok(result) => result?,
        Err(_) => {
            warn!(job = %job_id, user = %user, "Generation timed out");
            return Err(ServerError::UpstreamTimeout(timeout.as_secs()));
        }
    };

    let file_name = naming::result_name(user);
    state.store.put(&file_name, image).await?;

    info!(job = %job_id, file = %file_name, "Generation finished");
    Ok(Json(GenerateResponse { job_id, file_name }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
