//! REST API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use layerdb_core::{LayerdbError, LayerdbResult, ModelName};
use layerdb_store::{Layer, LayerCheck, LayerReference, Manifest, ManifestStore, ScanPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub store: ManifestStore,
}

type ApiError = (StatusCode, String);

/// Create the API router
pub fn create_router(store: ManifestStore) -> Router {
    let state = Arc::new(AppState { store });

    Router::new()
        .route("/api/v1/manifests", get(list_manifests))
        .route(
            "/api/v1/manifests/:host/:namespace/:model/:tag",
            get(get_manifest).delete(delete_manifest),
        )
        .route(
            "/api/v1/manifests/:host/:namespace/:model/:tag/references",
            get(get_references),
        )
        .route(
            "/api/v1/manifests/:host/:namespace/:model/:tag/verify",
            get(verify_manifest),
        )
        .route("/api/v1/status", get(get_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(err: LayerdbError) -> ApiError {
    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_corrupt() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        match err {
            LayerdbError::Unqualified(_)
            | LayerdbError::InvalidName(_)
            | LayerdbError::InvalidDigest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    };
    (status, err.to_string())
}

/// Run a store operation on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> LayerdbResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(error_response)
}

fn name_from_path(
    (host, namespace, model, tag): (String, String, String, String),
) -> Result<ModelName, ApiError> {
    let name = ModelName::new(host, namespace, model, tag);
    if !name.is_valid() {
        return Err(error_response(LayerdbError::InvalidName(name.to_string())));
    }
    Ok(name)
}

/// Query for listing manifests
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Fail the whole listing on the first unreadable manifest
    #[serde(default)]
    pub strict: bool,
}

/// Response for a manifest
#[derive(Debug, Serialize)]
pub struct ManifestResponse {
    pub name: ModelName,
    pub digest: String,
    pub size: i64,
    pub modified_at: Option<DateTime<Utc>>,
    pub schema_version: i64,
    pub media_type: String,
    pub config: Layer,
    pub layers: Vec<Layer>,
}

impl ManifestResponse {
    fn new(name: ModelName, manifest: Manifest) -> Self {
        Self {
            name,
            digest: manifest.digest().to_string(),
            size: manifest.size(),
            modified_at: manifest.modified().map(DateTime::<Utc>::from),
            schema_version: manifest.schema_version,
            media_type: manifest.media_type,
            config: manifest.config,
            layers: manifest.layers,
        }
    }
}

/// List all manifests
async fn list_manifests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ManifestResponse>>, ApiError> {
    let policy = if query.strict {
        ScanPolicy::Strict
    } else {
        ScanPolicy::BestEffort
    };

    let manifests = blocking(move || state.store.list_all(policy)).await?;
    let responses = manifests
        .into_iter()
        .map(|(name, manifest)| ManifestResponse::new(name, manifest))
        .collect();
    Ok(Json(responses))
}

/// Get a specific manifest
async fn get_manifest(
    State(state): State<Arc<AppState>>,
    Path(parts): Path<(String, String, String, String)>,
) -> Result<Json<ManifestResponse>, ApiError> {
    let name = name_from_path(parts)?;
    let lookup = name.clone();
    let manifest = blocking(move || state.store.parse(&lookup)).await?;
    Ok(Json(ManifestResponse::new(name, manifest)))
}

/// Query for deleting a manifest
#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    /// Remove the manifest file only, leaving its blobs
    #[serde(default)]
    pub keep_layers: bool,
}

/// Delete a manifest and the blobs nothing else references
async fn delete_manifest(
    State(state): State<Arc<AppState>>,
    Path(parts): Path<(String, String, String, String)>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, ApiError> {
    let name = name_from_path(parts)?;
    info!(name = %name, keep_layers = query.keep_layers, "Deleting manifest");

    blocking(move || {
        let manifest = state.store.parse(&name)?;
        state.store.remove(&manifest)?;
        if !query.keep_layers {
            state.store.remove_layers(&manifest)?;
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Report which blobs of a manifest are shared
async fn get_references(
    State(state): State<Arc<AppState>>,
    Path(parts): Path<(String, String, String, String)>,
) -> Result<Json<Vec<LayerReference>>, ApiError> {
    let name = name_from_path(parts)?;
    let references = blocking(move || {
        let manifest = state.store.parse(&name)?;
        state.store.layer_references(&manifest)
    })
    .await?;
    Ok(Json(references))
}

/// Re-hash the blobs of a manifest
async fn verify_manifest(
    State(state): State<Arc<AppState>>,
    Path(parts): Path<(String, String, String, String)>,
) -> Result<Json<Vec<LayerCheck>>, ApiError> {
    let name = name_from_path(parts)?;
    let checks = blocking(move || {
        let manifest = state.store.parse(&name)?;
        state.store.verify(&manifest)
    })
    .await?;
    Ok(Json(checks))
}

/// System status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub models_path: String,
    pub manifests: usize,
    pub total_size: i64,
}

/// Get store status
async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let models_path = state.store.paths().models_path().display().to_string();
    let manifests = blocking(move || state.store.list_all(ScanPolicy::BestEffort)).await?;

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        models_path,
        manifests: manifests.len(),
        total_size: manifests.values().map(Manifest::size).sum(),
    }))
}
