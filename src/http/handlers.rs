//! JSON API handlers.
//!
//! Request bodies are parsed leniently: a missing or malformed body is
//! treated as `{}`, matching what the web frontend and older clients send.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::codec::DecodedLink;
use crate::config::{Settings, SettingsPatch};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::manager::Health;

#[derive(Deserialize)]
struct CreateRequest {
    #[serde(default)]
    ps: Option<String>,
}

#[derive(Serialize)]
pub struct CreateResponse {
    pub ps: String,
    pub id: Uuid,
    pub vmess: String,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: String,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

pub async fn list_clients(State(state): State<AppState>) -> Json<Vec<DecodedLink>> {
    Json(state.manager.list_clients().await)
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DecodedLink>, ApiError> {
    state.manager.find_client(&name).await.map(Json).ok_or(ApiError::NotFound)
}

pub async fn create_client(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CreateResponse>, ApiError> {
    let name = serde_json::from_slice::<CreateRequest>(&body)
        .ok()
        .and_then(|req| req.ps)
        .map(|ps| ps.trim().to_string())
        .filter(|ps| !ps.is_empty())
        .ok_or(ApiError::MissingName)?;

    let created = state.manager.create_client(&name).await?;

    Ok(Json(CreateResponse {
        ps: created.descriptor.name,
        id: created.descriptor.id,
        vmess: created.link,
    }))
}

/// Always reports the name as deleted; store problems are only logged.
pub async fn delete_client(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<DeleteResponse> {
    if let Err(e) = state.manager.delete_client(&name).await {
        tracing::warn!(name = %name, error = %e, "Delete incomplete");
    }
    Json(DeleteResponse { deleted: name })
}

pub async fn clear_clients(State(state): State<AppState>) -> Json<ClearResponse> {
    if let Err(e) = state.manager.clear_clients().await {
        tracing::warn!(error = %e, "Clear incomplete");
    }
    Json(ClearResponse { cleared: true })
}

pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(Settings::clone(&state.manager.settings().current()))
}

pub async fn update_settings(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Settings>, ApiError> {
    let value = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
    let patch = SettingsPatch::from_json(&value);

    let settings = state
        .manager
        .update_settings(&patch)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(Settings::clone(&settings)))
}

pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(state.manager.health().await)
}

pub async fn api_not_found() -> ApiError {
    ApiError::NotFound
}
