//! API config endpoints

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::middleware::TenantContext;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_config::ApiConfig;

use super::workflows::{ListParams, ListResponse};

/// GET /v1/apis
pub async fn list_apis(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<ApiConfig>>, ApiError> {
    let page = state
        .api_config_service
        .list(params.limit, params.offset, ctx.tenant())
        .await?;

    Ok(Json(ListResponse {
        items: page.items,
        total: page.total,
    }))
}

/// GET /v1/apis/{id}
pub async fn get_api(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<ApiConfig>, ApiError> {
    let config = state
        .api_config_service
        .get(&id, ctx.tenant())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("API config '{}' not found", id)))?;

    Ok(Json(config))
}

/// POST /v1/apis/{id}
pub async fn upsert_api(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(config): Json<ApiConfig>,
) -> Result<Json<ApiConfig>, ApiError> {
    let saved = state
        .api_config_service
        .upsert(&id, config, ctx.tenant())
        .await?;

    Ok(Json(saved))
}

/// DELETE /v1/apis/{id}
pub async fn delete_api(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.api_config_service.delete(&id, ctx.tenant()).await?;
    Ok(Json(json!({"success": deleted})))
}

/// Request body for renaming an API config
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub new_id: String,
}

/// POST /v1/apis/{id}/rename
pub async fn rename_api(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<ApiConfig>, ApiError> {
    let renamed = state
        .api_config_service
        .rename(&id, &request.new_id, ctx.tenant())
        .await?;

    Ok(Json(renamed))
}
