//! Extract and transform config endpoints
//!
//! Both kinds share the stored-config lifecycle; their single-step
//! execution modes live outside this service.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::{json, Value};

use crate::api::middleware::TenantContext;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_config::{ExtractConfig, TransformConfig};

use super::workflows::{ListParams, ListResponse};

/// GET /v1/extracts
pub async fn list_extracts(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<ExtractConfig>>, ApiError> {
    let page = state
        .extract_service
        .list(params.limit, params.offset, ctx.tenant())
        .await?;

    Ok(Json(ListResponse {
        items: page.items,
        total: page.total,
    }))
}

/// GET /v1/extracts/{id}
pub async fn get_extract(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<ExtractConfig>, ApiError> {
    let config = state
        .extract_service
        .get(&id, ctx.tenant())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Extract config '{}' not found", id)))?;

    Ok(Json(config))
}

/// POST /v1/extracts/{id}
pub async fn upsert_extract(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(config): Json<ExtractConfig>,
) -> Result<Json<ExtractConfig>, ApiError> {
    let saved = state
        .extract_service
        .upsert(&id, config, ctx.tenant())
        .await?;

    Ok(Json(saved))
}

/// DELETE /v1/extracts/{id}
pub async fn delete_extract(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.extract_service.delete(&id, ctx.tenant()).await?;
    Ok(Json(json!({"success": deleted})))
}

/// GET /v1/transforms
pub async fn list_transforms(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<TransformConfig>>, ApiError> {
    let page = state
        .transform_service
        .list(params.limit, params.offset, ctx.tenant())
        .await?;

    Ok(Json(ListResponse {
        items: page.items,
        total: page.total,
    }))
}

/// GET /v1/transforms/{id}
pub async fn get_transform(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<TransformConfig>, ApiError> {
    let config = state
        .transform_service
        .get(&id, ctx.tenant())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Transform config '{}' not found", id)))?;

    Ok(Json(config))
}

/// POST /v1/transforms/{id}
pub async fn upsert_transform(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(config): Json<TransformConfig>,
) -> Result<Json<TransformConfig>, ApiError> {
    let saved = state
        .transform_service
        .upsert(&id, config, ctx.tenant())
        .await?;

    Ok(Json(saved))
}

/// DELETE /v1/transforms/{id}
pub async fn delete_transform(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.transform_service.delete(&id, ctx.tenant()).await?;
    Ok(Json(json!({"success": deleted})))
}
