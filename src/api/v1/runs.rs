//! Run record endpoints

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::middleware::TenantContext;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::workflow::RunResult;

use super::workflows::ListResponse;

/// Listing params for runs: limit/offset plus an optional workflow filter
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default)]
    pub offset: usize,

    #[serde(default)]
    pub config_id: Option<String>,
}

fn default_limit() -> usize {
    50
}

/// GET /v1/runs
pub async fn list_runs(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<RunListParams>,
) -> Result<Json<ListResponse<RunResult>>, ApiError> {
    let page = state
        .run_service
        .list(
            params.limit,
            params.offset,
            ctx.tenant(),
            params.config_id.as_deref(),
        )
        .await?;

    Ok(Json(ListResponse {
        items: page.items,
        total: page.total,
    }))
}

/// GET /v1/runs/{id}
pub async fn get_run(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<RunResult>, ApiError> {
    let run = state
        .run_service
        .get(&id, ctx.tenant())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Run '{}' not found", id)))?;

    Ok(Json(run))
}

/// DELETE /v1/runs
pub async fn delete_all_runs(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.run_service.delete_all(ctx.tenant()).await?;
    Ok(Json(json!({"success": deleted})))
}
