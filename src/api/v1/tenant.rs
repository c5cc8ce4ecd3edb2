//! Tenant info endpoints

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::api::middleware::TenantContext;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::tenant::TenantInfo;

/// GET /v1/tenant
pub async fn get_tenant_info(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<TenantInfo>, ApiError> {
    let info = state.tenant_service.get(ctx.tenant()).await?;
    Ok(Json(info))
}

/// Request body for updating tenant info
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTenantRequest {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub email_entry_skipped: Option<bool>,
}

/// PUT /v1/tenant
pub async fn update_tenant_info(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(request): Json<UpdateTenantRequest>,
) -> Result<Json<TenantInfo>, ApiError> {
    let info = state
        .tenant_service
        .update(request.email, request.email_entry_skipped, ctx.tenant())
        .await?;

    Ok(Json(info))
}
