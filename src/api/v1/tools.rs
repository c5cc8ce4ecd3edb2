//! Advisory authoring tools
//!
//! Schema inference from sample payloads and expression validation
//! against a workflow's cached sample run.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::middleware::TenantContext;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::infrastructure::services::infer_schema;

/// Request body for schema inference
#[derive(Debug, Deserialize)]
pub struct GenerateSchemaRequest {
    pub sample: Value,
}

/// POST /v1/tools/schema
pub async fn generate_schema(
    _ctx: TenantContext,
    Json(request): Json<GenerateSchemaRequest>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(infer_schema(&request.sample)))
}

/// Request body for instruction generation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateInstructionsRequest {
    pub workflow_id: String,
}

/// POST /v1/tools/instructions
///
/// Advisory plain-text description of what a stored workflow does,
/// composed from its step definitions.
pub async fn generate_instructions(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(request): Json<GenerateInstructionsRequest>,
) -> Result<Json<Value>, ApiError> {
    let workflow = state
        .workflow_service
        .get(&request.workflow_id, ctx.tenant())
        .await?
        .ok_or_else(|| {
            ApiError::not_found(format!("Workflow '{}' not found", request.workflow_id))
        })?;

    let mut lines = Vec::with_capacity(workflow.step_count() + 1);
    if let Some(instruction) = workflow.instruction() {
        lines.push(instruction.to_string());
    }

    for (index, step) in workflow.steps().iter().enumerate() {
        let api = &step.api_config;
        let mode = match step.execution_mode {
            crate::domain::workflow::ExecutionMode::Direct => String::new(),
            crate::domain::workflow::ExecutionMode::Loop => format!(
                " for each item of `{}`",
                step.loop_selector.as_deref().unwrap_or("$")
            ),
        };
        lines.push(format!(
            "{}. `{}`: {} {}{}{}",
            index + 1,
            step.id,
            api.method,
            api.url_host,
            api.url_path,
            mode
        ));
    }

    Ok(Json(serde_json::json!({
        "workflowId": request.workflow_id,
        "instructions": lines.join("\n"),
    })))
}

/// Request body for expression validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateExpressionRequest {
    pub workflow_id: String,

    pub expression: String,

    #[serde(default)]
    pub schema: Option<Value>,

    /// Re-sample from the latest archived run instead of the cached one
    #[serde(default)]
    pub refresh_sample: bool,
}

/// Outcome of validating an expression against a sample
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateExpressionResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /v1/tools/expression
pub async fn validate_expression(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(request): Json<ValidateExpressionRequest>,
) -> Result<Json<ValidateExpressionResponse>, ApiError> {
    if request.refresh_sample {
        state
            .sample_service
            .sample_context(&request.workflow_id, ctx.tenant(), true)
            .await?;
    }

    let outcome = state
        .sample_service
        .validate_expression(
            &request.workflow_id,
            &request.expression,
            request.schema.as_ref(),
            ctx.tenant(),
        )
        .await?;

    Ok(Json(ValidateExpressionResponse {
        success: outcome.success,
        data: outcome.data,
        error: outcome.error,
    }))
}
