//! Workflow endpoints

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::api::middleware::TenantContext;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::workflow::{Credentials, RunOptions, RunResult, Workflow};

/// Shared limit/offset query for listings
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Page envelope returned by list endpoints
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Request body for executing a stored workflow
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    #[serde(default)]
    pub payload: Value,

    #[serde(default)]
    pub credentials: Value,

    #[serde(default)]
    pub options: Value,
}

/// Request body for executing an inline workflow definition
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteInlineRequest {
    pub workflow: Workflow,

    #[serde(default)]
    pub payload: Value,

    #[serde(default)]
    pub credentials: Value,

    #[serde(default)]
    pub options: Value,
}

/// Payloads arrive as a JSON object or a JSON-encoded string
pub(crate) fn parse_payload(payload: Value) -> Result<Value, ApiError> {
    match payload {
        Value::String(text) => serde_json::from_str(&text)
            .map_err(|e| ApiError::bad_request(format!("payload is not valid JSON: {}", e))),
        other => Ok(other),
    }
}

/// Credentials arrive as a name→value object or a JSON-encoded string
pub(crate) fn parse_credentials(credentials: Value) -> Result<Credentials, ApiError> {
    let value = match credentials {
        Value::Null => return Ok(Credentials::new()),
        Value::String(text) => serde_json::from_str::<Value>(&text)
            .map_err(|e| ApiError::bad_request(format!("credentials are not valid JSON: {}", e)))?,
        other => other,
    };

    let map = value
        .as_object()
        .ok_or_else(|| ApiError::bad_request("credentials must be an object of name/value pairs"))?;

    let mut out = Credentials::with_capacity(map.len());
    for (name, value) in map {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(ApiError::bad_request(format!(
                    "credential '{}' must be a string, got {}",
                    name, other
                )));
            }
        };
        out.insert(name.clone(), text);
    }

    Ok(out)
}

pub(crate) fn parse_options(options: Value) -> Result<RunOptions, ApiError> {
    RunOptions::from_value(&options).map_err(ApiError::from)
}

/// GET /v1/workflows
pub async fn list_workflows(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse<Workflow>>, ApiError> {
    let page = state
        .workflow_service
        .list(params.limit, params.offset, ctx.tenant())
        .await?;

    Ok(Json(ListResponse {
        items: page.items,
        total: page.total,
    }))
}

/// GET /v1/workflows/{id}
pub async fn get_workflow(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, ApiError> {
    let workflow = state
        .workflow_service
        .get(&id, ctx.tenant())
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Workflow '{}' not found", id)))?;

    Ok(Json(workflow))
}

/// POST /v1/workflows/{id}
pub async fn upsert_workflow(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(workflow): Json<Workflow>,
) -> Result<Json<Workflow>, ApiError> {
    let saved = state
        .workflow_service
        .upsert(&id, workflow, ctx.tenant())
        .await?;

    Ok(Json(saved))
}

/// DELETE /v1/workflows/{id}
pub async fn delete_workflow(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.workflow_service.delete(&id, ctx.tenant()).await?;
    Ok(Json(json!({"success": deleted})))
}

/// POST /v1/workflows/{id}/execute
pub async fn execute_workflow(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<String>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<RunResult>, ApiError> {
    debug!(workflow_id = %id, tenant = ?ctx.tenant(), "Executing stored workflow");

    let payload = parse_payload(request.payload)?;
    let credentials = parse_credentials(request.credentials)?;
    let options = parse_options(request.options)?;

    let run = state
        .workflow_service
        .execute_by_id(&id, payload, credentials, options, ctx.tenant())
        .await?;

    Ok(Json(run))
}

/// POST /v1/workflows/execute
pub async fn execute_inline_workflow(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(request): Json<ExecuteInlineRequest>,
) -> Result<Json<RunResult>, ApiError> {
    debug!(tenant = ?ctx.tenant(), "Executing inline workflow");

    let payload = parse_payload(request.payload)?;
    let credentials = parse_credentials(request.credentials)?;
    let options = parse_options(request.options)?;

    let run = state
        .workflow_service
        .execute(request.workflow, payload, credentials, options, ctx.tenant())
        .await?;

    Ok(Json(run))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_accepts_object_and_string() {
        assert_eq!(
            parse_payload(json!({"a": 1})).unwrap(),
            json!({"a": 1})
        );
        assert_eq!(
            parse_payload(json!(r#"{"a": 1}"#)).unwrap(),
            json!({"a": 1})
        );
        assert!(parse_payload(json!("not json")).is_err());
    }

    #[test]
    fn test_parse_credentials_shapes() {
        let creds = parse_credentials(json!({"apiKey": "secret", "port": 8080})).unwrap();
        assert_eq!(creds["apiKey"], "secret");
        assert_eq!(creds["port"], "8080");

        let creds = parse_credentials(json!(r#"{"token": "t"}"#)).unwrap();
        assert_eq!(creds["token"], "t");

        assert!(parse_credentials(json!({"bad": {"nested": true}})).is_err());
        assert!(parse_credentials(json!([1, 2])).is_err());
        assert!(parse_credentials(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_parse_options_bad_value() {
        assert!(parse_options(json!({"timeoutMs": "soon"})).is_err());
        assert!(parse_options(json!({"unknown": 1})).is_ok());
    }

    #[test]
    fn test_execute_request_defaults() {
        let request: ExecuteRequest = serde_json::from_str("{}").unwrap();
        assert!(request.payload.is_null());
        assert!(request.credentials.is_null());
        assert!(request.options.is_null());
    }
}
