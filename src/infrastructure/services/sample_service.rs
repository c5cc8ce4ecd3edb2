//! Expression sampling and advisory schema tools
//!
//! Authoring support for workflow expressions: a per-process cache of
//! sample contexts (built from each workflow's most recent archived run)
//! that user expressions can be validated against, and deterministic JSON
//! schema inference from sample payloads. Samples are keyed by
//! (tenant, workflow id) so tenants never see each other's data, and each
//! generate call replaces the cached sample.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use serde_json::{json, Map, Value};

use crate::domain::expression::{evaluate_with_schema, EvalOutcome};
use crate::domain::workflow::RunRepository;
use crate::domain::DomainError;

/// How many archived runs to scan when picking the freshest sample
const SAMPLE_SCAN_LIMIT: usize = 100;

/// Sample cache plus expression validation
pub struct SampleService {
    runs: Arc<dyn RunRepository>,
    samples: RwLock<HashMap<(String, String), Value>>,
}

impl std::fmt::Debug for SampleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleService").finish()
    }
}

impl SampleService {
    pub fn new(runs: Arc<dyn RunRepository>) -> Self {
        Self {
            runs,
            samples: RwLock::new(HashMap::new()),
        }
    }

    fn cache_key(workflow_id: &str, tenant: Option<&str>) -> (String, String) {
        (
            tenant.unwrap_or("").to_string(),
            workflow_id.to_string(),
        )
    }

    /// The sample context for a workflow: step outputs of its most recent
    /// archived run, shaped like the context final transforms see.
    /// `refresh` bypasses and replaces the cached sample.
    pub async fn sample_context(
        &self,
        workflow_id: &str,
        tenant: Option<&str>,
        refresh: bool,
    ) -> Result<Value, DomainError> {
        let key = Self::cache_key(workflow_id, tenant);

        if !refresh {
            let samples = self
                .samples
                .read()
                .map_err(|e| DomainError::internal(format!("sample cache poisoned: {}", e)))?;
            if let Some(sample) = samples.get(&key) {
                return Ok(sample.clone());
            }
        }

        let page = self
            .runs
            .list(SAMPLE_SCAN_LIMIT, 0, tenant, Some(workflow_id))
            .await?;

        let latest = page
            .items
            .into_iter()
            .max_by_key(|run| run.started_at)
            .ok_or_else(|| {
                DomainError::not_found(format!(
                    "No archived runs for workflow '{}' to sample",
                    workflow_id
                ))
            })?;

        let mut ctx = Map::new();
        for step in &latest.step_results {
            if let Some(transformed) = &step.transformed_data {
                ctx.insert(step.step_id.clone(), transformed.clone());
            }
        }
        let sample = Value::Object(ctx);

        let mut samples = self
            .samples
            .write()
            .map_err(|e| DomainError::internal(format!("sample cache poisoned: {}", e)))?;
        samples.insert(key, sample.clone());

        Ok(sample)
    }

    /// Evaluate a user-authored expression against the workflow's sample
    /// context, optionally validating the result against a schema.
    pub async fn validate_expression(
        &self,
        workflow_id: &str,
        expr: &str,
        schema: Option<&Value>,
        tenant: Option<&str>,
    ) -> Result<EvalOutcome, DomainError> {
        let sample = self.sample_context(workflow_id, tenant, false).await?;
        Ok(evaluate_with_schema(expr, &sample, schema))
    }
}

/// Infer a JSON schema from a sample value. Advisory only: object keys
/// become required properties, array item schemas come from the first
/// element.
pub fn infer_schema(sample: &Value) -> Value {
    match sample {
        Value::Null => json!({"type": "null"}),
        Value::Bool(_) => json!({"type": "boolean"}),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                json!({"type": "integer"})
            } else {
                json!({"type": "number"})
            }
        }
        Value::String(_) => json!({"type": "string"}),
        Value::Array(items) => match items.first() {
            Some(first) => json!({"type": "array", "items": infer_schema(first)}),
            None => json!({"type": "array"}),
        },
        Value::Object(map) => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for (key, value) in map {
                properties.insert(key.clone(), infer_schema(value));
                required.push(Value::String(key.clone()));
            }
            json!({
                "type": "object",
                "properties": properties,
                "required": required
            })
        }
    }
}
