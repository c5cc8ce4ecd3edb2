//! Workflow domain entity

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::api_config::ApiConfig;
use crate::domain::storage::StorageEntity;
use crate::domain::DomainError;

/// Maximum length for workflow IDs
pub const MAX_ID_LENGTH: usize = 64;

/// URL-safe workflow IDs: alphanumeric plus `.`, `_`, `-`, starting and
/// ending alphanumeric.
static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*[a-zA-Z0-9]$|^[a-zA-Z0-9]$").unwrap());

/// Validate a workflow ID string
pub fn validate_workflow_id(id: &str) -> Result<(), DomainError> {
    if id.is_empty() {
        return Err(DomainError::validation("Workflow ID cannot be empty"));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(DomainError::validation(format!(
            "Workflow ID exceeds maximum length of {} characters",
            MAX_ID_LENGTH
        )));
    }

    if !ID_PATTERN.is_match(id) {
        return Err(DomainError::validation(format!(
            "Invalid workflow ID '{}': must be URL-safe (alphanumeric, '.', '_', '-')",
            id
        )));
    }

    Ok(())
}

/// How a step drives its API call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    /// One call per step
    #[default]
    Direct,

    /// One call per element of the loop selector's result
    Loop,
}

/// One unit of work inside a workflow
///
/// The step id doubles as the field name under which the transformed
/// output lands in the accumulated context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,

    /// Embedded endpoint snapshot driven by this step
    pub api_config: ApiConfig,

    #[serde(default)]
    pub execution_mode: ExecutionMode,

    /// Expression producing the sequence a LOOP step iterates over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_selector: Option<String>,

    /// Cap on loop iterations; excess items are dropped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_max_iters: Option<usize>,

    /// Expression computing the per-invocation input (default `$`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_mapping: Option<String>,

    /// Expression computing the stored output (default `$`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mapping: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, api_config: ApiConfig) -> Self {
        Self {
            id: id.into(),
            api_config,
            execution_mode: ExecutionMode::default(),
            loop_selector: None,
            loop_max_iters: None,
            input_mapping: None,
            response_mapping: None,
        }
    }

    pub fn with_loop(mut self, selector: impl Into<String>) -> Self {
        self.execution_mode = ExecutionMode::Loop;
        self.loop_selector = Some(selector.into());
        self
    }

    pub fn with_loop_max_iters(mut self, max: usize) -> Self {
        self.loop_max_iters = Some(max);
        self
    }

    pub fn with_input_mapping(mut self, expr: impl Into<String>) -> Self {
        self.input_mapping = Some(expr.into());
        self
    }

    pub fn with_response_mapping(mut self, expr: impl Into<String>) -> Self {
        self.response_mapping = Some(expr.into());
        self
    }
}

/// A workflow definition: an ordered list of API-call steps plus a final
/// transform over the accumulated context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default)]
    id: String,

    steps: Vec<Step>,

    /// Expression composing the final output (default `$`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    final_transform: Option<String>,

    /// Optional JSON schema the final output must satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,

    /// Free-text description of the workflow's purpose
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instruction: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            final_transform: None,
            response_schema: None,
            instruction: None,
            created_at: None,
            updated_at: None,
        }
    }

    // Builder methods

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_final_transform(mut self, expr: impl Into<String>) -> Self {
        self.final_transform = Some(expr.into());
        self
    }

    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    // Getters

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn steps_mut(&mut self) -> &mut [Step] {
        &mut self.steps
    }

    /// Final transform expression, `$` when omitted
    pub fn final_transform(&self) -> &str {
        self.final_transform.as_deref().unwrap_or("$")
    }

    pub fn response_schema(&self) -> Option<&serde_json::Value> {
        self.response_schema.as_ref()
    }

    pub fn instruction(&self) -> Option<&str> {
        self.instruction.as_deref()
    }

    pub fn created_at_time(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at_time(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn get_step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Checks the structural constraints required before execution: at
    /// least one step, unique step ids, a selector on every LOOP step.
    pub fn validate_for_execution(&self) -> Result<(), DomainError> {
        if self.steps.is_empty() {
            return Err(DomainError::validation("Workflow has no steps"));
        }

        for (i, step) in self.steps.iter().enumerate() {
            if step.id.is_empty() {
                return Err(DomainError::validation(format!(
                    "Step at index {} has no id",
                    i
                )));
            }

            if self.steps[..i].iter().any(|prior| prior.id == step.id) {
                return Err(DomainError::validation(format!(
                    "Duplicate step id '{}'",
                    step.id
                )));
            }

            if step.execution_mode == ExecutionMode::Loop && step.loop_selector.is_none() {
                return Err(DomainError::validation(format!(
                    "LOOP step '{}' requires a loopSelector",
                    step.id
                )));
            }

            if let Some(max) = step.loop_max_iters {
                if max == 0 {
                    return Err(DomainError::validation(format!(
                        "Step '{}': loopMaxIters must be positive",
                        step.id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Constraints for persisting: a valid id plus the execution checks.
    pub fn validate_for_save(&self) -> Result<(), DomainError> {
        validate_workflow_id(&self.id)?;
        self.validate_for_execution()
    }
}

impl StorageEntity for Workflow {
    const KIND: &'static str = "workflows";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
    }
}
