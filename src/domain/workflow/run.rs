//! Run result records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::storage::StorageEntity;

use super::entity::Workflow;

/// Outcome of driving a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRunResult {
    pub step_id: String,

    pub success: bool,

    /// Decoded payload(s) returned by the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Value>,

    /// Output stored into the context under the step id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformed_data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Number of items the loop selector produced (LOOP steps only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_total_items: Option<usize>,

    /// Number of iterations actually driven; smaller than
    /// `loop_total_items` when `loopMaxIters` truncated the sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_iterations: Option<usize>,
}

impl StepRunResult {
    pub fn success(step_id: impl Into<String>, raw: Value, transformed: Value) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            raw_data: Some(raw),
            transformed_data: Some(transformed),
            error: None,
            loop_total_items: None,
            loop_iterations: None,
        }
    }

    pub fn failure(step_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            success: false,
            raw_data: None,
            transformed_data: None,
            error: Some(error.into()),
            loop_total_items: None,
            loop_iterations: None,
        }
    }

    pub fn with_loop_counts(mut self, total_items: usize, iterations: usize) -> Self {
        self.loop_total_items = Some(total_items);
        self.loop_iterations = Some(iterations);
        self
    }
}

/// Immutable record of one workflow execution, end to end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub id: String,

    pub success: bool,

    /// Final transformed value; null on failure before the transform ran
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    pub step_results: Vec<StepRunResult>,

    /// Snapshot of the workflow that ran
    pub config: Workflow,
}

impl RunResult {
    /// Id of the workflow this run executed, for filtered listings
    pub fn config_id(&self) -> &str {
        self.config.id()
    }
}

impl StorageEntity for RunResult {
    const KIND: &'static str = "runs";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.started_at)
    }

    // Run timestamps are assigned by the executor; the record is written
    // once and never updated.
    fn stamp(&mut self, _created_at: DateTime<Utc>, _updated_at: DateTime<Utc>) {}
}
