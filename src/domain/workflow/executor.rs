//! Workflow executor trait and run options

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::DomainError;

use super::entity::Workflow;
use super::run::RunResult;

/// Credential values available to placeholder substitution and auth
/// injection, keyed by name.
pub type Credentials = HashMap<String, String>;

/// How the shared response cache participates in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheMode {
    /// Read hits, write misses
    Enabled,
    /// Read hits only
    Readonly,
    /// Write results without consulting the cache
    Writeonly,
    /// Bypass the cache entirely (default for interactive runs)
    #[default]
    Disabled,
}

/// Caller-supplied execution options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunOptions {
    pub cache_mode: CacheMode,

    /// Overall run deadline in milliseconds; none by default
    pub timeout_ms: Option<u64>,

    /// Whether to archive the run result after completion
    pub persist_results: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::default(),
            timeout_ms: None,
            persist_results: true,
        }
    }
}

impl RunOptions {
    /// Parse options from loose JSON. Unknown fields are ignored; fields
    /// with the wrong shape are validation errors.
    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        if value.is_null() {
            return Ok(Self::default());
        }

        serde_json::from_value(value.clone())
            .map_err(|e| DomainError::validation(format!("Invalid options: {}", e)))
    }
}

/// Trait for workflow execution
#[async_trait]
pub trait WorkflowExecutor: Send + Sync + std::fmt::Debug {
    /// Execute a workflow against a payload. Always returns a RunResult,
    /// successful or not; `Err` is reserved for pre-execution validation
    /// failures.
    async fn execute(
        &self,
        workflow: &Workflow,
        payload: Value,
        credentials: Credentials,
        options: RunOptions,
        tenant: Option<&str>,
    ) -> Result<RunResult, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_options() {
        let options = RunOptions::default();
        assert_eq!(options.cache_mode, CacheMode::Disabled);
        assert!(options.timeout_ms.is_none());
        assert!(options.persist_results);
    }

    #[test]
    fn test_options_from_value() {
        let options = RunOptions::from_value(&json!({
            "cacheMode": "READONLY",
            "timeoutMs": 1000
        }))
        .unwrap();

        assert_eq!(options.cache_mode, CacheMode::Readonly);
        assert_eq!(options.timeout_ms, Some(1000));
        assert!(options.persist_results);
    }

    #[test]
    fn test_unknown_options_ignored() {
        let options = RunOptions::from_value(&json!({
            "somethingElse": true,
            "timeoutMs": 500
        }))
        .unwrap();

        assert_eq!(options.timeout_ms, Some(500));
    }

    #[test]
    fn test_bad_option_value_rejected() {
        let err = RunOptions::from_value(&json!({"cacheMode": "SOMETIMES"})).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));

        let err = RunOptions::from_value(&json!({"timeoutMs": "soon"})).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn test_null_options_default() {
        let options = RunOptions::from_value(&Value::Null).unwrap();
        assert_eq!(options.cache_mode, CacheMode::Disabled);
    }
}
