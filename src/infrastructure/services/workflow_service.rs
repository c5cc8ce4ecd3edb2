//! Workflow service - CRUD plus execution entry point

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::domain::api_config::ApiConfig;
use crate::domain::storage::{Page, Storage};
use crate::domain::workflow::{
    Credentials, RunOptions, RunResult, Workflow, WorkflowExecutor,
};
use crate::domain::DomainError;

/// Manages stored workflows and drives their execution
pub struct WorkflowService {
    storage: Arc<dyn Storage<Workflow>>,
    api_configs: Arc<dyn Storage<ApiConfig>>,
    executor: Arc<dyn WorkflowExecutor>,
}

impl std::fmt::Debug for WorkflowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowService").finish()
    }
}

impl WorkflowService {
    pub fn new(
        storage: Arc<dyn Storage<Workflow>>,
        api_configs: Arc<dyn Storage<ApiConfig>>,
        executor: Arc<dyn WorkflowExecutor>,
    ) -> Self {
        Self {
            storage,
            api_configs,
            executor,
        }
    }

    pub async fn get(&self, id: &str, tenant: Option<&str>) -> Result<Option<Workflow>, DomainError> {
        self.storage.get(id, tenant).await
    }

    pub async fn list(
        &self,
        limit: usize,
        offset: usize,
        tenant: Option<&str>,
    ) -> Result<Page<Workflow>, DomainError> {
        self.storage.list(limit, offset, tenant).await
    }

    pub async fn upsert(
        &self,
        id: &str,
        mut workflow: Workflow,
        tenant: Option<&str>,
    ) -> Result<Workflow, DomainError> {
        use crate::domain::storage::StorageEntity;

        workflow.set_id(id);
        workflow.validate_for_save()?;
        self.storage.upsert(id, workflow, tenant).await
    }

    pub async fn delete(&self, id: &str, tenant: Option<&str>) -> Result<bool, DomainError> {
        self.storage.delete(id, tenant).await
    }

    /// Execute a stored workflow by id
    pub async fn execute_by_id(
        &self,
        id: &str,
        payload: Value,
        credentials: Credentials,
        options: RunOptions,
        tenant: Option<&str>,
    ) -> Result<RunResult, DomainError> {
        let workflow = self
            .storage
            .get(id, tenant)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Workflow '{}' not found", id)))?;

        self.execute(workflow, payload, credentials, options, tenant)
            .await
    }

    /// Execute an inline workflow definition
    pub async fn execute(
        &self,
        workflow: Workflow,
        payload: Value,
        credentials: Credentials,
        options: RunOptions,
        tenant: Option<&str>,
    ) -> Result<RunResult, DomainError> {
        let workflow = self.resolve_config_refs(workflow, tenant).await?;

        self.executor
            .execute(&workflow, payload, credentials, options, tenant)
            .await
    }

    /// Steps may reference a stored ApiConfig by id instead of embedding
    /// one (an empty urlHost marks a reference). References are resolved
    /// and embedded as snapshots before execution, so the run's config is
    /// self-contained and acyclic.
    async fn resolve_config_refs(
        &self,
        mut workflow: Workflow,
        tenant: Option<&str>,
    ) -> Result<Workflow, DomainError> {
        for step in workflow.steps_mut() {
            if !step.api_config.url_host.is_empty() {
                continue;
            }

            let ref_id = step.api_config.id.clone();
            if ref_id.is_empty() {
                return Err(DomainError::validation(format!(
                    "Step '{}' has an apiConfig with neither urlHost nor id",
                    step.id
                )));
            }

            debug!(step_id = %step.id, config_id = %ref_id, "Resolving apiConfig reference");
            let resolved = self
                .api_configs
                .get(&ref_id, tenant)
                .await?
                .ok_or_else(|| {
                    DomainError::not_found(format!(
                        "Step '{}' references unknown API config '{}'",
                        step.id, ref_id
                    ))
                })?;

            step.api_config = resolved;
        }

        Ok(workflow)
    }
}
