//! Run-result repository contract

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::storage::Page;
use crate::domain::DomainError;

use super::run::RunResult;

/// Storage contract for run records
///
/// Runs are written once at the end of execution and never updated. The
/// listing can be narrowed to runs of one workflow via `config_id`.
#[async_trait]
pub trait RunRepository: Send + Sync + Debug {
    async fn get(&self, id: &str, tenant: Option<&str>) -> Result<Option<RunResult>, DomainError>;

    async fn append(&self, run: RunResult, tenant: Option<&str>) -> Result<RunResult, DomainError>;

    async fn list(
        &self,
        limit: usize,
        offset: usize,
        tenant: Option<&str>,
        config_id: Option<&str>,
    ) -> Result<Page<RunResult>, DomainError>;

    /// Remove every run visible under the tenant scope
    async fn delete_all(&self, tenant: Option<&str>) -> Result<bool, DomainError>;
}
