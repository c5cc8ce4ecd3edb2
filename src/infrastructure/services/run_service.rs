//! Run result service

use std::sync::Arc;

use crate::domain::storage::Page;
use crate::domain::workflow::{RunRepository, RunResult};
use crate::domain::DomainError;

/// Read/delete access to archived runs
#[derive(Debug)]
pub struct RunService {
    repository: Arc<dyn RunRepository>,
}

impl RunService {
    pub fn new(repository: Arc<dyn RunRepository>) -> Self {
        Self { repository }
    }

    pub async fn get(&self, id: &str, tenant: Option<&str>) -> Result<Option<RunResult>, DomainError> {
        self.repository.get(id, tenant).await
    }

    pub async fn list(
        &self,
        limit: usize,
        offset: usize,
        tenant: Option<&str>,
        config_id: Option<&str>,
    ) -> Result<Page<RunResult>, DomainError> {
        self.repository.list(limit, offset, tenant, config_id).await
    }

    pub async fn delete_all(&self, tenant: Option<&str>) -> Result<bool, DomainError> {
        self.repository.delete_all(tenant).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::Workflow;
    use crate::infrastructure::storage::InMemoryRunRepository;
    use chrono::Utc;
    use serde_json::json;

    fn run(id: &str) -> RunResult {
        let now = Utc::now();
        RunResult {
            id: id.to_string(),
            success: true,
            data: json!({}),
            error: None,
            started_at: now,
            completed_at: now,
            step_results: vec![],
            config: Workflow::new("w"),
        }
    }

    #[tokio::test]
    async fn test_list_and_delete_all() {
        let repository = Arc::new(InMemoryRunRepository::new());
        let service = RunService::new(repository.clone());

        repository.append(run("r1"), Some("t")).await.unwrap();
        repository.append(run("r2"), Some("t")).await.unwrap();

        assert_eq!(service.list(10, 0, Some("t"), None).await.unwrap().total, 2);
        assert!(service.get("r1", Some("t")).await.unwrap().is_some());

        assert!(service.delete_all(Some("t")).await.unwrap());
        assert_eq!(service.list(10, 0, Some("t"), None).await.unwrap().total, 0);
    }
}
