//! In-memory storage implementation
//!
//! Backs tests and development runs. Rows are keyed by (id, tenant) so the
//! same id can exist under different tenants, matching the durable
//! backends.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::storage::{decode_id, Page, Storage, StorageEntity};
use crate::domain::workflow::{RunRepository, RunResult};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
struct StoredRow<E> {
    tenant: Option<String>,
    entity: E,
}

fn tenant_matches(row_tenant: Option<&str>, scope: Option<&str>) -> bool {
    match scope {
        None => true,
        Some(t) => row_tenant == Some(t),
    }
}

/// Thread-safe in-memory storage
#[derive(Debug)]
pub struct InMemoryStorage<E>
where
    E: StorageEntity,
{
    rows: RwLock<HashMap<(String, String), StoredRow<E>>>,
}

impl<E> Default for InMemoryStorage<E>
where
    E: StorageEntity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InMemoryStorage<E>
where
    E: StorageEntity,
{
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }

    fn key(id: &str, tenant: Option<&str>) -> (String, String) {
        (id.to_string(), tenant.unwrap_or("").to_string())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<(String, String), StoredRow<E>>>, DomainError>
    {
        self.rows
            .read()
            .map_err(|e| DomainError::store(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<(String, String), StoredRow<E>>>, DomainError>
    {
        self.rows
            .write()
            .map_err(|e| DomainError::store(format!("Failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl<E> Storage<E> for InMemoryStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, id: &str, tenant: Option<&str>) -> Result<Option<E>, DomainError> {
        let id = decode_id(id);
        let rows = self.read()?;

        match tenant {
            Some(t) => Ok(rows
                .get(&Self::key(&id, Some(t)))
                .map(|row| row.entity.clone())),
            None => {
                // Admin scope: any tenant's row with this id, lowest
                // tenant key first for determinism.
                let mut matches: Vec<_> =
                    rows.iter().filter(|((row_id, _), _)| *row_id == id).collect();
                matches.sort_by(|a, b| a.0 .1.cmp(&b.0 .1));
                Ok(matches.first().map(|(_, row)| row.entity.clone()))
            }
        }
    }

    async fn upsert(&self, id: &str, entity: E, tenant: Option<&str>) -> Result<E, DomainError> {
        let id = decode_id(id);
        let key = Self::key(&id, tenant);
        let now = Utc::now();

        let mut rows = self.write()?;
        let created_at = rows
            .get(&key)
            .and_then(|existing| existing.entity.created_at())
            .unwrap_or(now);

        let mut entity = entity;
        entity.stamp(created_at, now);

        rows.insert(
            key,
            StoredRow {
                tenant: tenant.map(|t| t.to_string()),
                entity: entity.clone(),
            },
        );

        Ok(entity)
    }

    async fn delete(&self, id: &str, tenant: Option<&str>) -> Result<bool, DomainError> {
        let id = decode_id(id);
        let mut rows = self.write()?;

        match tenant {
            Some(t) => Ok(rows.remove(&Self::key(&id, Some(t))).is_some()),
            None => {
                let before = rows.len();
                rows.retain(|(row_id, _), _| *row_id != id);
                Ok(rows.len() < before)
            }
        }
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
        tenant: Option<&str>,
    ) -> Result<Page<E>, DomainError> {
        let rows = self.read()?;

        let mut matching: Vec<&StoredRow<E>> = rows
            .values()
            .filter(|row| tenant_matches(row.tenant.as_deref(), tenant))
            .collect();
        matching.sort_by(|a, b| a.entity.id().cmp(b.entity.id()));

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| row.entity.clone())
            .collect();

        Ok(Page { items, total })
    }
}

/// In-memory run repository, sharing the generic storage and adding the
/// config filter and bulk delete runs need.
#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    storage: InMemoryStorage<RunResult>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn get(&self, id: &str, tenant: Option<&str>) -> Result<Option<RunResult>, DomainError> {
        self.storage.get(id, tenant).await
    }

    async fn append(&self, run: RunResult, tenant: Option<&str>) -> Result<RunResult, DomainError> {
        let id = run.id.clone();
        self.storage.upsert(&id, run, tenant).await
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
        tenant: Option<&str>,
        config_id: Option<&str>,
    ) -> Result<Page<RunResult>, DomainError> {
        let all = self.storage.list(usize::MAX, 0, tenant).await?;

        let matching: Vec<RunResult> = all
            .items
            .into_iter()
            .filter(|run| config_id.map(|c| run.config_id() == c).unwrap_or(true))
            .collect();

        let total = matching.len();
        let items = matching.into_iter().skip(offset).take(limit).collect();

        Ok(Page { items, total })
    }

    async fn delete_all(&self, tenant: Option<&str>) -> Result<bool, DomainError> {
        let all = self.storage.list(usize::MAX, 0, tenant).await?;
        let mut any = false;

        for run in all.items {
            any |= self.storage.delete(&run.id, tenant).await?;
        }

        Ok(any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_config::ApiConfig;
    use crate::domain::workflow::{StepRunResult, Workflow};
    use serde_json::json;

    fn config(id: &str) -> ApiConfig {
        ApiConfig::new(id, "https://example.invalid")
    }

    #[tokio::test]
    async fn test_round_trip() {
        let storage = InMemoryStorage::<ApiConfig>::new();

        storage
            .upsert("c1", config("c1"), Some("t1"))
            .await
            .unwrap();

        let fetched = storage.get("c1", Some("t1")).await.unwrap().unwrap();
        assert_eq!(fetched.id, "c1");
        assert!(fetched.created_at.is_some());

        assert!(storage.delete("c1", Some("t1")).await.unwrap());
        assert!(storage.get("c1", Some("t1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_preserves_created_at() {
        let storage = InMemoryStorage::<ApiConfig>::new();

        let first = storage
            .upsert("c1", config("c1"), Some("t1"))
            .await
            .unwrap();
        let created = first.created_at.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let second = storage
            .upsert("c1", config("c1"), Some("t1"))
            .await
            .unwrap();

        assert_eq!(second.created_at, Some(created));
        assert!(second.updated_at.unwrap() > created);
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let storage = InMemoryStorage::<ApiConfig>::new();
        storage
            .upsert("c1", config("c1"), Some("t1"))
            .await
            .unwrap();

        // A different tenant sees nothing
        assert!(storage.get("c1", Some("t2")).await.unwrap().is_none());
        let page = storage.list(10, 0, Some("t2")).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);

        // The owning tenant and the admin scope both see the row
        assert!(storage.get("c1", Some("t1")).await.unwrap().is_some());
        assert!(storage.get("c1", None).await.unwrap().is_some());
        assert_eq!(storage.list(10, 0, None).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_same_id_under_two_tenants() {
        let storage = InMemoryStorage::<ApiConfig>::new();
        storage
            .upsert("shared", config("shared"), Some("t1"))
            .await
            .unwrap();
        storage
            .upsert("shared", config("shared"), Some("t2"))
            .await
            .unwrap();

        assert_eq!(storage.list(10, 0, None).await.unwrap().total, 2);
        assert_eq!(storage.list(10, 0, Some("t1")).await.unwrap().total, 1);

        // Tenant-scoped delete removes only that tenant's row
        assert!(storage.delete("shared", Some("t1")).await.unwrap());
        assert!(storage.get("shared", Some("t2")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_is_id_ordered_with_exact_total() {
        let storage = InMemoryStorage::<ApiConfig>::new();
        for id in ["charlie", "alpha", "bravo"] {
            storage.upsert(id, config(id), Some("t")).await.unwrap();
        }

        let page = storage.list(2, 0, Some("t")).await.unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<_> = page.items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "bravo"]);

        let page = storage.list(2, 2, Some("t")).await.unwrap();
        assert_eq!(page.items[0].id, "charlie");
    }

    #[tokio::test]
    async fn test_ids_are_url_decoded() {
        let storage = InMemoryStorage::<ApiConfig>::new();
        storage
            .upsert("my config", config("my config"), Some("t"))
            .await
            .unwrap();

        assert!(storage
            .get("my%20config", Some("t"))
            .await
            .unwrap()
            .is_some());
    }

    fn run(id: &str, workflow_id: &str) -> RunResult {
        let now = Utc::now();
        RunResult {
            id: id.to_string(),
            success: true,
            data: json!(null),
            error: None,
            started_at: now,
            completed_at: now,
            step_results: vec![StepRunResult::success("s", json!({}), json!({}))],
            config: Workflow::new(workflow_id),
        }
    }

    #[tokio::test]
    async fn test_run_repository_config_filter() {
        let repo = InMemoryRunRepository::new();
        repo.append(run("r1", "w1"), Some("t")).await.unwrap();
        repo.append(run("r2", "w2"), Some("t")).await.unwrap();
        repo.append(run("r3", "w1"), Some("t")).await.unwrap();

        let page = repo.list(10, 0, Some("t"), Some("w1")).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|r| r.config_id() == "w1"));

        let page = repo.list(10, 0, Some("t"), None).await.unwrap();
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_run_repository_delete_all_scoped() {
        let repo = InMemoryRunRepository::new();
        repo.append(run("r1", "w"), Some("t1")).await.unwrap();
        repo.append(run("r2", "w"), Some("t2")).await.unwrap();

        assert!(repo.delete_all(Some("t1")).await.unwrap());

        assert_eq!(repo.list(10, 0, Some("t1"), None).await.unwrap().total, 0);
        assert_eq!(repo.list(10, 0, Some("t2"), None).await.unwrap().total, 1);
    }
}
