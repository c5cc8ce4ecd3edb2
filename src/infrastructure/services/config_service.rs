//! Config entity services
//!
//! ApiConfig, ExtractConfig and TransformConfig share one lifecycle
//! (get/upsert/delete/list), so a single generic service covers all
//! three; API configs additionally support id renames.

use std::sync::Arc;

use crate::domain::api_config::{validate_config_id, ApiConfig};
use crate::domain::storage::{Page, Storage, StorageEntity};
use crate::domain::DomainError;

/// Generic CRUD service over one stored entity kind
pub struct ConfigService<E>
where
    E: StorageEntity + 'static,
{
    storage: Arc<dyn Storage<E>>,
}

impl<E> std::fmt::Debug for ConfigService<E>
where
    E: StorageEntity + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigService").field("kind", &E::KIND).finish()
    }
}

impl<E> ConfigService<E>
where
    E: StorageEntity + 'static,
{
    pub fn new(storage: Arc<dyn Storage<E>>) -> Self {
        Self { storage }
    }

    pub async fn get(&self, id: &str, tenant: Option<&str>) -> Result<Option<E>, DomainError> {
        self.storage.get(id, tenant).await
    }

    pub async fn list(
        &self,
        limit: usize,
        offset: usize,
        tenant: Option<&str>,
    ) -> Result<Page<E>, DomainError> {
        self.storage.list(limit, offset, tenant).await
    }

    pub async fn upsert(
        &self,
        id: &str,
        mut entity: E,
        tenant: Option<&str>,
    ) -> Result<E, DomainError> {
        validate_config_id(id)?;
        entity.set_id(id);
        self.storage.upsert(id, entity, tenant).await
    }

    pub async fn delete(&self, id: &str, tenant: Option<&str>) -> Result<bool, DomainError> {
        self.storage.delete(id, tenant).await
    }
}

impl ConfigService<ApiConfig> {
    /// Move a config to a new id, keeping its payload. The old row is
    /// removed; steps referencing the old id must be updated by callers.
    pub async fn rename(
        &self,
        old_id: &str,
        new_id: &str,
        tenant: Option<&str>,
    ) -> Result<ApiConfig, DomainError> {
        validate_config_id(new_id)?;

        let existing = self.storage.get(old_id, tenant).await?.ok_or_else(|| {
            DomainError::not_found(format!("API config '{}' not found", old_id))
        })?;

        if self.storage.get(new_id, tenant).await?.is_some() {
            return Err(DomainError::validation(format!(
                "API config '{}' already exists",
                new_id
            )));
        }

        let mut renamed = existing;
        renamed.set_id(new_id);
        let saved = self.storage.upsert(new_id, renamed, tenant).await?;
        self.storage.delete(old_id, tenant).await?;

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_config::TransformConfig;
    use crate::infrastructure::storage::InMemoryStorage;

    fn api_service() -> ConfigService<ApiConfig> {
        ConfigService::new(Arc::new(InMemoryStorage::<ApiConfig>::new()))
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let service = api_service();

        let saved = service
            .upsert(
                "dog-api",
                ApiConfig::new("whatever", "https://dog.ceo"),
                Some("t1"),
            )
            .await
            .unwrap();

        // The path id wins over the payload id
        assert_eq!(saved.id, "dog-api");

        let fetched = service.get("dog-api", Some("t1")).await.unwrap().unwrap();
        assert_eq!(fetched.url_host, "https://dog.ceo");
    }

    #[tokio::test]
    async fn test_invalid_id_rejected() {
        let service = api_service();

        let err = service
            .upsert("bad id!", ApiConfig::new("x", "https://x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_rename() {
        let service = api_service();
        service
            .upsert("old-name", ApiConfig::new("old-name", "https://x"), Some("t"))
            .await
            .unwrap();

        let renamed = service.rename("old-name", "new-name", Some("t")).await.unwrap();
        assert_eq!(renamed.id, "new-name");

        assert!(service.get("old-name", Some("t")).await.unwrap().is_none());
        assert!(service.get("new-name", Some("t")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rename_missing_or_conflicting() {
        let service = api_service();
        service
            .upsert("a", ApiConfig::new("a", "https://x"), None)
            .await
            .unwrap();
        service
            .upsert("b", ApiConfig::new("b", "https://x"), None)
            .await
            .unwrap();

        let err = service.rename("ghost", "c", None).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        let err = service.rename("a", "b", None).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_generic_service_other_kinds() {
        let service: ConfigService<TransformConfig> =
            ConfigService::new(Arc::new(InMemoryStorage::<TransformConfig>::new()));

        let transform = TransformConfig {
            id: String::new(),
            instruction: Some("flatten".to_string()),
            response_mapping: Some("$.items".to_string()),
            response_schema: None,
            created_at: None,
            updated_at: None,
        };

        service.upsert("flatten", transform, Some("t")).await.unwrap();

        let page = service.list(10, 0, Some("t")).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, "flatten");
    }
}
