//! Tenant info service

use std::sync::Arc;

use crate::domain::storage::Storage;
use crate::domain::tenant::{TenantInfo, TENANT_INFO_ID};
use crate::domain::DomainError;

/// Reads and updates the per-tenant administrative record
#[derive(Debug)]
pub struct TenantService {
    storage: Arc<dyn Storage<TenantInfo>>,
}

impl TenantService {
    pub fn new(storage: Arc<dyn Storage<TenantInfo>>) -> Self {
        Self { storage }
    }

    /// The tenant's record, or defaults when none has been written
    pub async fn get(&self, tenant: Option<&str>) -> Result<TenantInfo, DomainError> {
        Ok(self
            .storage
            .get(TENANT_INFO_ID, tenant)
            .await?
            .unwrap_or_default())
    }

    pub async fn update(
        &self,
        email: Option<String>,
        email_entry_skipped: Option<bool>,
        tenant: Option<&str>,
    ) -> Result<TenantInfo, DomainError> {
        let mut info = self.get(tenant).await?;

        if let Some(email) = email {
            info.email = Some(email);
        }
        if let Some(skipped) = email_entry_skipped {
            info.email_entry_skipped = skipped;
        }

        self.storage.upsert(TENANT_INFO_ID, info, tenant).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStorage;

    fn service() -> TenantService {
        TenantService::new(Arc::new(InMemoryStorage::<TenantInfo>::new()))
    }

    #[tokio::test]
    async fn test_get_defaults_when_absent() {
        let info = service().get(Some("t1")).await.unwrap();
        assert!(info.email.is_none());
        assert!(!info.email_entry_skipped);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let service = service();

        service
            .update(Some("ops@example.com".to_string()), None, Some("t1"))
            .await
            .unwrap();
        let info = service
            .update(None, Some(true), Some("t1"))
            .await
            .unwrap();

        assert_eq!(info.email.as_deref(), Some("ops@example.com"));
        assert!(info.email_entry_skipped);
    }

    #[tokio::test]
    async fn test_tenants_do_not_share_info() {
        let service = service();

        service
            .update(Some("a@example.com".to_string()), None, Some("t1"))
            .await
            .unwrap();

        let other = service.get(Some("t2")).await.unwrap();
        assert!(other.email.is_none());
    }
}
