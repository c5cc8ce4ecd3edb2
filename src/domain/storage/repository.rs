//! Tenant-scoped storage trait

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::StorageEntity;

/// A page of listed entities with the exact total count
#[derive(Debug, Clone)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub total: usize,
}

/// Generic CRUD contract for tenant-scoped entity storage
///
/// Every read and write filters on the tenant: a `Some` tenant matches only
/// rows written under that tenant, `None` matches all rows (admin mode) —
/// the SQL-shaped predicate `tenant IS NULL OR row.tenant = tenant`.
/// Listing is limit/offset over an id-ordered scan.
#[async_trait]
pub trait Storage<E>: Send + Sync + Debug
where
    E: StorageEntity + 'static,
{
    /// Retrieves an entity by id
    async fn get(&self, id: &str, tenant: Option<&str>) -> Result<Option<E>, DomainError>;

    /// Creates or replaces an entity. Assigns `updated_at`, preserving
    /// `created_at` when the row already exists.
    async fn upsert(&self, id: &str, entity: E, tenant: Option<&str>) -> Result<E, DomainError>;

    /// Deletes an entity by id, returns true if a row was removed
    async fn delete(&self, id: &str, tenant: Option<&str>) -> Result<bool, DomainError>;

    /// Lists entities ordered by id
    async fn list(
        &self,
        limit: usize,
        offset: usize,
        tenant: Option<&str>,
    ) -> Result<Page<E>, DomainError>;
}
