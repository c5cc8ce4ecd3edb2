//! Storage factory for runtime backend selection

use std::sync::Arc;

use sqlx::PgPool;

use crate::domain::storage::{Storage, StorageEntity};
use crate::domain::DomainError;

use super::in_memory::InMemoryStorage;
use super::postgres::PostgresStorage;

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory (tests and development)
    InMemory,
    /// PostgreSQL
    Postgres,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Creates storage instances for entity kinds
pub struct StorageFactory;

impl StorageFactory {
    pub fn create_in_memory<E>() -> Arc<dyn Storage<E>>
    where
        E: StorageEntity + 'static,
    {
        Arc::new(InMemoryStorage::<E>::new())
    }

    /// PostgreSQL storage over an existing pool, with its table ensured
    pub async fn create_postgres<E>(pool: PgPool) -> Result<Arc<dyn Storage<E>>, DomainError>
    where
        E: StorageEntity + 'static,
    {
        let storage = PostgresStorage::<E>::new(pool);
        storage.ensure_table().await?;
        Ok(Arc::new(storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_from_str() {
        assert_eq!(StorageType::from_str("memory"), Some(StorageType::InMemory));
        assert_eq!(
            StorageType::from_str("in-memory"),
            Some(StorageType::InMemory)
        );
        assert_eq!(
            StorageType::from_str("POSTGRES"),
            Some(StorageType::Postgres)
        );
        assert_eq!(StorageType::from_str("pg"), Some(StorageType::Postgres));
        assert_eq!(StorageType::from_str("dynamo"), None);
    }
}
