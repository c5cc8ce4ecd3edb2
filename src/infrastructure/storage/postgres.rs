//! PostgreSQL storage implementation with connection pooling
//!
//! One table per entity kind: the payload is JSONB, with id, tenant and
//! timestamps as indexed columns. The tenant scope is the single predicate
//! `$n::text IS NULL OR tenant = $n` on every query; rows written without
//! a tenant store the empty string. Pool handles are held per query and
//! released on every exit path by sqlx.

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::domain::storage::{decode_id, Page, Storage, StorageEntity};
use crate::domain::workflow::{RunRepository, RunResult};
use crate::domain::DomainError;

/// PostgreSQL connection configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            connect_timeout_secs: 30,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Open a connection pool
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, DomainError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| DomainError::store(format!("Failed to connect to PostgreSQL: {}", e)))
}

fn store_tenant(tenant: Option<&str>) -> &str {
    tenant.unwrap_or("")
}

/// Generic PostgreSQL storage for one entity kind
pub struct PostgresStorage<E>
where
    E: StorageEntity,
{
    pool: PgPool,
    _phantom: PhantomData<E>,
}

impl<E> Debug for PostgresStorage<E>
where
    E: StorageEntity,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStorage")
            .field("table", &E::KIND)
            .finish()
    }
}

impl<E> PostgresStorage<E>
where
    E: StorageEntity,
{
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: PhantomData,
        }
    }

    /// Idempotent schema initialization
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        let create = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT NOT NULL,
                tenant TEXT NOT NULL DEFAULT '',
                payload JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (id, tenant)
            )
            "#,
            table = E::KIND
        );

        sqlx::query(&create)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::store(format!("Failed to create table {}: {}", E::KIND, e)))?;

        let index = format!(
            "CREATE INDEX IF NOT EXISTS {table}_tenant_idx ON {table} (tenant)",
            table = E::KIND
        );
        sqlx::query(&index)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::store(format!("Failed to index table {}: {}", E::KIND, e)))?;

        Ok(())
    }

    fn decode_row(row: &sqlx::postgres::PgRow) -> Result<E, DomainError> {
        let payload: serde_json::Value = row.get("payload");
        serde_json::from_value(payload)
            .map_err(|e| DomainError::store(format!("Failed to deserialize {}: {}", E::KIND, e)))
    }
}

#[async_trait]
impl<E> Storage<E> for PostgresStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, id: &str, tenant: Option<&str>) -> Result<Option<E>, DomainError> {
        let id = decode_id(id);
        let query = format!(
            "SELECT payload FROM {} \
             WHERE id = $1 AND ($2::text IS NULL OR tenant = $2) \
             ORDER BY tenant LIMIT 1",
            E::KIND
        );

        let row = sqlx::query(&query)
            .bind(&id)
            .bind(tenant)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::store(format!("Failed to get {}: {}", E::KIND, e)))?;

        row.as_ref().map(Self::decode_row).transpose()
    }

    async fn upsert(&self, id: &str, entity: E, tenant: Option<&str>) -> Result<E, DomainError> {
        let id = decode_id(id);
        let now = Utc::now();

        let select = format!(
            "SELECT created_at FROM {} WHERE id = $1 AND tenant = $2",
            E::KIND
        );
        let existing: Option<DateTime<Utc>> = sqlx::query(&select)
            .bind(&id)
            .bind(store_tenant(tenant))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::store(format!("Failed to read {}: {}", E::KIND, e)))?
            .map(|row| row.get("created_at"));

        let created_at = existing.unwrap_or(now);
        let mut entity = entity;
        entity.stamp(created_at, now);

        let payload = serde_json::to_value(&entity)
            .map_err(|e| DomainError::store(format!("Failed to serialize {}: {}", E::KIND, e)))?;

        let upsert = format!(
            r#"
            INSERT INTO {} (id, tenant, payload, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id, tenant)
            DO UPDATE SET payload = $3, updated_at = $5
            "#,
            E::KIND
        );

        sqlx::query(&upsert)
            .bind(&id)
            .bind(store_tenant(tenant))
            .bind(&payload)
            .bind(created_at)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::store(format!("Failed to upsert {}: {}", E::KIND, e)))?;

        Ok(entity)
    }

    async fn delete(&self, id: &str, tenant: Option<&str>) -> Result<bool, DomainError> {
        let id = decode_id(id);
        let query = format!(
            "DELETE FROM {} WHERE id = $1 AND ($2::text IS NULL OR tenant = $2)",
            E::KIND
        );

        let result = sqlx::query(&query)
            .bind(&id)
            .bind(tenant)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::store(format!("Failed to delete {}: {}", E::KIND, e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
        tenant: Option<&str>,
    ) -> Result<Page<E>, DomainError> {
        let select = format!(
            "SELECT payload FROM {} \
             WHERE ($1::text IS NULL OR tenant = $1) \
             ORDER BY id LIMIT $2 OFFSET $3",
            E::KIND
        );

        let rows = sqlx::query(&select)
            .bind(tenant)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::store(format!("Failed to list {}: {}", E::KIND, e)))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(Self::decode_row(row)?);
        }

        let count = format!(
            "SELECT COUNT(*) AS total FROM {} WHERE ($1::text IS NULL OR tenant = $1)",
            E::KIND
        );
        let total: i64 = sqlx::query(&count)
            .bind(tenant)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::store(format!("Failed to count {}: {}", E::KIND, e)))?
            .get("total");

        Ok(Page {
            items,
            total: total as usize,
        })
    }
}

/// PostgreSQL run repository
///
/// Runs keep the generic shape plus indexed `config_id` and `success`
/// columns for filtered listings.
#[derive(Debug, Clone)]
pub struct PostgresRunRepository {
    pool: PgPool,
}

impl PostgresRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT NOT NULL,
                tenant TEXT NOT NULL DEFAULT '',
                config_id TEXT NOT NULL DEFAULT '',
                success BOOLEAN NOT NULL DEFAULT FALSE,
                payload JSONB NOT NULL,
                started_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (id, tenant)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::store(format!("Failed to create runs table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS runs_tenant_config_idx ON runs (tenant, config_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::store(format!("Failed to index runs table: {}", e)))?;

        Ok(())
    }

    fn decode_row(row: &sqlx::postgres::PgRow) -> Result<RunResult, DomainError> {
        let payload: serde_json::Value = row.get("payload");
        serde_json::from_value(payload)
            .map_err(|e| DomainError::store(format!("Failed to deserialize run: {}", e)))
    }
}

#[async_trait]
impl RunRepository for PostgresRunRepository {
    async fn get(&self, id: &str, tenant: Option<&str>) -> Result<Option<RunResult>, DomainError> {
        let id = decode_id(id);

        let row = sqlx::query(
            "SELECT payload FROM runs \
             WHERE id = $1 AND ($2::text IS NULL OR tenant = $2) \
             ORDER BY tenant LIMIT 1",
        )
        .bind(&id)
        .bind(tenant)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::store(format!("Failed to get run: {}", e)))?;

        row.as_ref().map(Self::decode_row).transpose()
    }

    async fn append(&self, run: RunResult, tenant: Option<&str>) -> Result<RunResult, DomainError> {
        let payload = serde_json::to_value(&run)
            .map_err(|e| DomainError::store(format!("Failed to serialize run: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO runs (id, tenant, config_id, success, payload, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&run.id)
        .bind(store_tenant(tenant))
        .bind(run.config_id())
        .bind(run.success)
        .bind(&payload)
        .bind(run.started_at)
        .bind(run.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::store(format!("Failed to write run: {}", e)))?;

        Ok(run)
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
        tenant: Option<&str>,
        config_id: Option<&str>,
    ) -> Result<Page<RunResult>, DomainError> {
        let rows = sqlx::query(
            "SELECT payload FROM runs \
             WHERE ($1::text IS NULL OR tenant = $1) \
               AND ($2::text IS NULL OR config_id = $2) \
             ORDER BY id LIMIT $3 OFFSET $4",
        )
        .bind(tenant)
        .bind(config_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::store(format!("Failed to list runs: {}", e)))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            items.push(Self::decode_row(row)?);
        }

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM runs \
             WHERE ($1::text IS NULL OR tenant = $1) \
               AND ($2::text IS NULL OR config_id = $2)",
        )
        .bind(tenant)
        .bind(config_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::store(format!("Failed to count runs: {}", e)))?
        .get("total");

        Ok(Page {
            items,
            total: total as usize,
        })
    }

    async fn delete_all(&self, tenant: Option<&str>) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM runs WHERE ($1::text IS NULL OR tenant = $1)")
            .bind(tenant)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::store(format!("Failed to delete runs: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
