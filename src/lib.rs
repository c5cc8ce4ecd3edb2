//! Flowgate
//!
//! An HTTP workflow orchestration engine: declarative workflows of
//! API-call steps with JSONata-style data mappings, executed against
//! external services with per-tenant persistence and a JSON HTTP API.

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use tracing::{info, warn};

use api::state::AppState;
use domain::api_config::{ApiConfig, ExtractConfig, TransformConfig};
use domain::storage::Storage;
use domain::tenant::TenantInfo;
use domain::workflow::{RunRepository, Workflow};
use infrastructure::http::{HttpCaller, HttpCallerConfig, ResponseCache};
use infrastructure::logs::RunLogStream;
use infrastructure::services::{
    ConfigService, RunService, SampleService, TenantService, WorkflowService,
};
use infrastructure::storage::{
    connect, InMemoryRunRepository, PostgresConfig, PostgresRunRepository, StorageFactory,
    StorageType,
};
use infrastructure::workflow::{StepRunner, StepRunnerConfig, WorkflowExecutorImpl};

/// Create the application state with all services wired up
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let backend = StorageType::from_str(&config.storage.backend).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown storage backend '{}': expected 'memory' or 'postgres'",
            config.storage.backend
        )
    })?;

    info!("Storage backend: {:?}", backend);

    let (workflow_storage, api_config_storage, extract_storage, transform_storage, tenant_storage, run_repository): (
        Arc<dyn Storage<Workflow>>,
        Arc<dyn Storage<ApiConfig>>,
        Arc<dyn Storage<ExtractConfig>>,
        Arc<dyn Storage<TransformConfig>>,
        Arc<dyn Storage<TenantInfo>>,
        Arc<dyn RunRepository>,
    ) = match backend {
        StorageType::Postgres => {
            let url = std::env::var("DATABASE_URL").map_err(|_| {
                anyhow::anyhow!(
                    "DATABASE_URL environment variable is required for the postgres backend"
                )
            })?;

            info!("Connecting to PostgreSQL...");
            let pool = connect(&PostgresConfig::new(url)).await?;
            info!("PostgreSQL connection established");

            let run_repository = PostgresRunRepository::new(pool.clone());
            run_repository.ensure_table().await?;

            (
                StorageFactory::create_postgres::<Workflow>(pool.clone()).await?,
                StorageFactory::create_postgres::<ApiConfig>(pool.clone()).await?,
                StorageFactory::create_postgres::<ExtractConfig>(pool.clone()).await?,
                StorageFactory::create_postgres::<TransformConfig>(pool.clone()).await?,
                StorageFactory::create_postgres::<TenantInfo>(pool).await?,
                Arc::new(run_repository),
            )
        }
        StorageType::InMemory => {
            warn!(
                "Using in-memory storage; data is lost on restart. \
                 Set APP__STORAGE__BACKEND=postgres for durable persistence."
            );
            (
                StorageFactory::create_in_memory::<Workflow>(),
                StorageFactory::create_in_memory::<ApiConfig>(),
                StorageFactory::create_in_memory::<ExtractConfig>(),
                StorageFactory::create_in_memory::<TransformConfig>(),
                StorageFactory::create_in_memory::<TenantInfo>(),
                Arc::new(InMemoryRunRepository::new()),
            )
        }
    };

    let logs = Arc::new(RunLogStream::default());

    let caller = Arc::new(HttpCaller::new(
        Arc::new(ResponseCache::default()),
        HttpCallerConfig {
            timeout_ms: config.execution.call_timeout_ms,
            retries: config.execution.call_retries,
            ..HttpCallerConfig::default()
        },
    ));

    let executor = Arc::new(WorkflowExecutorImpl::new(
        StepRunner::new(
            caller,
            StepRunnerConfig {
                loop_concurrency: config.execution.loop_concurrency,
            },
        ),
        run_repository.clone(),
        logs.clone(),
    ));

    let workflow_service = Arc::new(WorkflowService::new(
        workflow_storage,
        api_config_storage.clone(),
        executor,
    ));

    Ok(AppState {
        workflow_service,
        api_config_service: Arc::new(ConfigService::new(api_config_storage)),
        extract_service: Arc::new(ConfigService::new(extract_storage)),
        transform_service: Arc::new(ConfigService::new(transform_storage)),
        run_service: Arc::new(RunService::new(run_repository.clone())),
        tenant_service: Arc::new(TenantService::new(tenant_storage)),
        sample_service: Arc::new(SampleService::new(run_repository)),
        logs,
        auth_token: config
            .auth
            .token
            .clone()
            .or_else(|| std::env::var("AUTH_TOKEN").ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_app_state_in_memory() {
        let config = AppConfig::default();
        let state = create_app_state(&config).await.unwrap();

        assert_eq!(
            state
                .workflow_service
                .list(10, 0, None)
                .await
                .unwrap()
                .total,
            0
        );
    }

    #[tokio::test]
    async fn test_unknown_backend_fails_with_diagnostic() {
        let mut config = AppConfig::default();
        config.storage.backend = "dynamo".to_string();

        let err = create_app_state(&config).await.unwrap_err();
        assert!(err.to_string().contains("dynamo"));
    }
}
