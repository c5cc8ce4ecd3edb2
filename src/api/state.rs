//! Application state for shared services

use std::sync::Arc;

use crate::domain::api_config::{ApiConfig, ExtractConfig, TransformConfig};
use crate::infrastructure::logs::RunLogStream;
use crate::infrastructure::services::{
    ConfigService, RunService, SampleService, TenantService, WorkflowService,
};

/// Shared services handed to every request handler
#[derive(Clone, Debug)]
pub struct AppState {
    pub workflow_service: Arc<WorkflowService>,
    pub api_config_service: Arc<ConfigService<ApiConfig>>,
    pub extract_service: Arc<ConfigService<ExtractConfig>>,
    pub transform_service: Arc<ConfigService<TransformConfig>>,
    pub run_service: Arc<RunService>,
    pub tenant_service: Arc<TenantService>,
    pub sample_service: Arc<SampleService>,
    pub logs: Arc<RunLogStream>,

    /// Expected gateway bearer token; unset disables the check
    pub auth_token: Option<String>,
}
