//! JSON HTTP API, version 1

pub mod apis;
pub mod configs;
pub mod logs;
pub mod runs;
pub mod tenant;
pub mod tools;
pub mod workflows;

use axum::routing::{get, post};
use axum::Router;

use super::state::AppState;

pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        // Workflows
        .route("/workflows", get(workflows::list_workflows))
        .route("/workflows/execute", post(workflows::execute_inline_workflow))
        .route(
            "/workflows/{id}",
            get(workflows::get_workflow)
                .post(workflows::upsert_workflow)
                .delete(workflows::delete_workflow),
        )
        .route("/workflows/{id}/execute", post(workflows::execute_workflow))
        // API configs
        .route("/apis", get(apis::list_apis))
        .route(
            "/apis/{id}",
            get(apis::get_api).post(apis::upsert_api).delete(apis::delete_api),
        )
        .route("/apis/{id}/rename", post(apis::rename_api))
        // Extract / transform configs
        .route("/extracts", get(configs::list_extracts))
        .route(
            "/extracts/{id}",
            get(configs::get_extract)
                .post(configs::upsert_extract)
                .delete(configs::delete_extract),
        )
        .route("/transforms", get(configs::list_transforms))
        .route(
            "/transforms/{id}",
            get(configs::get_transform)
                .post(configs::upsert_transform)
                .delete(configs::delete_transform),
        )
        // Runs
        .route("/runs", get(runs::list_runs).delete(runs::delete_all_runs))
        .route("/runs/{id}", get(runs::get_run))
        // Tenant info
        .route(
            "/tenant",
            get(tenant::get_tenant_info).put(tenant::update_tenant_info),
        )
        // Logs and tools
        .route("/logs", get(logs::stream_logs))
        .route("/tools/schema", post(tools::generate_schema))
        .route("/tools/instructions", post(tools::generate_instructions))
        .route("/tools/expression", post(tools::validate_expression))
}
