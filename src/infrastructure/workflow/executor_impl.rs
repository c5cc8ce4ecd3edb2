//! Workflow executor implementation
//!
//! Sequences steps strictly in order, carrying the accumulated context
//! `{...payload, <step_id>: transformed}`, then applies the final
//! transform and optional response-schema validation and archives the
//! run. Each step runs under the remaining share of the caller's
//! deadline; on expiry the in-flight step is cancelled and the run is
//! marked failed with a timeout error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::workflow::{
    Credentials, RunOptions, RunRepository, RunResult, StepRunResult, Workflow, WorkflowExecutor,
};
use crate::domain::{evaluate_with_schema, DomainError};
use crate::infrastructure::logs::{LogEntry, LogLevel, RunLogStream};

use super::step_runner::StepRunner;

/// Workflow executor over a step runner and a run archive
pub struct WorkflowExecutorImpl {
    step_runner: StepRunner,
    run_repository: Arc<dyn RunRepository>,
    logs: Arc<RunLogStream>,
}

impl std::fmt::Debug for WorkflowExecutorImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutorImpl").finish()
    }
}

impl WorkflowExecutorImpl {
    pub fn new(
        step_runner: StepRunner,
        run_repository: Arc<dyn RunRepository>,
        logs: Arc<RunLogStream>,
    ) -> Self {
        Self {
            step_runner,
            run_repository,
            logs,
        }
    }

    /// Best-effort archival: a failing write is logged, never surfaced.
    async fn persist(&self, run: &RunResult, tenant: Option<&str>) {
        if let Err(e) = self.run_repository.append(run.clone(), tenant).await {
            warn!(run_id = %run.id, error = %e, "Failed to archive run result");
            self.logs.emit(
                LogEntry::new(LogLevel::Warn, format!("run archive failed: {}", e))
                    .with_run(&run.id, tenant),
            );
        }
    }
}

/// Initial context: object payloads spread into the root, null is empty,
/// anything else nests under `input`.
fn seed_context(payload: Value) -> Map<String, Value> {
    match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("input".to_string(), other);
            map
        }
    }
}

#[async_trait]
impl WorkflowExecutor for WorkflowExecutorImpl {
    async fn execute(
        &self,
        workflow: &Workflow,
        payload: Value,
        credentials: Credentials,
        options: RunOptions,
        tenant: Option<&str>,
    ) -> Result<RunResult, DomainError> {
        workflow.validate_for_execution()?;

        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let deadline = options
            .timeout_ms
            .map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));

        self.logs.emit(
            LogEntry::new(
                LogLevel::Info,
                format!(
                    "workflow '{}' started ({} steps)",
                    workflow.id(),
                    workflow.step_count()
                ),
            )
            .with_run(&run_id, tenant),
        );

        let mut ctx = seed_context(payload);
        let mut step_results: Vec<StepRunResult> = Vec::with_capacity(workflow.step_count());
        let mut run_error: Option<String> = None;

        for step in workflow.steps() {
            let result = {
                let step_future = self
                    .step_runner
                    .run(step, &ctx, &credentials, options.cache_mode, tenant);

                match deadline {
                    None => step_future.await,
                    Some(deadline) => {
                        let now = tokio::time::Instant::now();
                        if now >= deadline {
                            StepRunResult::failure(&step.id, "workflow timeout exceeded")
                        } else {
                            match tokio::time::timeout(deadline - now, step_future).await {
                                Ok(result) => result,
                                // The in-flight step future is dropped here,
                                // cancelling its outstanding HTTP calls and
                                // iterations.
                                Err(_) => {
                                    StepRunResult::failure(&step.id, "workflow timeout exceeded")
                                }
                            }
                        }
                    }
                }
            };

            let succeeded = result.success;
            self.logs.emit(
                LogEntry::new(
                    if succeeded { LogLevel::Info } else { LogLevel::Error },
                    match &result.error {
                        Some(e) => format!("step '{}' failed: {}", step.id, e),
                        None => format!("step '{}' completed", step.id),
                    },
                )
                .with_run(&run_id, tenant)
                .with_step(&step.id),
            );

            if succeeded {
                if let Some(transformed) = &result.transformed_data {
                    ctx.insert(step.id.clone(), transformed.clone());
                }
                step_results.push(result);
            } else {
                run_error = Some(format!(
                    "Step '{}' failed: {}",
                    step.id,
                    result.error.as_deref().unwrap_or("unknown error")
                ));
                step_results.push(result);
                break;
            }
        }

        // Final transform runs only when every step succeeded
        let (success, data, error) = match run_error {
            Some(error) => (false, Value::Null, Some(error)),
            None => {
                let ctx_value = Value::Object(ctx);
                let outcome = evaluate_with_schema(
                    workflow.final_transform(),
                    &ctx_value,
                    workflow.response_schema(),
                );

                (
                    outcome.success,
                    outcome.data.unwrap_or(Value::Null),
                    outcome.error,
                )
            }
        };

        let run = RunResult {
            id: run_id,
            success,
            data,
            error,
            started_at,
            completed_at: Utc::now(),
            step_results,
            config: workflow.clone(),
        };

        self.logs.emit(
            LogEntry::new(
                if run.success { LogLevel::Info } else { LogLevel::Error },
                match &run.error {
                    Some(e) => format!("workflow '{}' failed: {}", workflow.id(), e),
                    None => format!("workflow '{}' completed", workflow.id()),
                },
            )
            .with_run(&run.id, tenant),
        );

        if options.persist_results {
            self.persist(&run, tenant).await;
        }

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_config::ApiConfig;
    use crate::domain::workflow::{CacheMode, Step};
    use crate::infrastructure::http::{HttpCaller, HttpCallerConfig, ResponseCache};
    use crate::infrastructure::storage::InMemoryRunRepository;
    use crate::infrastructure::workflow::step_runner::StepRunnerConfig;
    use axum::extract::Path;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_fixture(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn executor() -> (WorkflowExecutorImpl, Arc<InMemoryRunRepository>) {
        let repository = Arc::new(InMemoryRunRepository::new());
        let caller = Arc::new(HttpCaller::new(
            Arc::new(ResponseCache::default()),
            HttpCallerConfig {
                retry_delay_ms: 5,
                ..HttpCallerConfig::default()
            },
        ));
        let executor = WorkflowExecutorImpl::new(
            StepRunner::new(caller, StepRunnerConfig::default()),
            repository.clone(),
            Arc::new(RunLogStream::default()),
        );
        (executor, repository)
    }

    /// Fixture mirroring the two dog-breeds endpoints
    fn breeds_router() -> Router {
        Router::new()
            .route(
                "/api/breeds/list/all",
                get(|| async {
                    Json(json!({
                        "message": {"akita": [], "beagle": [], "corgi": []},
                        "status": "success"
                    }))
                }),
            )
            .route(
                "/api/breed/{name}/images/random",
                get(|Path(name): Path<String>| async move {
                    Json(json!({
                        "message": format!("https://images.dog.ceo/{}.jpg", name),
                        "status": "success"
                    }))
                }),
            )
    }

    #[tokio::test]
    async fn test_two_step_breeds_workflow() {
        let host = spawn_fixture(breeds_router()).await;
        let (executor, _) = executor();

        let workflow = Workflow::new("dog-breeds")
            .with_step(
                Step::new(
                    "getAllBreeds",
                    ApiConfig::new("breeds", host.clone()).with_path("/api/breeds/list/all"),
                )
                .with_response_mapping("$keys($.message)"),
            )
            .with_step(
                Step::new(
                    "getBreedImage",
                    ApiConfig::new("image", host).with_path("/api/breed/{value}/images/random"),
                )
                .with_loop("getAllBreeds")
                .with_loop_max_iters(2),
            )
            .with_final_transform(r#"$.getBreedImage.({"breed": loopValue, "image": message})"#);

        let run = executor
            .execute(
                &workflow,
                json!({}),
                Credentials::new(),
                RunOptions::default(),
                None,
            )
            .await
            .unwrap();

        assert!(run.success, "run failed: {:?}", run.error);
        assert!(run.completed_at >= run.started_at);

        // loopMaxIters = 2 caps the fan-out at two breeds
        let data = run.data.as_array().unwrap();
        assert_eq!(data.len(), 2);
        for entry in data {
            assert!(entry["breed"].is_string());
            assert!(entry["image"].as_str().unwrap().starts_with("https://"));
        }

        assert_eq!(run.step_results.len(), 2);
        assert_eq!(run.step_results[0].step_id, "getAllBreeds");
        assert_eq!(run.step_results[1].step_id, "getBreedImage");
        assert_eq!(run.step_results[1].loop_total_items, Some(3));
        assert_eq!(run.step_results[1].loop_iterations, Some(2));
    }

    #[tokio::test]
    async fn test_empty_workflow_is_validation_error() {
        let (executor, _) = executor();

        let err = executor
            .execute(
                &Workflow::new("empty"),
                json!({}),
                Credentials::new(),
                RunOptions::default(),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_step_failure_aborts_and_skips_final_transform() {
        let host = spawn_fixture(Router::new().route(
            "/fail",
            get(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;

        let (executor, _) = executor();
        let workflow = Workflow::new("failing")
            .with_step(Step::new(
                "broken",
                ApiConfig::new("broken", host.clone()).with_path("/fail"),
            ))
            .with_step(Step::new(
                "never",
                ApiConfig::new("never", host).with_path("/fail"),
            ))
            .with_final_transform("$.never");

        let run = executor
            .execute(
                &workflow,
                json!({}),
                Credentials::new(),
                RunOptions::default(),
                None,
            )
            .await
            .unwrap();

        assert!(!run.success);
        assert_eq!(run.data, Value::Null);
        assert!(run.error.as_ref().unwrap().contains("broken"));
        // Only the failed step was driven
        assert_eq!(run.step_results.len(), 1);
    }

    #[tokio::test]
    async fn test_default_final_transform_returns_accumulated_context() {
        let host = spawn_fixture(
            Router::new().route("/n", get(|| async { Json(json!({"n": 7})) })),
        )
        .await;

        let (executor, _) = executor();
        let workflow = Workflow::new("identity").with_step(
            Step::new("fetch", ApiConfig::new("n", host).with_path("/n"))
                .with_response_mapping("$.n"),
        );

        let run = executor
            .execute(
                &workflow,
                json!({"seed": 1}),
                Credentials::new(),
                RunOptions::default(),
                None,
            )
            .await
            .unwrap();

        assert!(run.success);
        assert_eq!(run.data, json!({"seed": 1, "fetch": 7}));
    }

    #[tokio::test]
    async fn test_schema_violation_fails_run_with_data_populated() {
        let host = spawn_fixture(
            Router::new().route("/count", get(|| async { Json(json!({"count": "five"})) })),
        )
        .await;

        let (executor, _) = executor();
        let workflow = Workflow::new("schema-check")
            .with_step(Step::new(
                "fetch",
                ApiConfig::new("count", host).with_path("/count"),
            ))
            .with_final_transform("$.fetch")
            .with_response_schema(json!({
                "type": "object",
                "properties": {"count": {"type": "integer"}},
                "required": ["count"]
            }));

        let run = executor
            .execute(
                &workflow,
                json!({}),
                Credentials::new(),
                RunOptions::default(),
                None,
            )
            .await
            .unwrap();

        assert!(!run.success);
        assert_eq!(run.data, json!({"count": "five"}));
        assert!(run.error.as_ref().unwrap().contains("count"));
    }

    #[tokio::test]
    async fn test_workflow_timeout() {
        let host = spawn_fixture(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Json(json!({}))
            }),
        ))
        .await;

        let (executor, _) = executor();
        let workflow = Workflow::new("slow").with_step(Step::new(
            "wait",
            ApiConfig::new("slow", host).with_path("/slow"),
        ));

        let options = RunOptions {
            timeout_ms: Some(1_000),
            ..RunOptions::default()
        };

        let started = std::time::Instant::now();
        let run = executor
            .execute(&workflow, json!({}), Credentials::new(), options, None)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(!run.success);
        assert!(run.error.as_ref().unwrap().contains("timeout"));
        assert!(elapsed >= Duration::from_millis(900));
        assert!(elapsed < Duration::from_secs(3));

        let wall = (run.completed_at - run.started_at).num_milliseconds();
        assert!((900..3000).contains(&wall));
    }

    #[tokio::test]
    async fn test_timeout_skips_subsequent_steps() {
        let host = spawn_fixture(
            Router::new()
                .route(
                    "/slow",
                    get(|| async {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Json(json!({}))
                    }),
                )
                .route("/fast", get(|| async { Json(json!({})) })),
        )
        .await;

        let (executor, _) = executor();
        let workflow = Workflow::new("slow-chain")
            .with_step(Step::new(
                "wait",
                ApiConfig::new("slow", host.clone()).with_path("/slow"),
            ))
            .with_step(Step::new(
                "after",
                ApiConfig::new("fast", host).with_path("/fast"),
            ));

        let options = RunOptions {
            timeout_ms: Some(300),
            ..RunOptions::default()
        };

        let run = executor
            .execute(&workflow, json!({}), Credentials::new(), options, None)
            .await
            .unwrap();

        assert!(!run.success);
        // The timed-out step is recorded; the next step never started
        assert_eq!(run.step_results.len(), 1);
        assert_eq!(run.step_results[0].step_id, "wait");
    }

    #[tokio::test]
    async fn test_run_is_archived() {
        let host = spawn_fixture(
            Router::new().route("/ok", get(|| async { Json(json!({"ok": true})) })),
        )
        .await;

        let (executor, repository) = executor();
        let workflow = Workflow::new("archived").with_step(Step::new(
            "fetch",
            ApiConfig::new("ok", host).with_path("/ok"),
        ));

        let run = executor
            .execute(
                &workflow,
                json!({}),
                Credentials::new(),
                RunOptions::default(),
                Some("t1"),
            )
            .await
            .unwrap();

        let archived = repository.get(&run.id, Some("t1")).await.unwrap().unwrap();
        assert_eq!(archived.id, run.id);
        assert!(archived.success);
        assert_eq!(archived.config_id(), "archived");
    }

    #[tokio::test]
    async fn test_persistence_can_be_disabled() {
        let host = spawn_fixture(
            Router::new().route("/ok", get(|| async { Json(json!({})) })),
        )
        .await;

        let (executor, repository) = executor();
        let workflow = Workflow::new("ephemeral").with_step(Step::new(
            "fetch",
            ApiConfig::new("ok", host).with_path("/ok"),
        ));

        let options = RunOptions {
            persist_results: false,
            ..RunOptions::default()
        };

        let run = executor
            .execute(&workflow, json!({}), Credentials::new(), options, None)
            .await
            .unwrap();

        assert!(run.success);
        assert!(repository.get(&run.id, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_payload_injection_into_body() {
        let host = spawn_fixture(Router::new().route(
            "/search",
            post(|body: String| async move { Json(json!({"received": body})) }),
        ))
        .await;

        let (executor, _) = executor();
        let workflow = Workflow::new("inject")
            .with_step(Step::new(
                "search",
                ApiConfig::new("search", host)
                    .with_path("/search")
                    .with_method(crate::domain::api_config::HttpMethod::Post)
                    .with_body(r#"{"q":"{term}"}"#),
            ))
            .with_final_transform("$.search.received");

        let run = executor
            .execute(
                &workflow,
                json!({"term": "abc"}),
                Credentials::new(),
                RunOptions::default(),
                None,
            )
            .await
            .unwrap();

        assert!(run.success);
        assert_eq!(run.data, json!(r#"{"q":"abc"}"#));
    }

    #[tokio::test]
    async fn test_deterministic_repeat_runs() {
        let host = spawn_fixture(breeds_router()).await;
        let (executor, _) = executor();

        let workflow = Workflow::new("repeat")
            .with_step(
                Step::new(
                    "getAllBreeds",
                    ApiConfig::new("breeds", host).with_path("/api/breeds/list/all"),
                )
                .with_response_mapping("$keys($.message)"),
            )
            .with_final_transform("$.getAllBreeds");

        let first = executor
            .execute(
                &workflow,
                json!({}),
                Credentials::new(),
                RunOptions::default(),
                None,
            )
            .await
            .unwrap();
        let second = executor
            .execute(
                &workflow,
                json!({}),
                Credentials::new(),
                RunOptions::default(),
                None,
            )
            .await
            .unwrap();

        let transformed = |run: &RunResult| -> Vec<Option<Value>> {
            run.step_results
                .iter()
                .map(|s| s.transformed_data.clone())
                .collect()
        };
        assert_eq!(transformed(&first), transformed(&second));
        assert_eq!(first.data, second.data);
    }
}
