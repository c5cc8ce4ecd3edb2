//! Single-step execution
//!
//! Drives one DIRECT or LOOP step against the accumulated context: input
//! mapping, HTTP call, response mapping. LOOP iterations run concurrently
//! with a bounded fan-out; results keep the input order regardless of
//! completion order, and the first failing iteration fails the step.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::workflow::{CacheMode, Credentials, ExecutionMode, Step, StepRunResult};
use crate::domain::{evaluate, DomainError};
use crate::infrastructure::http::HttpCaller;

/// Step runner configuration
#[derive(Debug, Clone)]
pub struct StepRunnerConfig {
    /// Concurrent LOOP iterations in flight
    pub loop_concurrency: usize,
}

impl Default for StepRunnerConfig {
    fn default() -> Self {
        Self { loop_concurrency: 4 }
    }
}

/// Executes one step against an accumulated context
#[derive(Debug)]
pub struct StepRunner {
    caller: Arc<HttpCaller>,
    config: StepRunnerConfig,
}

impl StepRunner {
    pub fn new(caller: Arc<HttpCaller>, config: StepRunnerConfig) -> Self {
        Self { caller, config }
    }

    pub async fn run(
        &self,
        step: &Step,
        ctx: &Map<String, Value>,
        credentials: &Credentials,
        cache_mode: CacheMode,
        tenant: Option<&str>,
    ) -> StepRunResult {
        match step.execution_mode {
            ExecutionMode::Direct => self
                .run_direct(step, ctx, credentials, cache_mode, tenant)
                .await,
            ExecutionMode::Loop => {
                self.run_loop(step, ctx, credentials, cache_mode, tenant)
                    .await
            }
        }
    }

    async fn run_direct(
        &self,
        step: &Step,
        ctx: &Map<String, Value>,
        credentials: &Credentials,
        cache_mode: CacheMode,
        tenant: Option<&str>,
    ) -> StepRunResult {
        let ctx_value = Value::Object(ctx.clone());

        match self
            .invoke(step, &ctx_value, credentials, cache_mode, tenant)
            .await
        {
            Ok((raw, transformed)) => StepRunResult::success(&step.id, raw, transformed),
            Err(e) => StepRunResult::failure(&step.id, e.to_string()),
        }
    }

    async fn run_loop(
        &self,
        step: &Step,
        ctx: &Map<String, Value>,
        credentials: &Credentials,
        cache_mode: CacheMode,
        tenant: Option<&str>,
    ) -> StepRunResult {
        let ctx_value = Value::Object(ctx.clone());

        let selector = match &step.loop_selector {
            Some(expr) => expr,
            None => {
                return StepRunResult::failure(
                    &step.id,
                    DomainError::validation(format!(
                        "LOOP step '{}' has no loopSelector",
                        step.id
                    ))
                    .to_string(),
                );
            }
        };

        let selected = match evaluate(selector, &ctx_value) {
            Ok(v) => v,
            Err(e) => return StepRunResult::failure(&step.id, e.to_string()),
        };

        // Single values act as one-element sequences; null/absent is empty
        let mut items = match selected {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            single => vec![single],
        };

        let total_items = items.len();
        if let Some(max) = step.loop_max_iters {
            if items.len() > max {
                debug!(
                    step_id = %step.id,
                    total_items,
                    max,
                    "Truncating loop items to loopMaxIters"
                );
                items.truncate(max);
            }
        }
        let iterations = items.len();

        let results: Result<Vec<(Value, Value)>, DomainError> = stream::iter(
            items.into_iter().enumerate().map(|(index, item)| {
                let iter_ctx = iteration_context(ctx, item, index);
                async move {
                    self.invoke(step, &iter_ctx, credentials, cache_mode, tenant)
                        .await
                }
            }),
        )
        .buffered(self.config.loop_concurrency.max(1))
        .try_collect()
        .await;

        match results {
            Ok(pairs) => {
                let (raws, transformed): (Vec<Value>, Vec<Value>) = pairs.into_iter().unzip();
                StepRunResult::success(&step.id, Value::Array(raws), Value::Array(transformed))
                    .with_loop_counts(total_items, iterations)
            }
            Err(e) => StepRunResult::failure(&step.id, e.to_string())
                .with_loop_counts(total_items, iterations),
        }
    }

    /// One input-map / call / response-map cycle
    async fn invoke(
        &self,
        step: &Step,
        ctx: &Value,
        credentials: &Credentials,
        cache_mode: CacheMode,
        tenant: Option<&str>,
    ) -> Result<(Value, Value), DomainError> {
        let input = evaluate(step.input_mapping.as_deref().unwrap_or("$"), ctx)?;

        let outcome = self
            .caller
            .call(&step.api_config, &input, credentials, cache_mode, tenant)
            .await?;

        let mapping_ctx = response_context(&outcome.data, ctx);
        let transformed = evaluate(
            step.response_mapping.as_deref().unwrap_or("$"),
            &mapping_ctx,
        )?;

        Ok((outcome.data, transformed))
    }
}

/// Context for one loop iteration: the accumulated context plus the
/// current item (as both `value` and `loopValue`) and its index.
fn iteration_context(ctx: &Map<String, Value>, item: Value, index: usize) -> Value {
    let mut iter_ctx = ctx.clone();
    iter_ctx.insert("value".to_string(), item.clone());
    iter_ctx.insert("loopValue".to_string(), item);
    iter_ctx.insert("loopIndex".to_string(), Value::from(index));
    Value::Object(iter_ctx)
}

/// Context the response mapping evaluates against. Object payloads are
/// merged with the iteration variables (payload fields win) so mappings
/// and the final transform can reference `loopValue`/`loopIndex`;
/// non-object payloads pass through unchanged.
fn response_context(raw: &Value, call_ctx: &Value) -> Value {
    let payload = match raw {
        Value::Object(map) => map,
        _ => return raw.clone(),
    };

    let mut merged = Map::new();
    if let Value::Object(ctx) = call_ctx {
        for name in ["loopValue", "loopIndex"] {
            if let Some(v) = ctx.get(name) {
                merged.insert(name.to_string(), v.clone());
            }
        }
    }
    for (k, v) in payload {
        merged.insert(k.clone(), v.clone());
    }

    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_config::{ApiConfig, HttpMethod};
    use crate::infrastructure::http::{HttpCallerConfig, ResponseCache};
    use axum::extract::Path;
    use axum::routing::get;
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

    fn runner() -> StepRunner {
        StepRunner::new(
            Arc::new(HttpCaller::new(
                Arc::new(ResponseCache::default()),
                HttpCallerConfig {
                    retry_delay_ms: 5,
                    ..HttpCallerConfig::default()
                },
            )),
            StepRunnerConfig::default(),
        )
    }

    fn ctx(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_direct_step_with_mappings() {
        let host = spawn_fixture(Router::new().route(
            "/breeds",
            get(|| async {
                Json(json!({"message": {"beagle": [], "pug": []}, "status": "success"}))
            }),
        ))
        .await;

        let step = Step::new("getAllBreeds", ApiConfig::new("breeds", host).with_path("/breeds"))
            .with_response_mapping("$keys($.message)");

        let result = runner()
            .run(
                &step,
                &ctx(json!({})),
                &Credentials::new(),
                CacheMode::Disabled,
                None,
            )
            .await;

        assert!(result.success);
        assert_eq!(result.transformed_data, Some(json!(["beagle", "pug"])));
        assert_eq!(result.raw_data.as_ref().unwrap()["status"], "success");
        assert!(result.loop_total_items.is_none());
    }

    #[tokio::test]
    async fn test_direct_step_http_failure() {
        let host = spawn_fixture(Router::new().route(
            "/gone",
            get(|| async { axum::http::StatusCode::NOT_FOUND }),
        ))
        .await;

        let step = Step::new("fetch", ApiConfig::new("gone", host).with_path("/gone"));

        let result = runner()
            .run(
                &step,
                &ctx(json!({})),
                &Credentials::new(),
                CacheMode::Disabled,
                None,
            )
            .await;

        assert!(!result.success);
        assert!(result.error.as_ref().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_loop_preserves_input_order() {
        // Earlier items respond slower, so completion order is reversed;
        // output order must still match input order.
        let host = spawn_fixture(Router::new().route(
            "/breed/{name}",
            get(|Path(name): Path<String>| async move {
                let delay = match name.as_str() {
                    "akita" => 120,
                    "beagle" => 60,
                    _ => 5,
                };
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                Json(json!({"message": format!("https://img/{}.jpg", name)}))
            }),
        ))
        .await;

        let step = Step::new(
            "getBreedImage",
            ApiConfig::new("image", host).with_path("/breed/{value}"),
        )
        .with_loop("breeds");

        let result = runner()
            .run(
                &step,
                &ctx(json!({"breeds": ["akita", "beagle", "corgi"]})),
                &Credentials::new(),
                CacheMode::Disabled,
                None,
            )
            .await;

        assert!(result.success);
        let transformed = result.transformed_data.unwrap();
        let urls: Vec<&str> = transformed
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["message"].as_str().unwrap())
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://img/akita.jpg",
                "https://img/beagle.jpg",
                "https://img/corgi.jpg"
            ]
        );
        assert_eq!(result.loop_total_items, Some(3));
        assert_eq!(result.loop_iterations, Some(3));
    }

    #[tokio::test]
    async fn test_loop_max_iters_truncates_observably() {
        let host = spawn_fixture(Router::new().route(
            "/breed/{name}",
            get(|Path(name): Path<String>| async move { Json(json!({"message": name})) }),
        ))
        .await;

        let step = Step::new(
            "images",
            ApiConfig::new("image", host).with_path("/breed/{value}"),
        )
        .with_loop("breeds")
        .with_loop_max_iters(2);

        let result = runner()
            .run(
                &step,
                &ctx(json!({"breeds": ["a", "b", "c", "d"]})),
                &Credentials::new(),
                CacheMode::Disabled,
                None,
            )
            .await;

        assert!(result.success);
        assert_eq!(result.transformed_data.unwrap().as_array().unwrap().len(), 2);
        assert_eq!(result.loop_total_items, Some(4));
        assert_eq!(result.loop_iterations, Some(2));
    }

    #[tokio::test]
    async fn test_loop_over_empty_selector_succeeds_with_empty_array() {
        let step = Step::new(
            "images",
            ApiConfig::new("image", "http://unused.invalid").with_path("/breed/{value}"),
        )
        .with_loop("breeds");

        let result = runner()
            .run(
                &step,
                &ctx(json!({})),
                &Credentials::new(),
                CacheMode::Disabled,
                None,
            )
            .await;

        assert!(result.success);
        assert_eq!(result.transformed_data, Some(json!([])));
        assert_eq!(result.raw_data, Some(json!([])));
        assert_eq!(result.loop_total_items, Some(0));
    }

    #[tokio::test]
    async fn test_loop_coerces_single_value() {
        let host = spawn_fixture(Router::new().route(
            "/breed/{name}",
            get(|Path(name): Path<String>| async move { Json(json!({"message": name})) }),
        ))
        .await;

        let step = Step::new(
            "images",
            ApiConfig::new("image", host).with_path("/breed/{value}"),
        )
        .with_loop("breed");

        let result = runner()
            .run(
                &step,
                &ctx(json!({"breed": "pug"})),
                &Credentials::new(),
                CacheMode::Disabled,
                None,
            )
            .await;

        assert!(result.success);
        assert_eq!(result.loop_iterations, Some(1));
    }

    #[tokio::test]
    async fn test_loop_iteration_failure_fails_step() {
        let host = spawn_fixture(Router::new().route(
            "/breed/{name}",
            get(|Path(name): Path<String>| async move {
                if name == "bad" {
                    Err(axum::http::StatusCode::NOT_FOUND)
                } else {
                    Ok(Json(json!({"message": name})))
                }
            }),
        ))
        .await;

        let step = Step::new(
            "images",
            ApiConfig::new("image", host).with_path("/breed/{value}"),
        )
        .with_loop("breeds");

        let result = runner()
            .run(
                &step,
                &ctx(json!({"breeds": ["ok", "bad", "fine"]})),
                &Credentials::new(),
                CacheMode::Disabled,
                None,
            )
            .await;

        assert!(!result.success);
        assert!(result.error.as_ref().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_loop_variables_visible_in_response_mapping() {
        let host = spawn_fixture(Router::new().route(
            "/breed/{name}",
            get(|Path(name): Path<String>| async move {
                Json(json!({"message": format!("https://img/{}.jpg", name)}))
            }),
        ))
        .await;

        let step = Step::new(
            "images",
            ApiConfig::new("image", host).with_path("/breed/{value}"),
        )
        .with_loop("breeds")
        .with_response_mapping(r#"{"breed": loopValue, "index": loopIndex, "image": message}"#);

        let result = runner()
            .run(
                &step,
                &ctx(json!({"breeds": ["pug"]})),
                &Credentials::new(),
                CacheMode::Disabled,
                None,
            )
            .await;

        assert!(result.success);
        assert_eq!(
            result.transformed_data,
            Some(json!([{"breed": "pug", "index": 0, "image": "https://img/pug.jpg"}]))
        );
    }

    #[tokio::test]
    async fn test_input_mapping_shapes_call_input() {
        let host = spawn_fixture(Router::new().route(
            "/echo/{q}",
            get(|Path(q): Path<String>| async move { Json(json!({"echo": q})) }),
        ))
        .await;

        let step = Step::new(
            "echo",
            ApiConfig::new("echo", host)
                .with_path("/echo/{q}")
                .with_method(HttpMethod::Get),
        )
        .with_input_mapping(r#"{"q": term}"#);

        let result = runner()
            .run(
                &step,
                &ctx(json!({"term": "hello"})),
                &Credentials::new(),
                CacheMode::Disabled,
                None,
            )
            .await;

        assert!(result.success);
        assert_eq!(result.raw_data.unwrap()["echo"], "hello");
    }
}
