//! HTTP request materialization and execution
//!
//! Turns an ApiConfig plus a bound input value into one or more HTTP
//! requests: placeholder substitution, auth injection, retries with
//! backoff, content-type aware decoding, `dataPath` descent and page
//! concatenation. The shared response cache is consulted according to the
//! run's cache mode.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::domain::api_config::{ApiConfig, HttpMethod, PaginationType};
use crate::domain::workflow::{CacheMode, Credentials};
use crate::domain::DomainError;

use super::cache::{fingerprint, CachedResponse, FingerprintParts, ResponseCache};
use super::pagination::{apply_page_params, next_state, PageState};
use super::template::{has_placeholders, render_template};

/// Defaults applied when an ApiConfig does not override them
#[derive(Debug, Clone)]
pub struct HttpCallerConfig {
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,

    /// Retry count for transient failures (status >= 500, transport errors)
    pub retries: u32,

    /// Base delay between retries; grows linearly with the attempt number
    pub retry_delay_ms: u64,

    /// Runaway guard for pagination loops
    pub max_pages: usize,
}

impl Default for HttpCallerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            retries: 2,
            retry_delay_ms: 250,
            max_pages: 500,
        }
    }
}

/// Result of a (possibly paginated) call
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub data: Value,
    pub pages_fetched: usize,
    pub last_status: u16,
}

/// Materialized request parts, ready to send
struct PreparedRequest {
    url: String,
    headers: Vec<(String, String)>,
    query: HashMap<String, String>,
    body: Option<String>,
}

/// Executes API configs against external services
pub struct HttpCaller {
    client: reqwest::Client,
    cache: Arc<ResponseCache>,
    config: HttpCallerConfig,
}

impl std::fmt::Debug for HttpCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCaller")
            .field("config", &self.config)
            .finish()
    }
}

impl HttpCaller {
    pub fn new(cache: Arc<ResponseCache>, config: HttpCallerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache,
            config,
        }
    }

    /// Execute one API config against an input value.
    ///
    /// Pagination (when configured) fetches until the strategy's stop
    /// signal and concatenates decoded array pages into one sequence.
    pub async fn call(
        &self,
        api: &ApiConfig,
        input: &Value,
        credentials: &Credentials,
        cache_mode: CacheMode,
        tenant: Option<&str>,
    ) -> Result<CallOutcome, DomainError> {
        let prepared = self.prepare(api, input, credentials)?;

        let header_pairs: Vec<(String, String)> = prepared.headers.clone();
        let query_pairs: Vec<(String, String)> = {
            let mut pairs: Vec<(String, String)> = prepared
                .query
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            pairs.sort();
            pairs
        };
        let key = fingerprint(
            &FingerprintParts {
                tenant,
                method: api.method.as_str(),
                url: &prepared.url,
                headers: &header_pairs,
                query: &query_pairs,
                body: prepared.body.as_deref(),
            },
            credentials,
        );

        if matches!(cache_mode, CacheMode::Enabled | CacheMode::Readonly) {
            if let Some(hit) = self.cache.get(&key).await {
                debug!(url = %prepared.url, "Response cache hit");
                return Ok(CallOutcome {
                    data: hit.data,
                    pages_fetched: hit.pages_fetched,
                    last_status: hit.last_status,
                });
            }
        }

        let outcome = self.fetch_all(api, &prepared).await?;

        if matches!(cache_mode, CacheMode::Enabled | CacheMode::Writeonly) {
            self.cache
                .put(
                    key,
                    CachedResponse {
                        data: outcome.data.clone(),
                        pages_fetched: outcome.pages_fetched,
                        last_status: outcome.last_status,
                    },
                )
                .await;
        }

        Ok(outcome)
    }

    /// Substitute placeholders and apply authentication
    fn prepare(
        &self,
        api: &ApiConfig,
        input: &Value,
        credentials: &Credentials,
    ) -> Result<PreparedRequest, DomainError> {
        let host = render_template(&api.url_host, input, credentials)?;
        let path = render_template(&api.url_path, input, credentials)?;
        let url = compose_url(&host, &path);

        let mut headers = Vec::with_capacity(api.headers.len() + 1);
        for (name, value) in &api.headers {
            headers.push((name.clone(), render_template(value, input, credentials)?));
        }

        let mut query = HashMap::with_capacity(api.query_params.len());
        for (name, value) in &api.query_params {
            query.insert(name.clone(), render_template(value, input, credentials)?);
        }

        apply_authentication(api, credentials, &mut headers, &mut query)?;

        let body = match (&api.body, api.method.has_body()) {
            (Some(template), true) => {
                // Bodies without placeholders go out verbatim
                if has_placeholders(template) {
                    Some(render_template(template, input, credentials)?)
                } else {
                    Some(template.clone())
                }
            }
            _ => None,
        };

        Ok(PreparedRequest {
            url,
            headers,
            query,
            body,
        })
    }

    /// Drive the pagination loop (or a single fetch)
    async fn fetch_all(
        &self,
        api: &ApiConfig,
        prepared: &PreparedRequest,
    ) -> Result<CallOutcome, DomainError> {
        let pagination = api
            .pagination
            .as_ref()
            .filter(|p| p.pagination_type != PaginationType::Disabled);

        let pagination = match pagination {
            Some(p) => p,
            None => {
                let (status, payload) = self.fetch_page(api, prepared, &prepared.query).await?;
                let data = descend_data_path(payload, api.data_path.as_deref())?;
                return Ok(CallOutcome {
                    data,
                    pages_fetched: 1,
                    last_status: status,
                });
            }
        };

        let mut all_items = Vec::new();
        let mut state = PageState::default();
        let mut pages_fetched = 0;
        let mut last_status = 0;

        loop {
            if pages_fetched >= self.config.max_pages {
                debug!(
                    url = %prepared.url,
                    max_pages = self.config.max_pages,
                    "Stopping pagination at page cap"
                );
                break;
            }

            let mut query = prepared.query.clone();
            apply_page_params(&mut query, pagination, &state);

            let (status, payload) = self.fetch_page(api, prepared, &query).await?;
            pages_fetched += 1;
            last_status = status;

            let page_data = descend_data_path(payload.clone(), api.data_path.as_deref())?;

            let page_len = match page_data {
                Value::Array(items) => {
                    let len = items.len();
                    all_items.extend(items);
                    len
                }
                other => {
                    // A non-sequence response ends pagination; return it
                    // as-is when it is the only page.
                    if pages_fetched == 1 {
                        return Ok(CallOutcome {
                            data: other,
                            pages_fetched,
                            last_status,
                        });
                    }
                    break;
                }
            };

            // Stop decisions read the undescended payload so cursor paths
            // outside the data subtree keep working.
            match next_state(pagination, &state, &payload, page_len) {
                Some(next) => state = next,
                None => break,
            }
        }

        Ok(CallOutcome {
            data: Value::Array(all_items),
            pages_fetched,
            last_status,
        })
    }

    /// One HTTP exchange with retry on transient failures
    async fn fetch_page(
        &self,
        api: &ApiConfig,
        prepared: &PreparedRequest,
        query: &HashMap<String, String>,
    ) -> Result<(u16, Value), DomainError> {
        let retries = api.retries.unwrap_or(self.config.retries);
        let retry_delay = api.retry_delay_ms.unwrap_or(self.config.retry_delay_ms);
        let timeout = Duration::from_millis(api.timeout_ms.unwrap_or(self.config.timeout_ms));

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let result = self.send_once(api, prepared, query, timeout).await;

            let transient = match &result {
                Ok(response) => response.status().as_u16() >= 500,
                Err(_) => true,
            };

            if transient && attempt <= retries {
                debug!(
                    url = %prepared.url,
                    attempt,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(Duration::from_millis(retry_delay * u64::from(attempt))).await;
                continue;
            }

            let response = result.map_err(|e| {
                if e.is_timeout() {
                    DomainError::network(format!("request to {} timed out", prepared.url))
                } else {
                    DomainError::network(format!("request to {} failed: {}", prepared.url, e))
                }
            })?;

            let status = response.status();
            if status.as_u16() >= 400 {
                let body = response.text().await.unwrap_or_default();
                return Err(DomainError::http(status.as_u16(), snippet(&body)));
            }

            let decoded = decode_response(api.method, response).await?;
            return Ok((status.as_u16(), decoded));
        }
    }

    async fn send_once(
        &self,
        api: &ApiConfig,
        prepared: &PreparedRequest,
        query: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let method = match api.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        };

        let mut request = self
            .client
            .request(method, &prepared.url)
            .timeout(timeout);

        for (name, value) in &prepared.headers {
            request = request.header(name, value);
        }

        if !query.is_empty() {
            let pairs: Vec<(&String, &String)> = query.iter().collect();
            request = request.query(&pairs);
        }

        if let Some(body) = &prepared.body {
            // JSON bodies are sent as JSON; anything else goes out verbatim
            request = match serde_json::from_str::<Value>(body) {
                Ok(json) => request.json(&json),
                Err(_) => request.body(body.clone()),
            };
        }

        request.send().await
    }
}

fn compose_url(host: &str, path: &str) -> String {
    if path.is_empty() {
        return host.to_string();
    }

    format!(
        "{}/{}",
        host.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn apply_authentication(
    api: &ApiConfig,
    credentials: &Credentials,
    headers: &mut Vec<(String, String)>,
    query: &mut HashMap<String, String>,
) -> Result<(), DomainError> {
    use crate::domain::api_config::AuthType;

    match api.authentication {
        AuthType::None => Ok(()),
        AuthType::Header => {
            let (_, value) = primary_credential(credentials).ok_or_else(|| {
                DomainError::binding("HEADER authentication requires a credential")
            })?;

            let already_set = headers
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case("authorization"));
            if !already_set {
                headers.push(("Authorization".to_string(), bearer_value(value)));
            }
            Ok(())
        }
        AuthType::QueryParam => {
            let (name, value) = primary_credential(credentials).ok_or_else(|| {
                DomainError::binding("QUERY_PARAM authentication requires a credential")
            })?;
            query.insert(name.to_string(), value.to_string());
            Ok(())
        }
        AuthType::Oauth2 => {
            // Token acquisition happens out of band; the access token is
            // expected among the supplied credentials.
            let token = credentials.get("access_token").ok_or_else(|| {
                DomainError::binding("OAUTH2 authentication requires an 'access_token' credential")
            })?;
            headers.push(("Authorization".to_string(), bearer_value(token)));
            Ok(())
        }
    }
}

/// First credential under a conventional name
fn primary_credential(credentials: &Credentials) -> Option<(&str, &str)> {
    const NAMES: [&str; 5] = ["token", "apiKey", "api_key", "access_token", "apiToken"];

    for name in NAMES {
        if let Some(value) = credentials.get(name) {
            return Some((name, value));
        }
    }

    None
}

fn bearer_value(credential: &str) -> String {
    if credential.starts_with("Bearer ") || credential.starts_with("Basic ") {
        credential.to_string()
    } else {
        format!("Bearer {}", credential)
    }
}

async fn decode_response(
    method: HttpMethod,
    response: reqwest::Response,
) -> Result<Value, DomainError> {
    if method == HttpMethod::Head {
        return Ok(Value::Null);
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let text = response
        .text()
        .await
        .map_err(|e| DomainError::network(format!("failed reading response body: {}", e)))?;

    if content_type.contains("json") {
        return serde_json::from_str(&text).map_err(|e| {
            DomainError::decode(format!("response declared JSON but failed to parse: {}", e))
        });
    }

    // No declared content type: sniff JSON, fall back to raw text
    if content_type.is_empty() {
        let trimmed = text.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value) = serde_json::from_str(&text) {
                return Ok(value);
            }
        }
    }

    Ok(Value::String(text))
}

fn descend_data_path(payload: Value, data_path: Option<&str>) -> Result<Value, DomainError> {
    let path = match data_path {
        Some(p) if !p.is_empty() => p,
        _ => return Ok(payload),
    };

    let mut current = &payload;
    for part in path.trim_start_matches("$.").split('.') {
        current = current.get(part).ok_or_else(|| {
            DomainError::decode(format!("dataPath '{}' not found in response", path))
        })?;
    }

    Ok(current.clone())
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}
