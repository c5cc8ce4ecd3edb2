//! API endpoint configuration entities

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;
use crate::domain::DomainError;

/// Maximum length for config IDs
pub const MAX_ID_LENGTH: usize = 64;

/// URL-safe config IDs: alphanumeric plus `.`, `_`, `-`, starting and
/// ending alphanumeric.
static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*[a-zA-Z0-9]$|^[a-zA-Z0-9]$").unwrap());

/// Validate a config id string
pub fn validate_config_id(id: &str) -> Result<(), DomainError> {
    if id.is_empty() {
        return Err(DomainError::validation("Config ID cannot be empty"));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(DomainError::validation(format!(
            "Config ID exceeds maximum length of {} characters",
            MAX_ID_LENGTH
        )));
    }

    if !ID_PATTERN.is_match(id) {
        return Err(DomainError::validation(format!(
            "Invalid config ID '{}': must be URL-safe (alphanumeric, '.', '_', '-')",
            id
        )));
    }

    Ok(())
}

/// HTTP methods supported by API configs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Whether requests with this method carry a body
    pub fn has_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch | Self::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication applied when materializing requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    #[default]
    None,
    Header,
    QueryParam,
    Oauth2,
}

/// Pagination strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaginationType {
    OffsetBased,
    PageBased,
    CursorBased,
    #[default]
    Disabled,
}

/// Pagination settings for an API config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationConfig {
    #[serde(rename = "type")]
    pub pagination_type: PaginationType,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Dot-path to the next cursor in each response (CURSOR_BASED only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_path: Option<String>,
}

fn default_page_size() -> usize {
    50
}

impl PaginationConfig {
    pub fn offset_based(page_size: usize) -> Self {
        Self {
            pagination_type: PaginationType::OffsetBased,
            page_size,
            cursor_path: None,
        }
    }

    pub fn page_based(page_size: usize) -> Self {
        Self {
            pagination_type: PaginationType::PageBased,
            page_size,
            cursor_path: None,
        }
    }

    pub fn cursor_based(page_size: usize, cursor_path: impl Into<String>) -> Self {
        Self {
            pagination_type: PaginationType::CursorBased,
            page_size,
            cursor_path: Some(cursor_path.into()),
        }
    }
}

/// Description of one HTTP endpoint
///
/// `url_path`, `headers`, `query_params` and `body` are templates: `{name}`
/// placeholders are substituted from the per-call input and credentials
/// before the request is sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default)]
    pub id: String,

    pub url_host: String,

    #[serde(default)]
    pub url_path: String,

    #[serde(default)]
    pub method: HttpMethod,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    #[serde(
        default,
        skip_serializing_if = "HashMap::is_empty",
        deserialize_with = "deserialize_string_map"
    )]
    pub query_params: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default)]
    pub authentication: AuthType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationConfig>,

    /// Dot-path selecting the payload subtree from the decoded response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,

    /// Free-text description of what this endpoint does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,

    /// Per-call timeout override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Retry count override for transient failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,

    /// Base delay between retries in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ApiConfig {
    pub fn new(id: impl Into<String>, url_host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url_host: url_host.into(),
            url_path: String::new(),
            method: HttpMethod::default(),
            headers: HashMap::new(),
            query_params: HashMap::new(),
            body: None,
            authentication: AuthType::default(),
            pagination: None,
            data_path: None,
            instruction: None,
            timeout_ms: None,
            retries: None,
            retry_delay_ms: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.url_path = path.into();
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_authentication(mut self, auth: AuthType) -> Self {
        self.authentication = auth;
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_data_path(mut self, path: impl Into<String>) -> Self {
        self.data_path = Some(path.into());
        self
    }
}

impl StorageEntity for ApiConfig {
    const KIND: &'static str = "api_configs";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
    }
}

/// Query param values may arrive as numbers; store them as strings.
fn deserialize_string_map<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde_json::Value;

    let raw: HashMap<String, Value> = HashMap::deserialize(deserializer)?;
    let mut out = HashMap::with_capacity(raw.len());

    for (key, value) in raw {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "query param '{}' must be a string or number, got {}",
                    key, other
                )));
            }
        };
        out.insert(key, text);
    }

    Ok(out)
}

/// Stored configuration for the document-extraction mode
///
/// Extraction execution itself lives outside the engine; the config shares
/// the persisted lifecycle of the other kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractConfig {
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StorageEntity for ExtractConfig {
    const KIND: &'static str = "extract_configs";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
    }
}

/// Stored configuration for the standalone-transform mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformConfig {
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mapping: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StorageEntity for TransformConfig {
    const KIND: &'static str = "transform_configs";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_id_valid() {
        assert!(validate_config_id("dog-api").is_ok());
        assert!(validate_config_id("api.v2_beta").is_ok());
        assert!(validate_config_id("a").is_ok());
    }

    #[test]
    fn test_config_id_invalid() {
        assert!(validate_config_id("").is_err());
        assert!(validate_config_id("-leading").is_err());
        assert!(validate_config_id("trailing.").is_err());
        assert!(validate_config_id("has space").is_err());
        assert!(validate_config_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_method_has_body() {
        assert!(!HttpMethod::Get.has_body());
        assert!(HttpMethod::Post.has_body());
        assert!(HttpMethod::Patch.has_body());
        assert!(!HttpMethod::Head.has_body());
    }

    #[test]
    fn test_api_config_serialization() {
        let config = ApiConfig::new("dog-api", "https://dog.ceo")
            .with_path("/api/breeds/list/all")
            .with_method(HttpMethod::Get)
            .with_data_path("message");

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["urlHost"], "https://dog.ceo");
        assert_eq!(json["urlPath"], "/api/breeds/list/all");
        assert_eq!(json["method"], "GET");
        assert_eq!(json["dataPath"], "message");
        assert_eq!(json["authentication"], "NONE");

        let back: ApiConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_query_params_accept_numbers() {
        let config: ApiConfig = serde_json::from_value(json!({
            "id": "search",
            "urlHost": "https://api.example.com",
            "queryParams": {"limit": 25, "q": "term"}
        }))
        .unwrap();

        assert_eq!(config.query_params["limit"], "25");
        assert_eq!(config.query_params["q"], "term");
    }

    #[test]
    fn test_pagination_deserialization() {
        let config: PaginationConfig = serde_json::from_value(json!({
            "type": "OFFSET_BASED",
            "pageSize": 2
        }))
        .unwrap();

        assert_eq!(config.pagination_type, PaginationType::OffsetBased);
        assert_eq!(config.page_size, 2);
        assert!(config.cursor_path.is_none());
    }

    #[test]
    fn test_stamp_assigns_timestamps() {
        let mut config = ApiConfig::new("a", "https://x");
        assert!(config.created_at.is_none());

        let now = Utc::now();
        config.stamp(now, now);
        assert_eq!(config.created_at, Some(now));
        assert_eq!(config.updated_at, Some(now));
    }
}
