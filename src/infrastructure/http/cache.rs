//! Shared HTTP response cache
//!
//! Read-through/write-through cache for materialized requests, keyed by a
//! fingerprint of the request with credential values masked so secrets
//! never influence (or leak into) keys. Keys include the tenant, so
//! entries are never shared across tenants.

use std::time::Duration;

use moka::future::Cache as MokaCache;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::workflow::Credentials;

/// Cached outcome of a successful call
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub data: Value,
    pub pages_fetched: usize,
    pub last_status: u16,
}

/// Configuration for the response cache
#[derive(Debug, Clone)]
pub struct ResponseCacheConfig {
    pub max_capacity: u64,
    pub time_to_live: Duration,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1_000,
            time_to_live: Duration::from_secs(300),
        }
    }
}

/// Process-wide response cache
#[derive(Debug)]
pub struct ResponseCache {
    cache: MokaCache<String, CachedResponse>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::with_config(ResponseCacheConfig::default())
    }
}

impl ResponseCache {
    pub fn with_config(config: ResponseCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.time_to_live)
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        self.cache.get(key).await
    }

    pub async fn put(&self, key: String, response: CachedResponse) {
        self.cache.insert(key, response).await;
    }
}

/// Parts of a materialized request that identify it for caching
pub struct FingerprintParts<'a> {
    pub tenant: Option<&'a str>,
    pub method: &'a str,
    pub url: &'a str,
    pub headers: &'a [(String, String)],
    pub query: &'a [(String, String)],
    pub body: Option<&'a str>,
}

/// Stable hash of a request. Header and query pairs are sorted so map
/// iteration order cannot change the key, and every credential value is
/// replaced with a mask before hashing.
pub fn fingerprint(parts: &FingerprintParts<'_>, credentials: &Credentials) -> String {
    let mask = |text: &str| -> String {
        let mut masked = text.to_string();
        for value in credentials.values() {
            if !value.is_empty() {
                masked = masked.replace(value.as_str(), "***");
            }
        }
        masked
    };

    let mut headers: Vec<String> = parts
        .headers
        .iter()
        .map(|(k, v)| format!("{}={}", k.to_lowercase(), mask(v)))
        .collect();
    headers.sort();

    let mut query: Vec<String> = parts
        .query
        .iter()
        .map(|(k, v)| format!("{}={}", k, mask(v)))
        .collect();
    query.sort();

    let mut hasher = Sha256::new();
    hasher.update(parts.tenant.unwrap_or(""));
    hasher.update("\n");
    hasher.update(parts.method);
    hasher.update("\n");
    hasher.update(mask(parts.url));
    hasher.update("\n");
    hasher.update(headers.join("&"));
    hasher.update("\n");
    hasher.update(query.join("&"));
    hasher.update("\n");
    hasher.update(mask(parts.body.unwrap_or("")));

    format!("{:x}", hasher.finalize())
}
