//! Gateway authentication and tenant extraction
//!
//! The contract here is deliberately small: when a gateway token is
//! configured, requests must present it as a bearer; the tenant
//! identifier comes from the `X-Tenant-Id` header. No header means the
//! admin scope (all tenants).

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::api::state::AppState;
use crate::api::types::ApiError;

/// Extractor producing the request's tenant scope
#[derive(Debug, Clone)]
pub struct TenantContext {
    tenant: Option<String>,
}

impl TenantContext {
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }
}

impl FromRequestParts<AppState> for TenantContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(expected) = &state.auth_token {
            let presented = bearer_token(&parts.headers)?;
            if presented != *expected {
                return Err(ApiError::unauthorized("Invalid token"));
            }
        }

        let tenant = match parts.headers.get("x-tenant-id") {
            Some(value) => {
                let tenant = value
                    .to_str()
                    .map_err(|_| ApiError::bad_request("Invalid X-Tenant-Id header encoding"))?
                    .trim();
                if tenant.is_empty() {
                    None
                } else {
                    Some(tenant.to_string())
                }
            }
            None => None,
        };

        Ok(TenantContext { tenant })
    }
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Result<String, ApiError> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| ApiError::bad_request("Invalid Authorization header encoding"))?;

    auth.strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .ok_or_else(|| ApiError::unauthorized("Authorization header must be a bearer token"))
}
