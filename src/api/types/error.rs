//! API error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Wire shape of an error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Error detail: a short human diagnostic plus the stable kind tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    pub kind: String,
}

/// API error with HTTP status
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    message: message.into(),
                    kind: kind.into(),
                },
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "auth_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let status = match &err {
            DomainError::Validation { .. } | DomainError::Binding { .. } => StatusCode::BAD_REQUEST,
            DomainError::Expression { .. } | DomainError::SchemaValidation { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DomainError::Auth { .. } => StatusCode::UNAUTHORIZED,
            DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
            DomainError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            DomainError::Network { .. } | DomainError::Http { .. } => StatusCode::BAD_GATEWAY,
            DomainError::Decode { .. }
            | DomainError::Store { .. }
            | DomainError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self::new(status, err.kind(), err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.response.error.kind, self.response.error.message
        )
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_mapping() {
        let err: ApiError = DomainError::validation("bad input").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.response.error.kind, "validation_error");

        let err: ApiError = DomainError::not_found("workflow 'x'").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: ApiError = DomainError::auth("missing token").into();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err: ApiError = DomainError::http(502, "upstream").into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.response.error.kind, "http_error");
    }

    #[test]
    fn test_serialization_carries_kind() {
        let err = ApiError::bad_request("missing field");
        let json = serde_json::to_string(&err.response).unwrap();
        assert!(json.contains("validation_error"));
        assert!(json.contains("missing field"));
    }
}
