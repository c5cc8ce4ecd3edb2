use thiserror::Error;

/// Core domain errors
///
/// Each variant carries a short human diagnostic; `kind()` returns the
/// stable tag surfaced to API callers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Binding error: {message}")]
    Binding { message: String },

    #[error("Expression error: {message}")]
    Expression { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("HTTP error: status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Storage error: {message}")]
    Store { message: String },

    #[error("Schema validation failed: {message}")]
    SchemaValidation { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    #[error("Authentication error: {message}")]
    Auth { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn binding(message: impl Into<String>) -> Self {
        Self::Binding {
            message: message.into(),
        }
    }

    pub fn expression(message: impl Into<String>) -> Self {
        Self::Expression {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn schema_validation(message: impl Into<String>) -> Self {
        Self::SchemaValidation {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable kind tag surfaced alongside the diagnostic
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Binding { .. } => "binding_error",
            Self::Expression { .. } => "expression_error",
            Self::Network { .. } => "network_error",
            Self::Http { .. } => "http_error",
            Self::Decode { .. } => "decode_error",
            Self::Store { .. } => "store_error",
            Self::SchemaValidation { .. } => "schema_validation_error",
            Self::Timeout { .. } => "timeout_error",
            Self::Auth { .. } => "auth_error",
            Self::NotFound { .. } => "not_found",
            Self::Internal { .. } => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::binding("placeholder 'term' has no value");
        assert_eq!(
            err.to_string(),
            "Binding error: placeholder 'term' has no value"
        );

        let err = DomainError::http(502, "bad gateway");
        assert_eq!(err.to_string(), "HTTP error: status 502: bad gateway");
    }

    #[test]
    fn test_error_kind_tags() {
        assert_eq!(DomainError::validation("x").kind(), "validation_error");
        assert_eq!(DomainError::timeout("x").kind(), "timeout_error");
        assert_eq!(
            DomainError::schema_validation("x").kind(),
            "schema_validation_error"
        );
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(DomainError::not_found("w1"), DomainError::not_found("w1"));
        assert_ne!(DomainError::not_found("w1"), DomainError::not_found("w2"));
    }
}
