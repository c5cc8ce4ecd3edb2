//! API, extract and transform configuration entities

mod entity;

pub use entity::{
    validate_config_id, ApiConfig, AuthType, ExtractConfig, HttpMethod, PaginationConfig,
    PaginationType, TransformConfig, MAX_ID_LENGTH,
};
