mod app_config;

pub use app_config::{
    AppConfig, AuthConfig, ExecutionConfig, LogFormat, LoggingConfig, ServerConfig, StorageConfig,
};
