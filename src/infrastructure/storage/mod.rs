//! Storage backends

mod factory;
mod in_memory;
mod postgres;

pub use factory::{StorageFactory, StorageType};
pub use in_memory::{InMemoryRunRepository, InMemoryStorage};
pub use postgres::{connect, PostgresConfig, PostgresRunRepository, PostgresStorage};
