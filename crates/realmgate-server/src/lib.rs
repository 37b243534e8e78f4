pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;

pub use config::{
    AppConfig, LoggingConfig, PostgresStorageConfig, ServerConfig, StorageBackend, StorageConfig,
};
pub use observability::init_tracing;
pub use server::{RealmgateServer, ServerBuilder, build_app};
