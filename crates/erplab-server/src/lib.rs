pub mod auth;
pub mod bootstrap;
pub mod cep;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod server;

pub use auth::{AuthUser, Claims, JwtService, TokenType, hash_password, verify_password};
pub use cep::{CepClient, CepError, Endereco};
pub use config::{
    AppConfig, AuthConfig, BootstrapAdminConfig, IntegrationsConfig, LoggingConfig,
    MetricsConfig, PaginationConfig, PostgresStorageConfig, ServerConfig, StorageConfig,
};
pub use metrics::RequestMetrics;
pub use observability::init_tracing;
pub use server::{AppState, ErplabServer, ServerBuilder, build_app};
