use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use erplab_api::{Page, PageParams};
use erplab_db_postgres::{PgPool, create_pool, ibge::IbgeClient, mask_password, migrations};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::auth::JwtService;
use crate::cep::CepClient;
use crate::config::AppConfig;
use crate::metrics::RequestMetrics;
use crate::{bootstrap, handlers, middleware as app_middleware};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtService>,
    pub metrics: Arc<RequestMetrics>,
    pub cep: Arc<CepClient>,
    pub ibge: Arc<IbgeClient>,
}

impl AppState {
    /// Builds the state around an existing pool. No connection is attempted.
    ///
    /// # Errors
    ///
    /// Fails when an outbound HTTP client cannot be created.
    pub fn new(pool: PgPool, config: AppConfig) -> anyhow::Result<Self> {
        let timeout = config.integrations.http_timeout();
        let cep = CepClient::new(config.integrations.viacep_base_url.clone(), timeout)?;
        let ibge = IbgeClient::new(config.integrations.ibge_base_url.clone(), timeout)?;

        Ok(Self {
            pool,
            jwt: Arc::new(JwtService::from_config(&config.auth)),
            metrics: Arc::new(RequestMetrics::new(config.metrics)),
            cep: Arc::new(cep),
            ibge: Arc::new(ibge),
            config: Arc::new(config),
        })
    }

    /// Resolves `?page&limit` against the configured pagination bounds.
    pub fn page(&self, params: PageParams) -> Page {
        params.resolve(
            self.config.pagination.default_limit,
            self.config.pagination.max_limit,
        )
    }
}

pub struct ErplabServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let timeout = state.config.request_timeout();
    let prefix = state.config.api_prefix().to_string();

    let api = handlers::api_routes();
    let router = if prefix.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&prefix, api)
    };

    router
        // Probes and exporter outside the API prefix
        .route("/", get(handlers::health::root))
        .route("/healthz", get(handlers::health::healthz))
        .route("/readyz", get(handlers::health::readyz))
        .route("/metrics", get(handlers::health::prometheus))
        // Middleware stack (inner to outer: auth -> metrics -> timeout -> trace -> request id -> compression/cors -> body limit)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::authentication_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::track_metrics,
        ))
        .layer(TimeoutLayer::new(timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Connects to PostgreSQL, applies migrations, creates the bootstrap
    /// administrator when needed and assembles the router.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, an unreachable database or a failed migration.
    pub async fn build(self) -> anyhow::Result<ErplabServer> {
        self.config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
        let Some(storage) = self.config.storage.postgres.clone() else {
            anyhow::bail!("storage.postgres config is required");
        };

        let pg_config = storage.to_pool_config();
        tracing::info!(
            url = %mask_password(&pg_config.url),
            pool_size = pg_config.pool_size,
            "Connecting to PostgreSQL"
        );
        let pool = create_pool(&pg_config).await?;

        if pg_config.run_migrations {
            migrations::run(&pool).await?;
        }

        if let Some(admin) = &self.config.auth.bootstrap_admin {
            bootstrap::bootstrap_admin(&pool, admin).await?;
        }

        if crate::metrics::init_metrics() {
            tracing::debug!("Prometheus recorder installed");
        }

        let state = AppState::new(pool, self.config)?;
        Ok(ErplabServer {
            addr: self.addr,
            app: build_app(state),
        })
    }
}

impl ErplabServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
