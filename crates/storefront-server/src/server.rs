use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use storefront_search::{SchemaRegistry, storefront_catalog};
use storefront_storage::DynDatastore;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::cache::{CacheAside, DynCacheStore, InvalidationSweeper};
use crate::rate_limit::RateLimiter;
use crate::service::ResourceService;
use crate::{config::AppConfig, create_cache_store, handlers, middleware as app_middleware};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ResourceService>,
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    /// Wire the service from its collaborators. The cache store and datastore
    /// are injected so tests can substitute failing or slow stores.
    pub fn new(
        cfg: &AppConfig,
        registry: Arc<SchemaRegistry>,
        datastore: DynDatastore,
        cache_store: DynCacheStore,
    ) -> Self {
        let op_timeout = cfg.cache.op_timeout();
        let cache = CacheAside::new(cache_store.clone(), op_timeout);
        let sweeper = InvalidationSweeper::new(cache_store, cfg.cache.scan_batch_size, op_timeout);
        let service = ResourceService::new(cfg, datastore, registry, cache, sweeper);
        Self {
            service: Arc::new(service),
            rate_limiter: RateLimiter::from_config(&cfg.rate_limit),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Option<RateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }
}

pub struct StorefrontServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    let api = Router::new()
        .route("/api/cache/invalidate/{topic}", post(handlers::invalidate_topic))
        .route(
            "/api/{resource}",
            get(handlers::list_resources).post(handlers::create_resource),
        )
        .route(
            "/api/{resource}/{id}",
            get(handlers::read_resource)
                .put(handlers::update_resource)
                .delete(handlers::delete_resource),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::rate_limit_writes,
        ));

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics_handler))
        .merge(api)
        .route_layer(middleware::from_fn(app_middleware::track_http_metrics))
        // Layers wrap outward: body limit -> request id -> trace -> compression/cors
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = tracing::field::Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
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

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Build the catalog, datastore and cache store, then the router.
    pub async fn build(self) -> anyhow::Result<StorefrontServer> {
        let registry = Arc::new(storefront_catalog()?);
        tracing::info!(resources = registry.len(), "resource catalog loaded");

        let datastore = storefront_db_memory::create_datastore();
        let cache_store = create_cache_store(&self.config.redis).await;
        let state = AppState::new(&self.config, registry, datastore, cache_store);
        let app = build_app(&self.config, state);

        Ok(StorefrontServer {
            addr: self.addr,
            app,
        })
    }
}

impl StorefrontServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
