use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
};

use axum::{Extension, Router, http::StatusCode, response::IntoResponse, routing::get, serve};
use http::{HeaderValue, header};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use shared::config::server::{LogFormat, ServerConfig};
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    app_state::AppState,
    handlers::socket::ws_handler,
    openapi::openapi_routes,
    relay::{BroadcastRelay, ConnectionRegistry},
    routes,
    store::{MemoryMessageStore, MessageStore, PgMessageStore, StoreError},
    tracer,
};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn metrics_handle() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn metrics_endpoint(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        handle.render(),
    )
}

/// Initializes the tracing subscriber for logging using the provided configuration.
pub fn initialize_tracing(config: &ServerConfig) -> String {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    if matches!(config.log_format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).init();
    } else {
        fmt_builder.with_ansi(true).init();
    }

    config.log_level.clone()
}

fn build_env_filter(config: &ServerConfig) -> EnvFilter {
    let default_level = config
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

/// Creates the durable message store from configuration.
///
/// A configured database URL yields the Postgres adapter; otherwise an
/// in-memory store backs the history for the lifetime of the process.
///
/// # Errors
/// Returns an error if the database connection or schema assertion fails.
pub async fn create_store(config: &ServerConfig) -> Result<Arc<dyn MessageStore>, StoreError> {
    match config.database_url.as_deref() {
        Some(url) => {
            let store = PgMessageStore::connect(url, config.db_max_connections).await?;
            info!("durable store: postgres");
            Ok(Arc::new(store))
        }
        None => {
            warn!("no database configured, history is in-memory only");
            Ok(Arc::new(MemoryMessageStore::new()))
        }
    }
}

/// Creates the application state shared by socket handlers and routes.
pub fn create_app_state(config: Arc<ServerConfig>, store: Arc<dyn MessageStore>) -> Arc<AppState> {
    let registry = Arc::new(ConnectionRegistry::new());
    let relay = Arc::new(BroadcastRelay::new(Arc::clone(&registry), Arc::clone(&store)));
    Arc::new(AppState {
        config,
        registry,
        relay,
        store,
    })
}

/// Creates the CORS layer for the application.
pub fn create_cors_layer() -> CorsLayer {
    use http::Method;

    let methods = vec![Method::GET, Method::POST, Method::OPTIONS];

    CorsLayer::new()
        .allow_methods(AllowMethods::list(methods))
        .allow_headers(AllowHeaders::any())
        .allow_origin(AllowOrigin::any())
}

/// Creates the main application router with all middleware and routes.
pub fn create_app_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .merge(routes::health::create_health_router())
        .merge(routes::messages::create_messages_router())
        .merge(openapi_routes())
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(metrics_handle))
        .layer(create_cors_layer())
        .layer(tracer::create_trace_layer())
        .with_state(state)
}

/// Creates the graceful shutdown signal handler.
pub async fn create_shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutting down...");
}

/// Starts the relay server and binds it to the configured port.
///
/// # Errors
/// Returns an error if the store cannot be created or the listener fails
/// to bind.
pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    initialize_tracing(&config);
    info!("Starting server...");

    let metrics_handle = metrics_handle();
    let config = Arc::new(config);

    let store = create_store(&config)
        .await
        .map_err(|err| -> Box<dyn std::error::Error> { Box::new(err) })?;

    let state = create_app_state(Arc::clone(&config), store);
    let app = create_app_router(state, metrics_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await?;

    Ok(())
}
