//! Application startup and lifecycle management.
//!
//! The store is created exactly once here and handed to every handler through
//! [`AppState`]; it is shut down after the HTTP server drains.

use crate::config::{CorsConfig, StoreBackend, TodoConfig};
use crate::handlers;
use crate::services::{MemoryTodoStore, MongoTodoStore, TodoStore};
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, patch},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    make_request_span, metrics_middleware, request_id_middleware, REQUEST_ID_HEADER,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: TodoConfig,
    pub store: Arc<dyn TodoStore>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: TodoConfig, store: Arc<dyn TodoStore>) -> Self {
        Self {
            config,
            store,
            started_at: Instant::now(),
        }
    }
}

/// Opens the configured store. A MongoDB store that cannot be reached is an
/// error; the caller is expected to abort startup.
pub async fn connect_store(config: &TodoConfig) -> Result<Arc<dyn TodoStore>, AppError> {
    match config.store.backend {
        StoreBackend::Mongodb => {
            let store = MongoTodoStore::connect(&config.mongodb.uri, &config.mongodb.database)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to MongoDB: {}", e);
                    e
                })?;
            store.initialize_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                e
            })?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory todo store; data is lost on restart");
            Ok(Arc::new(MemoryTodoStore::new(config.mongodb.database.clone())))
        }
    }
}

/// `None` allows any origin. A configured list whose entries all fail to
/// parse yields an empty list, which allows no cross-origin caller.
fn allowed_origins(config: &CorsConfig) -> Option<Vec<HeaderValue>> {
    if config.allowed_origins.is_empty() {
        return None;
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| tracing::error!("Ignoring invalid CORS origin '{}': {}", o, e))
                .ok()
        })
        .collect();

    if origins.is_empty() {
        tracing::warn!(
            configured = ?config.allowed_origins,
            "No valid CORS origin configured; all cross-origin requests will be rejected"
        );
    }
    Some(origins)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = match allowed_origins(config) {
        None => AllowOrigin::from(Any),
        Some(origins) => AllowOrigin::list(origins),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(REQUEST_ID_HEADER)])
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route(
            "/api/todos",
            get(handlers::list_todos)
                .post(handlers::create_todo)
                .delete(handlers::delete_completed_todos),
        )
        .route("/api/todos/stats/summary", get(handlers::todo_stats))
        .route(
            "/api/todos/:id",
            get(handlers::get_todo)
                .put(handlers::update_todo)
                .delete(handlers::delete_todo),
        )
        .route("/api/todos/:id/toggle", patch(handlers::toggle_todo))
        .route("/api/health", get(handlers::health_check))
        .route("/api/health/database", get(handlers::database_health))
        .route("/api/health/detailed", get(handlers::detailed_health))
        .route("/metrics", get(handlers::metrics_endpoint))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
        .layer(from_fn(request_id_middleware))
        .layer(cors)
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: TodoConfig) -> Result<Self, AppError> {
        let store = connect_store(&config).await?;
        Self::build_with_store(config, store).await
    }

    /// Build around an already opened store (port 0 = random port for testing).
    pub async fn build_with_store(
        config: TodoConfig,
        store: Arc<dyn TodoStore>,
    ) -> Result<Self, AppError> {
        let addr = config.common.bind_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, store),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn store(&self) -> Arc<dyn TodoStore> {
        self.state.store.clone()
    }

    /// Serves until SIGINT/SIGTERM, then closes the store connection.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let store = self.state.store.clone();
        let router = build_router(self.state);

        let result = axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        store.shutdown().await;
        tracing::info!("Service shutdown complete");
        result
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
