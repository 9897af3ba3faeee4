use service_core::observability::init_tracing;
use todo_service::config::TodoConfig;
use todo_service::services::init_metrics;
use todo_service::startup::Application;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let otlp_endpoint = std::env::var("OTLP_ENDPOINT").ok().filter(|e| !e.is_empty());
    init_tracing("todo-service", &log_level, otlp_endpoint.as_deref());

    init_metrics().map_err(|e| {
        tracing::error!("Failed to initialize metrics: {}", e);
        std::io::Error::other(format!("Metrics error: {}", e))
    })?;

    let config = TodoConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    tracing::info!(
        environment = %config.environment,
        backend = ?config.store.backend,
        "Starting todo-service"
    );

    // The service is useless without its store: any connection failure ends the process.
    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Error connecting to the todo store: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    app.run_until_stopped().await
}
