use crate::dtos::{
    DatabaseHealth, DatabaseStatus, HealthReport, HealthStatus, ServerInfo,
};
use crate::services::{system, StoreError, TodoStore};
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use service_core::response::ApiResponse;
use std::time::Instant;

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn process_report(state: &AppState) -> HealthReport {

    HealthReport {
        status: HealthStatus::Healthy,
        timestamp: timestamp(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        environment: state.config.environment.clone(),
        version: env!("CARGO_PKG_VERSION"),
        server: ServerInfo {
            runtime: "rust",
            platform: std::env::consts::OS,
            architecture: std::env::consts::ARCH,
            memory: system::memory_usage(),
        },
        database: None,
        response_time: None,
    }
}

/// Pings the store and lists its collections, filling the timing fields.
async fn probe_database(
    store: &dyn TodoStore,
    status: &mut DatabaseStatus,
) -> Result<(), StoreError> {
    let round_trip = store.ping().await?;
    status.response_time = Some(format!("{}ms", round_trip.as_millis()));
    status.collections_count = Some(store.collection_count().await?);
    Ok(())
}

/// GET /api/health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::success(process_report(&state)).with_message("Backend is healthy")
}

/// GET /api/health/database
#[tracing::instrument(skip(state))]
pub async fn database_health(State(state): State<AppState>) -> impl IntoResponse {
    let info = state.store.connection_info();
    let state_at_probe = info.state;
    let mut database = DatabaseStatus::from(info);

    if database.is_connected() {
        if let Err(e) = probe_database(state.store.as_ref(), &mut database).await {
            tracing::warn!(error = %e, "Database health check failed");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiResponse::failure("Database health check failed")
                    .with_error(e.to_string())
                    .with_data(DatabaseHealth {
                        database: DatabaseStatus::errored(state_at_probe),
                        timestamp: timestamp(),
                    }),
            );
        }
    }

    let connected = database.is_connected();
    let body = DatabaseHealth {
        database,
        timestamp: timestamp(),
    };

    if connected {
        (
            StatusCode::OK,
            ApiResponse::success(body).with_message("Database connection is healthy"),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            ApiResponse::failure("Database connection is unhealthy").with_data(body),
        )
    }
}

/// GET /api/health/detailed
///
/// Healthy when the store is connected and answers a ping, degraded when it
/// is connected but the ping fails, unhealthy when it is not connected.
#[tracing::instrument(skip(state))]
pub async fn detailed_health(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let mut report = process_report(&state);
    let mut database = DatabaseStatus::from(state.store.connection_info());

    if database.is_connected() {
        if let Err(e) = probe_database(state.store.as_ref(), &mut database).await {
            tracing::warn!(error = %e, "Database probe failed during detailed health check");
            database.error = Some(e.to_string());
            report.status = HealthStatus::Degraded;
        }
    } else {
        report.status = HealthStatus::Unhealthy;
    }

    report.database = Some(database);
    report.response_time = Some(format!("{}ms", start.elapsed().as_millis()));

    let status = report.status;
    let mut body = ApiResponse::success(report)
        .with_message(format!("System status: {}", status.as_str()));
    body.success = status != HealthStatus::Unhealthy;

    (status.status_code(), body)
}
