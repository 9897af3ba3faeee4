use crate::services::system::MemoryUsage;
use crate::services::{ConnectionInfo, ConnectionState};
use axum::http::StatusCode;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    /// Degraded still serves traffic, so it answers 200.
    pub fn status_code(&self) -> StatusCode {
        match self {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: String,
    /// Seconds since the service started.
    pub uptime: f64,
    pub environment: String,
    pub version: &'static str,
    pub server: ServerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub runtime: &'static str,
    pub platform: &'static str,
    pub architecture: &'static str,
    pub memory: MemoryUsage,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    pub status: String,
    pub state: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DatabaseStatus {
    /// Bare status used when the probe itself failed.
    pub fn errored(state: ConnectionState) -> Self {
        Self {
            status: "error".to_string(),
            state: state.code(),
            host: None,
            port: None,
            name: None,
            response_time: None,
            collections_count: None,
            error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected.code()
    }
}

impl From<ConnectionInfo> for DatabaseStatus {
    fn from(info: ConnectionInfo) -> Self {
        Self {
            status: info.state.as_str().to_string(),
            state: info.state.code(),
            host: info.host,
            port: info.port,
            name: Some(info.name),
            response_time: None,
            collections_count: None,
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub database: DatabaseStatus,
    pub timestamp: String,
}
