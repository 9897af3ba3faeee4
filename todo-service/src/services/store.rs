//! Persistence contract for todos.
//!
//! Handlers talk to `Arc<dyn TodoStore>`; the MongoDB store backs production
//! and the in-memory store backs tests and local demos. Both report failures
//! through [`StoreError`] so handlers switch on a variant rather than on
//! driver error text.

use crate::models::{NewTodo, Todo, TodoPatch, TodoQuery, TodoStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use service_core::error::{validation_messages, AppError};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("todo not found")]
    NotFound,

    #[error("invalid todo identifier: {0}")]
    InvalidIdentifier(String),

    #[error("{0}")]
    Connectivity(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Connectivity(err.to_string())
    }
}

impl From<validator::ValidationErrors> for StoreError {
    fn from(err: validator::ValidationErrors) -> Self {
        StoreError::Validation(validation_messages(&err))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(errors) => AppError::Validation(errors),
            StoreError::NotFound => AppError::NotFound("Todo not found".to_string()),
            StoreError::InvalidIdentifier(_) => AppError::BadRequest("Invalid todo ID".to_string()),
            StoreError::Connectivity(message) => {
                AppError::DatabaseError(anyhow::anyhow!(message))
            }
        }
    }
}

/// Parses a todo identifier. A malformed id is its own error kind, never
/// "not found".
pub fn parse_id(id: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidIdentifier(id.to_string()))
}

/// Lifecycle of the store connection as observed by health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Connecting,
    Disconnecting,
}

impl ConnectionState {
    /// Numeric code reported alongside the name.
    pub fn code(&self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connected => 1,
            ConnectionState::Connecting => 2,
            ConnectionState::Disconnecting => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => ConnectionState::Connected,
            2 => ConnectionState::Connecting,
            3 => ConnectionState::Disconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Lock-free cell holding the current [`ConnectionState`].
#[derive(Debug)]
pub struct ConnectionStateCell(AtomicU8);

impl ConnectionStateCell {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state.code()))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_code(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: ConnectionState) {
        self.0.store(state.code(), Ordering::SeqCst);
    }
}

/// Where the store is connected, for health reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    pub state: ConnectionState,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub name: String,
}

#[async_trait]
pub trait TodoStore: Send + Sync {
    /// Every record matching the query's filters, in its sort order.
    async fn list(&self, query: &TodoQuery) -> Result<Vec<Todo>, StoreError>;

    async fn get(&self, id: &str) -> Result<Todo, StoreError>;

    async fn create(&self, new_todo: NewTodo) -> Result<Todo, StoreError>;

    /// Applies only the fields present in `patch`; returns the updated record.
    async fn update(&self, id: &str, patch: TodoPatch) -> Result<Todo, StoreError>;

    /// Flips `completed`; returns the updated record.
    async fn toggle(&self, id: &str) -> Result<Todo, StoreError>;

    /// Removes one record and returns it.
    async fn delete(&self, id: &str) -> Result<Todo, StoreError>;

    /// Removes every completed record; returns how many went.
    async fn delete_completed(&self) -> Result<u64, StoreError>;

    async fn stats(&self, now: DateTime<Utc>) -> Result<TodoStats, StoreError>;

    fn connection_info(&self) -> ConnectionInfo;

    /// Round-trips a ping to the store.
    async fn ping(&self) -> Result<Duration, StoreError>;

    async fn collection_count(&self) -> Result<usize, StoreError>;

    async fn shutdown(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_id_is_not_not_found() {
        assert!(matches!(
            parse_id("not-an-id"),
            Err(StoreError::InvalidIdentifier(_))
        ));
        assert!(parse_id("65f1c0ffee0000000000beef").is_ok());
    }

    #[test]
    fn state_cell_round_trips() {
        let cell = ConnectionStateCell::new(ConnectionState::Connecting);
        assert_eq!(cell.get(), ConnectionState::Connecting);

        cell.set(ConnectionState::Connected);
        assert_eq!(cell.get(), ConnectionState::Connected);
        assert_eq!(cell.get().code(), 1);
    }

    #[test]
    fn store_errors_map_to_distinct_responses() {
        assert!(matches!(
            AppError::from(StoreError::NotFound),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(StoreError::InvalidIdentifier("x".into())),
            AppError::BadRequest(ref m) if m == "Invalid todo ID"
        ));
        assert!(matches!(
            AppError::from(StoreError::Connectivity("timeout".into())),
            AppError::DatabaseError(_)
        ));
    }
}
