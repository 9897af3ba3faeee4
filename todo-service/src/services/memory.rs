use super::store::{
    parse_id, ConnectionInfo, ConnectionState, ConnectionStateCell, StoreError, TodoStore,
};
use crate::models::{now, NewTodo, Todo, TodoPatch, TodoQuery, TodoStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use validator::Validate;

/// In-process store with the same contract as the MongoDB one.
///
/// Used by the test suite and by `STORE_BACKEND=memory` for local runs.
/// Ties under a sort fall back to identifier order, as in MongoDB.
pub struct MemoryTodoStore {
    name: String,
    todos: RwLock<Vec<Todo>>,
    state: ConnectionStateCell,
    available: AtomicBool,
}

impl MemoryTodoStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            todos: RwLock::new(Vec::new()),
            state: ConnectionStateCell::new(ConnectionState::Connected),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates the backing server going away while the handle stays
    /// "connected": pings and collection listing start failing.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.todos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Connectivity(format!(
                "memory store '{}' is unavailable",
                self.name
            )))
        }
    }
}

#[async_trait]
impl TodoStore for MemoryTodoStore {
    async fn list(&self, query: &TodoQuery) -> Result<Vec<Todo>, StoreError> {
        let todos = self.todos.read().await;
        let mut matching: Vec<Todo> = todos.iter().filter(|t| query.matches(t)).cloned().collect();
        matching.sort_by(|a, b| query.compare(a, b));
        Ok(matching)
    }

    async fn get(&self, id: &str) -> Result<Todo, StoreError> {
        let oid = parse_id(id)?;
        self.todos
            .read()
            .await
            .iter()
            .find(|t| t.id == oid)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, new_todo: NewTodo) -> Result<Todo, StoreError> {
        let todo = new_todo.into_todo()?;
        self.todos.write().await.push(todo.clone());
        Ok(todo)
    }

    async fn update(&self, id: &str, patch: TodoPatch) -> Result<Todo, StoreError> {
        let oid = parse_id(id)?;
        patch.validate()?;

        let mut todos = self.todos.write().await;
        let todo = todos
            .iter_mut()
            .find(|t| t.id == oid)
            .ok_or(StoreError::NotFound)?;
        patch.apply(todo, now());
        Ok(todo.clone())
    }

    async fn toggle(&self, id: &str) -> Result<Todo, StoreError> {
        let oid = parse_id(id)?;

        let mut todos = self.todos.write().await;
        let todo = todos
            .iter_mut()
            .find(|t| t.id == oid)
            .ok_or(StoreError::NotFound)?;
        todo.completed = !todo.completed;
        todo.updated_at = now();
        Ok(todo.clone())
    }

    async fn delete(&self, id: &str) -> Result<Todo, StoreError> {
        let oid = parse_id(id)?;

        let mut todos = self.todos.write().await;
        let index = todos
            .iter()
            .position(|t| t.id == oid)
            .ok_or(StoreError::NotFound)?;
        Ok(todos.remove(index))
    }

    async fn delete_completed(&self) -> Result<u64, StoreError> {
        let mut todos = self.todos.write().await;
        let before = todos.len();
        todos.retain(|t| !t.completed);
        Ok((before - todos.len()) as u64)
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<TodoStats, StoreError> {
        let todos = self.todos.read().await;
        let completed = todos.iter().filter(|t| t.completed).count() as u64;
        let pending = todos.len() as u64 - completed;
        let overdue = todos.iter().filter(|t| t.is_overdue(now)).count() as u64;
        let by_priority = todos
            .iter()
            .map(|t| (t.priority.as_str().to_string(), 1))
            .collect::<Vec<_>>();

        Ok(TodoStats::from_counts(completed, pending, overdue, by_priority))
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            state: self.state.get(),
            host: Some("memory".to_string()),
            port: None,
            name: self.name.clone(),
        }
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        self.ensure_available()?;
        Ok(start.elapsed())
    }

    async fn collection_count(&self) -> Result<usize, StoreError> {
        self.ensure_available()?;
        // The collection only exists once something has been written to it.
        Ok(usize::from(!self.todos.read().await.is_empty()))
    }

    async fn shutdown(&self) {
        self.state.set(ConnectionState::Disconnecting);
        self.todos.write().await.clear();
        self.state.set(ConnectionState::Disconnected);
    }
}
