pub mod health;
pub mod todos;

pub use health::{DatabaseHealth, DatabaseStatus, HealthReport, HealthStatus, ServerInfo};
pub use todos::{CreateTodoRequest, TodoListParams, TodoResponse, UpdateTodoRequest};
