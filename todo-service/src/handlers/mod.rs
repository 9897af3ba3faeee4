pub mod health;
pub mod metrics;
pub mod todos;

pub use health::{database_health, detailed_health, health_check};
pub use metrics::metrics_endpoint;
pub use todos::{
    create_todo, delete_completed_todos, delete_todo, get_todo, list_todos, todo_stats,
    toggle_todo, update_todo,
};
