pub mod database;
pub mod memory;
pub mod metrics;
pub mod monitor;
pub mod store;
pub mod system;

pub use database::MongoTodoStore;
pub use memory::MemoryTodoStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::{ConnectionInfo, ConnectionState, StoreError, TodoStore};
