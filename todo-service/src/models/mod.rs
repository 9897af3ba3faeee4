pub mod query;
pub mod todo;

pub use query::{SortDirection, SortField, SortKey, TodoQuery};
pub use todo::{now, parse_due_date, NewTodo, Priority, Todo, TodoPatch, TodoStats};
