//! service-core: Shared infrastructure for the todo API workspace.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod response;
