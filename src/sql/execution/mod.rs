//! Executes a `Plan` against the storage of a [`crate::sql::engine::Session`].

mod aggregate;
mod execute;
mod source;
mod transform;
mod write;

pub use execute::{execute, execute_plan, ExecutionResult};
