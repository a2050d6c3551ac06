//! The reference SQL engine: parser, planner, executor and sessions.

pub mod engine;
pub mod execution;
pub mod parser;
pub mod planner;
pub mod types;
