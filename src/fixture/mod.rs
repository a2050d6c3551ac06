//! Fixture data: Parquet files that are loaded as tables into engines, and a
//! deterministic generator for TPC-H style fixture files.

mod loader;
pub mod parquet;
pub mod tpch;

pub use loader::{table_name, FixtureLoader};
