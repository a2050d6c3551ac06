#![warn(clippy::all)]

pub mod columnar;
pub mod config;
pub mod encoding;
pub mod error;
pub mod fixture;
pub mod harness;
pub mod ir;
pub mod sketch;
pub mod sql;

pub use config::HarnessConfig;
pub use harness::{Consumer, Producer, Suite};
