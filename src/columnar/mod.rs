//! A vectorized engine that executes portable plans. Plans are compiled into
//! physical operator trees, which evaluate expressions a column at a time
//! over the registered tables.

mod aggregate;
mod compile;
mod engine;
mod kernels;
mod vector;

pub use engine::Engine;
pub use vector::{Chunk, Scalar, Vector};
