//! Builds query plans from parsed SQL statements, and converts them to and
//! from portable plans.

mod plan;
#[allow(clippy::module_inception)]
mod planner;
mod portable;

pub use plan::{remap_sources, Aggregate, Direction, Node, Plan};
pub use planner::{Planner, Scope};
pub use portable::{from_ir, to_ir};
