//! The portable plan format. A plan is a tree of relational operators over
//! named tables, with scalar and aggregate functions referenced through
//! extension declarations. Plans are exchanged between engines as binary or
//! JSON payloads.

pub mod builder;
mod functions;
mod payload;
mod plan;

pub use functions::{lookup, Extensions, FunctionKind, FunctionSignature, FUNCTIONS};
pub use payload::{PlanFormat, PlanPayload};
pub use plan::{
    Expr, FunctionExtension, Literal, Measure, NamedStruct, OutputOrder, Plan, Rel, RelRoot,
    SortDirection, SortField, Type, TypeKind, Version, MAJOR_VERSION, MINOR_VERSION,
};
