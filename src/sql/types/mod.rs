//! SQL data types, values, schemas and expressions.

pub mod batch;
mod expression;
mod schema;
mod value;

pub use expression::{round_float, round_integer, Expression};
pub use schema::{Column, Table};
pub use value::{DataType, Label, Row, Rows, Value};
