//! Approximate aggregates over lineitem.

use crate::errdata;
use crate::error::Result;
use crate::harness::{Suite, TestCase};
use crate::sql::types::{batch, Value};

const LINEITEM: &[&str] = &["lineitem.parquet"];

pub const CASES: &[TestCase] = &[
    TestCase::new(
        "approx_count_distinct",
        LINEITEM,
        "SELECT approx_count_distinct(l_orderkey) FROM {0}",
    ),
    TestCase::new(
        "approx_count_distinct_grouped",
        LINEITEM,
        "SELECT l_returnflag, approx_count_distinct(l_partkey) AS parts FROM {0} \
         GROUP BY l_returnflag",
    ),
];

/// Returns the relative error of approx_count_distinct(column) against the
/// exact number of distinct non-NULL values in the table.
pub fn relative_error(suite: &mut Suite, table: &str, column: &str) -> Result<f64> {
    let approx = suite.query(&format!("SELECT approx_count_distinct({column}) FROM {table}"))?;
    let approx = match batch::to_rows(&approx)?.as_slice() {
        [row] => match row.as_slice() {
            [Value::Integer(approx)] => *approx,
            row => return errdata!("unexpected approx_count_distinct result {row:?}"),
        },
        rows => return errdata!("expected 1 row, got {}", rows.len()),
    };
    let distinct =
        format!("SELECT {column} FROM {table} WHERE {column} IS NOT NULL GROUP BY {column}");
    let exact = suite.query(&distinct)?.num_rows();
    if exact == 0 {
        return Ok(if approx == 0 { 0.0 } else { f64::INFINITY });
    }
    Ok((approx as f64 - exact as f64).abs() / exact as f64)
}
