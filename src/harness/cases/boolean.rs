//! Boolean functions over two inline tables: `t` with a NULL integer operand
//! and all-TRUE `d`, and `u` with a NULL boolean, exercising three-valued
//! logic.

use super::inline_table;
use crate::error::Result;
use crate::harness::TestCase;
use crate::ir::builder::RelBuilder;
use crate::ir::Plan;
use crate::sql::engine::PRODUCER;
use crate::sql::types::{DataType, Table};

pub const SETUP: &[&str] = &[
    "CREATE TABLE t (a INT, b INT, c BOOLEAN, d BOOLEAN)",
    "INSERT INTO t VALUES (1, 1, TRUE, TRUE), (2, 1, FALSE, TRUE), (3, 1, TRUE, TRUE), \
     (4, 1, TRUE, TRUE), (5, 1, FALSE, TRUE), (6, 2, TRUE, TRUE), (7, 2, FALSE, TRUE), \
     (8, 2, TRUE, TRUE), (9, 2, FALSE, TRUE), (NULL, 2, FALSE, TRUE)",
    "CREATE TABLE u (a INT, b INT, c BOOLEAN, d BOOLEAN)",
    "INSERT INTO u VALUES (1, 1, TRUE, TRUE), (2, 1, FALSE, TRUE), (3, 1, TRUE, TRUE), \
     (4, 1, TRUE, FALSE), (5, 1, FALSE, TRUE), (6, 2, TRUE, TRUE), (7, 2, FALSE, FALSE), \
     (8, 2, TRUE, TRUE), (9, 2, FALSE, TRUE), (10, 2, NULL, FALSE)",
];

pub const CASES: &[TestCase] = &[
    TestCase::new("or", &[], "SELECT a, c OR d AS either FROM t").with_reference(or),
    TestCase::new("and", &[], "SELECT a, c AND d AS both FROM u"),
    TestCase::new("not", &[], "SELECT a, NOT c AS negated FROM u"),
    TestCase::new("xor", &[], "SELECT a, xor(c, d) AS exclusive FROM u"),
    TestCase::new("predicate", &[], "SELECT a, b FROM t WHERE c AND a > 2")
        .with_reference(predicate),
    TestCase::new(
        "null_operand",
        &[],
        "SELECT b, a > 2 AND c AS high_c, a < 5 OR d AS low_d FROM t",
    ),
    TestCase::new("is_null", &[], "SELECT b FROM t WHERE a IS NULL"),
    TestCase::new("is_null_or", &[], "SELECT a FROM u WHERE c IS NULL OR NOT d"),
    TestCase::new("is_not_null", &[], "SELECT count(*) AS known FROM u WHERE c IS NOT NULL"),
    TestCase::new(
        "comparison",
        &[],
        "SELECT a, a >= 5 AS high, c = d AS same FROM u ORDER BY a DESC",
    ),
    TestCase::new(
        "bool_and",
        &[],
        "SELECT b, bool_and(c) AS all_c, bool_and(d) AS all_d FROM t GROUP BY b",
    ),
    TestCase::new(
        "bool_and_nulls",
        &[],
        "SELECT b, bool_and(c) AS all_c, bool_and(d) AS all_d FROM u GROUP BY b",
    ),
    TestCase::new(
        "bool_or",
        &[],
        "SELECT b, bool_or(c) AS any_c, bool_or(NOT d) AS any_not_d FROM u GROUP BY b",
    ),
];

fn table() -> Table {
    inline_table(
        "t",
        &[
            ("a", DataType::Integer),
            ("b", DataType::Integer),
            ("c", DataType::Boolean),
            ("d", DataType::Boolean),
        ],
    )
}

fn or(_: &[Table]) -> Result<Plan> {
    let table = table();
    let mut builder = RelBuilder::read(&table.name, (&table).into());
    let (a, c, d) = (builder.field("a")?, builder.field("c")?, builder.field("d")?);
    let either = builder.call("or", vec![c, d])?;
    Ok(builder.project(vec![(a, "a"), (either, "either")]).build(PRODUCER))
}

fn predicate(_: &[Table]) -> Result<Plan> {
    let table = table();
    let mut builder = RelBuilder::read(&table.name, (&table).into());
    let (a, c) = (builder.field("a")?, builder.field("c")?);
    let two = builder.literal(2i64);
    let high = builder.call("gt", vec![a, two])?;
    let condition = builder.call("and", vec![c, high])?;
    let builder = builder.filter(condition);
    let (a, b) = (builder.field("a")?, builder.field("b")?);
    Ok(builder.project(vec![(a, "a"), (b, "b")]).build(PRODUCER))
}
