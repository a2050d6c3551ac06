//! Arithmetic scalar functions and numeric aggregates, over partsupp and a
//! small inline table with a NULL.

use super::{inline_table, read};
use crate::error::Result;
use crate::harness::TestCase;
use crate::ir::builder::RelBuilder;
use crate::ir::Plan;
use crate::sql::engine::PRODUCER;
use crate::sql::types::{DataType, Table};

pub const SETUP: &[&str] = &[
    "CREATE TABLE t (a INT, b INT, c BOOLEAN)",
    "INSERT INTO t VALUES (1, 1, TRUE), (2, 1, FALSE), (3, 1, TRUE), (-4, 1, TRUE), \
     (5, 1, FALSE), (-6, 2, TRUE), (7, 2, FALSE), (8, 2, TRUE), (9, 2, FALSE), (NULL, 2, FALSE)",
];

const PARTSUPP: &[&str] = &["partsupp.parquet"];

pub const CASES: &[TestCase] = &[
    TestCase::new(
        "add",
        PARTSUPP,
        "SELECT ps_partkey, ps_suppkey, add(ps_partkey, ps_suppkey) AS total FROM {0}",
    )
    .with_reference(add),
    TestCase::new(
        "subtract",
        PARTSUPP,
        "SELECT ps_partkey, ps_suppkey, ps_partkey - ps_suppkey AS difference FROM {0}",
    )
    .with_reference(subtract),
    TestCase::new(
        "multiply",
        PARTSUPP,
        "SELECT ps_partkey, ps_availqty * ps_supplycost AS stock_value FROM {0}",
    ),
    TestCase::new(
        "divide",
        PARTSUPP,
        "SELECT ps_partkey, ps_availqty / ps_suppkey AS ratio, ps_supplycost / 3 AS third \
         FROM {0}",
    ),
    TestCase::new("modulus", PARTSUPP, "SELECT ps_partkey, ps_partkey % 7 AS bucket FROM {0}"),
    TestCase::new(
        "power",
        PARTSUPP,
        "SELECT ps_partkey, power(ps_supplycost, 2) AS squared, ps_suppkey ^ 2 AS supp_squared \
         FROM {0}",
    ),
    TestCase::new("sqrt", PARTSUPP, "SELECT ps_partkey, sqrt(ps_supplycost) AS root FROM {0}"),
    TestCase::new(
        "exp",
        PARTSUPP,
        "SELECT ps_partkey, exp(ps_supplycost / 1000.0) AS growth FROM {0}",
    ),
    TestCase::new("negate", &[], "SELECT a, -a AS negated, negate(b) AS b_negated FROM t"),
    TestCase::new("abs", &[], "SELECT a, abs(a) AS magnitude FROM t").with_reference(abs),
    TestCase::new("sign", &[], "SELECT a, sign(a) AS signum, sign(a * 0.5) AS fsign FROM t"),
    TestCase::new("mixed_arithmetic", &[], "SELECT a, a * b + 1 AS x, a / 2.0 AS half FROM t"),
    TestCase::new(
        "sum",
        PARTSUPP,
        "SELECT sum(ps_availqty) AS quantity, sum(ps_supplycost) AS cost FROM {0}",
    ),
    TestCase::new(
        "avg",
        PARTSUPP,
        "SELECT ps_suppkey, avg(ps_supplycost) AS cost FROM {0} GROUP BY ps_suppkey",
    )
    .with_reference(avg),
    TestCase::new(
        "min_max",
        PARTSUPP,
        "SELECT min(ps_supplycost) AS lowest, max(ps_availqty) AS highest FROM {0}",
    ),
    TestCase::new(
        "count",
        &[],
        "SELECT b, count(a) AS present, count(*) AS total FROM t GROUP BY b",
    ),
    TestCase::new(
        "grouped_sum",
        &[],
        "SELECT c, sum(a) AS total, avg(a) AS mean FROM t GROUP BY c ORDER BY c",
    ),
    // Both groups have 5 rows, and TRUE appears first but sorts last.
    TestCase::new("ordered_ties", &[], "SELECT c, count(*) AS n FROM t GROUP BY c ORDER BY n"),
];

fn add(tables: &[Table]) -> Result<Plan> {
    let mut builder = read(tables, 0)?;
    let (partkey, suppkey) = (builder.field("ps_partkey")?, builder.field("ps_suppkey")?);
    let total = builder.call("add", vec![partkey.clone(), suppkey.clone()])?;
    let columns = vec![(partkey, "ps_partkey"), (suppkey, "ps_suppkey"), (total, "total")];
    Ok(builder.project(columns).build(PRODUCER))
}

fn subtract(tables: &[Table]) -> Result<Plan> {
    let mut builder = read(tables, 0)?;
    let (partkey, suppkey) = (builder.field("ps_partkey")?, builder.field("ps_suppkey")?);
    let difference = builder.call("subtract", vec![partkey.clone(), suppkey.clone()])?;
    let columns =
        vec![(partkey, "ps_partkey"), (suppkey, "ps_suppkey"), (difference, "difference")];
    Ok(builder.project(columns).build(PRODUCER))
}

fn avg(tables: &[Table]) -> Result<Plan> {
    let mut builder = read(tables, 0)?;
    let (suppkey, supplycost) = (builder.field("ps_suppkey")?, builder.field("ps_supplycost")?);
    let cost = builder.measure("avg", vec![supplycost])?;
    Ok(builder.aggregate(vec![(suppkey, "ps_suppkey")], vec![(cost, "cost")]).build(PRODUCER))
}

/// The inline table t isn't a fixture, so its schema is spelled out.
fn abs(_: &[Table]) -> Result<Plan> {
    let table = inline_table(
        "t",
        &[("a", DataType::Integer), ("b", DataType::Integer), ("c", DataType::Boolean)],
    );
    let mut builder = RelBuilder::read(&table.name, (&table).into());
    let a = builder.field("a")?;
    let magnitude = builder.call("abs", vec![a.clone()])?;
    Ok(builder.project(vec![(a, "a"), (magnitude, "magnitude")]).build(PRODUCER))
}
