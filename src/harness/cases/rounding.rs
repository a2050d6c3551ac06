//! Rounding functions over partsupp costs and quantities.

use super::read;
use crate::error::Result;
use crate::harness::TestCase;
use crate::ir::Plan;
use crate::sql::engine::PRODUCER;
use crate::sql::types::Table;

const PARTSUPP: &[&str] = &["partsupp.parquet"];

pub const CASES: &[TestCase] = &[
    TestCase::new("ceil", PARTSUPP, "SELECT ps_partkey, ceil(ps_supplycost) AS cost FROM {0}")
        .with_reference(ceil),
    TestCase::new("floor", PARTSUPP, "SELECT ps_partkey, floor(ps_supplycost) AS cost FROM {0}"),
    TestCase::new("round", PARTSUPP, "SELECT ps_partkey, round(ps_supplycost) AS cost FROM {0}"),
    TestCase::new(
        "round_digits",
        PARTSUPP,
        "SELECT ps_partkey, round(ps_supplycost, 1) AS tenths, round(ps_supplycost, -2) AS \
         hundreds FROM {0}",
    )
    .with_reference(round_digits),
    TestCase::new(
        "round_integer",
        PARTSUPP,
        "SELECT ps_partkey, round(ps_availqty, -1) AS tens, ceil(ps_availqty) AS same FROM {0}",
    ),
    TestCase::new(
        "round_ordered",
        PARTSUPP,
        "SELECT ps_suppkey, round(ps_supplycost, 0) AS cost FROM {0} \
         ORDER BY ps_suppkey, cost DESC LIMIT 20",
    ),
];

fn ceil(tables: &[Table]) -> Result<Plan> {
    let mut builder = read(tables, 0)?;
    let (partkey, supplycost) = (builder.field("ps_partkey")?, builder.field("ps_supplycost")?);
    let cost = builder.call("ceil", vec![supplycost])?;
    Ok(builder.project(vec![(partkey, "ps_partkey"), (cost, "cost")]).build(PRODUCER))
}

fn round_digits(tables: &[Table]) -> Result<Plan> {
    let mut builder = read(tables, 0)?;
    let (partkey, supplycost) = (builder.field("ps_partkey")?, builder.field("ps_supplycost")?);
    let (one, minus_two) = (builder.literal(1i64), builder.literal(-2i64));
    let tenths = builder.call("round", vec![supplycost.clone(), one])?;
    let hundreds = builder.call("round", vec![supplycost, minus_two])?;
    let columns = vec![(partkey, "ps_partkey"), (tenths, "tenths"), (hundreds, "hundreds")];
    Ok(builder.project(columns).build(PRODUCER))
}
