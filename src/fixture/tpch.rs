//! Generates TPC-H style Parquet fixtures: lineitem, orders and partsupp.
//!
//! Row counts follow the TPC-H cardinalities scaled by the scale factor
//! (6M lineitems, 1.5M orders and 800k partsupps at scale factor 1), with at
//! least one row per table. Generation is deterministic for a given scale
//! factor and seed. The value distributions loosely follow TPC-H, but the
//! data is not a conforming TPC-H dataset.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType as ArrowType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;
use rand::{Rng as _, SeedableRng as _};

use super::parquet;
use crate::errinput;
use crate::error::Result;

/// The generated fixture files.
pub const FILES: &[&str] = &["lineitem.parquet", "orders.parquet", "partsupp.parquet"];

/// Rows per record batch written.
const BATCH_ROWS: usize = 65_536;

const RETURN_FLAGS: &[&str] = &["A", "N", "R"];
const LINE_STATUSES: &[&str] = &["F", "O"];
const SHIP_MODES: &[&str] = &["AIR", "FOB", "MAIL", "RAIL", "REG AIR", "SHIP", "TRUCK"];
const ORDER_STATUSES: &[&str] = &["F", "O", "P"];
const PRIORITIES: &[&str] = &["1-URGENT", "2-HIGH", "3-MEDIUM", "4-NOT SPECIFIED", "5-LOW"];
const WORDS: &[&str] = &[
    "blithely", "carefully", "deposits", "final", "furiously", "ideas", "packages", "pending",
    "quickly", "regular", "requests", "slyly", "special", "theodolites",
];

/// Generates the fixtures into the given directory, creating it if needed and
/// replacing existing files. Returns the written file paths.
pub fn generate(dir: impl AsRef<Path>, scale_factor: f64, seed: u64) -> Result<Vec<PathBuf>> {
    if !scale_factor.is_finite() || scale_factor <= 0.0 {
        return errinput!("invalid scale factor {scale_factor}");
    }
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let scaled = |base: f64| ((base * scale_factor).round() as usize).max(1);

    let scale = Scale {
        lineitems: scaled(6_000_000.0),
        orders: scaled(1_500_000.0),
        partsupps: scaled(800_000.0),
        parts: scaled(200_000.0),
        suppliers: scaled(10_000.0),
        customers: scaled(150_000.0),
    };
    info!("generating fixtures in {} at scale factor {scale_factor}", dir.display());

    let paths: Vec<PathBuf> = FILES.iter().map(|file| dir.join(file)).collect();
    // Each table gets its own generator, so tables don't depend on each other.
    lineitem(&paths[0], &scale, StdRng::seed_from_u64(seed))?;
    orders(&paths[1], &scale, StdRng::seed_from_u64(seed.wrapping_add(1)))?;
    partsupp(&paths[2], &scale, StdRng::seed_from_u64(seed.wrapping_add(2)))?;
    Ok(paths)
}

/// Table cardinalities.
struct Scale {
    lineitems: usize,
    orders: usize,
    partsupps: usize,
    parts: usize,
    suppliers: usize,
    customers: usize,
}

/// Writes a table in batches, generating the columns of each batch's row
/// range with the given closure.
fn write_table(
    path: &Path,
    schema: SchemaRef,
    rows: usize,
    mut columns: impl FnMut(Range<usize>) -> Vec<ArrayRef>,
) -> Result<()> {
    let mut writer = parquet::writer(path, schema.clone())?;
    let mut start = 0;
    while start < rows {
        let end = (start + BATCH_ROWS).min(rows);
        writer.write(&RecordBatch::try_new(schema.clone(), columns(start..end))?)?;
        start = end;
    }
    writer.close()?;
    info!("wrote {rows} rows to {}", path.display());
    Ok(())
}

fn lineitem(path: &Path, scale: &Scale, mut rng: StdRng) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("l_orderkey", ArrowType::Int64, false),
        Field::new("l_partkey", ArrowType::Int64, false),
        Field::new("l_suppkey", ArrowType::Int64, false),
        Field::new("l_linenumber", ArrowType::Int32, false),
        Field::new("l_quantity", ArrowType::Float64, false),
        Field::new("l_extendedprice", ArrowType::Float64, false),
        Field::new("l_discount", ArrowType::Float64, false),
        Field::new("l_tax", ArrowType::Float64, false),
        Field::new("l_returnflag", ArrowType::Utf8, false),
        Field::new("l_linestatus", ArrowType::Utf8, false),
        Field::new("l_shipdate", ArrowType::Utf8, false),
        Field::new("l_shipmode", ArrowType::Utf8, false),
    ]));

    // Orders have 1-7 lines each, so the order key advances every few rows.
    let (mut orderkey, mut lines, mut linenumber) = (0i64, 0i32, 0i32);
    write_table(path, schema, scale.lineitems, |range| {
        let len = range.len();
        let mut orderkeys = Vec::with_capacity(len);
        let mut partkeys = Vec::with_capacity(len);
        let mut suppkeys = Vec::with_capacity(len);
        let mut linenumbers = Vec::with_capacity(len);
        let mut quantities = Vec::with_capacity(len);
        let mut prices = Vec::with_capacity(len);
        let mut discounts = Vec::with_capacity(len);
        let mut taxes = Vec::with_capacity(len);
        let mut flags = Vec::with_capacity(len);
        let mut statuses = Vec::with_capacity(len);
        let mut dates = Vec::with_capacity(len);
        let mut modes = Vec::with_capacity(len);
        for _ in range {
            if linenumber == lines {
                orderkey += 1;
                lines = rng.gen_range(1..=7);
                linenumber = 0;
            }
            linenumber += 1;
            let partkey = rng.gen_range(1..=scale.parts as i64);
            let quantity = rng.gen_range(1..=50) as f64;
            orderkeys.push(orderkey);
            partkeys.push(partkey);
            suppkeys.push(rng.gen_range(1..=scale.suppliers as i64));
            linenumbers.push(linenumber);
            quantities.push(quantity);
            prices.push(cents(quantity as i64 * retail_price(partkey)));
            discounts.push(cents(rng.gen_range(0..=10)));
            taxes.push(cents(rng.gen_range(0..=8)));
            flags.push(choose(&mut rng, RETURN_FLAGS));
            statuses.push(choose(&mut rng, LINE_STATUSES));
            dates.push(date(&mut rng));
            modes.push(choose(&mut rng, SHIP_MODES));
        }
        vec![
            Arc::new(Int64Array::from(orderkeys)),
            Arc::new(Int64Array::from(partkeys)),
            Arc::new(Int64Array::from(suppkeys)),
            Arc::new(Int32Array::from(linenumbers)),
            Arc::new(Float64Array::from(quantities)),
            Arc::new(Float64Array::from(prices)),
            Arc::new(Float64Array::from(discounts)),
            Arc::new(Float64Array::from(taxes)),
            Arc::new(StringArray::from(flags)),
            Arc::new(StringArray::from(statuses)),
            Arc::new(StringArray::from(dates)),
            Arc::new(StringArray::from(modes)),
        ]
    })
}

fn orders(path: &Path, scale: &Scale, mut rng: StdRng) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("o_orderkey", ArrowType::Int64, false),
        Field::new("o_custkey", ArrowType::Int64, false),
        Field::new("o_orderstatus", ArrowType::Utf8, false),
        Field::new("o_totalprice", ArrowType::Float64, false),
        Field::new("o_orderdate", ArrowType::Utf8, false),
        Field::new("o_orderpriority", ArrowType::Utf8, false),
        Field::new("o_shippriority", ArrowType::Int32, false),
        Field::new("o_comment", ArrowType::Utf8, false),
    ]));
    write_table(path, schema, scale.orders, |range| {
        let len = range.len();
        let mut orderkeys = Vec::with_capacity(len);
        let mut custkeys = Vec::with_capacity(len);
        let mut statuses = Vec::with_capacity(len);
        let mut prices = Vec::with_capacity(len);
        let mut dates = Vec::with_capacity(len);
        let mut priorities = Vec::with_capacity(len);
        let mut comments = Vec::with_capacity(len);
        for i in range {
            orderkeys.push(i as i64 + 1);
            custkeys.push(rng.gen_range(1..=scale.customers as i64));
            statuses.push(choose(&mut rng, ORDER_STATUSES));
            prices.push(cents(rng.gen_range(85_000..=55_000_000)));
            dates.push(date(&mut rng));
            priorities.push(choose(&mut rng, PRIORITIES));
            comments.push(comment(&mut rng));
        }
        vec![
            Arc::new(Int64Array::from(orderkeys)),
            Arc::new(Int64Array::from(custkeys)),
            Arc::new(StringArray::from(statuses)),
            Arc::new(Float64Array::from(prices)),
            Arc::new(StringArray::from(dates)),
            Arc::new(StringArray::from(priorities)),
            Arc::new(Int32Array::from(vec![0; len])),
            Arc::new(StringArray::from(comments)),
        ]
    })
}

fn partsupp(path: &Path, scale: &Scale, mut rng: StdRng) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("ps_partkey", ArrowType::Int64, false),
        Field::new("ps_suppkey", ArrowType::Int64, false),
        Field::new("ps_availqty", ArrowType::Int64, false),
        Field::new("ps_supplycost", ArrowType::Float64, false),
        Field::new("ps_comment", ArrowType::Utf8, false),
    ]));
    // Every part has four suppliers, spread across the supplier keys.
    let suppliers = scale.suppliers as i64;
    write_table(path, schema, scale.partsupps, |range| {
        let len = range.len();
        let mut partkeys = Vec::with_capacity(len);
        let mut suppkeys = Vec::with_capacity(len);
        let mut quantities = Vec::with_capacity(len);
        let mut costs = Vec::with_capacity(len);
        let mut comments = Vec::with_capacity(len);
        for i in range {
            let partkey = (i / 4) as i64 + 1;
            let offset = (i % 4) as i64 * (suppliers / 4 + 1);
            partkeys.push(partkey);
            suppkeys.push((partkey + offset) % suppliers + 1);
            quantities.push(rng.gen_range(1..=9_999i64));
            costs.push(cents(rng.gen_range(100..=100_000)));
            comments.push(comment(&mut rng));
        }
        vec![
            Arc::new(Int64Array::from(partkeys)),
            Arc::new(Int64Array::from(suppkeys)),
            Arc::new(Int64Array::from(quantities)),
            Arc::new(Float64Array::from(costs)),
            Arc::new(StringArray::from(comments)),
        ]
    })
}

/// The TPC-H retail price of a part, in cents.
fn retail_price(partkey: i64) -> i64 {
    90_000 + (partkey / 10) % 20_001 + 100 * (partkey % 1_000)
}

fn cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

fn choose(rng: &mut StdRng, choices: &[&'static str]) -> &'static str {
    choices.choose(rng).copied().unwrap_or_default()
}

/// A date between 1992 and 1998, formatted as YYYY-MM-DD.
fn date(rng: &mut StdRng) -> String {
    let year = rng.gen_range(1992..=1998);
    let (month, day) = (rng.gen_range(1..=12), rng.gen_range(1..=28));
    format!("{year}-{month:02}-{day:02}")
}

fn comment(rng: &mut StdRng) -> String {
    let words = rng.gen_range(2..=6);
    (0..words).map(|_| choose(rng, WORDS)).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use arrow::array::AsArray as _;
    use arrow::datatypes::Int64Type;
    use itertools::Itertools as _;

    use super::*;

    #[test]
    fn generates_scaled_tables() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = generate(dir.path(), 0.001, 7)?;
        let rows: Vec<usize> =
            paths.iter().map(|p| parquet::read_batch(p).map(|b| b.num_rows())).try_collect()?;
        assert_eq!(rows, vec![6_000, 1_500, 800]);

        // Order keys start at 1 and increase, with at most 7 lines per order.
        let lineitem = parquet::read_batch(&paths[0])?;
        let keys = lineitem.column(0).as_primitive::<Int64Type>().values().to_vec();
        assert_eq!(keys[0], 1);
        assert!(keys.windows(2).all(|w| w[1] == w[0] || w[1] == w[0] + 1));
        assert!(keys.chunk_by(|a, b| a == b).all(|lines| lines.len() <= 7));
        Ok(())
    }

    #[test]
    fn deterministic() -> Result<()> {
        let (a, b) = (tempfile::tempdir()?, tempfile::tempdir()?);
        let a = generate(a.path(), 0.0001, 42)?;
        let b = generate(b.path(), 0.0001, 42)?;
        for (a, b) in a.iter().zip(&b) {
            assert_eq!(parquet::read_batch(a)?, parquet::read_batch(b)?);
        }
        Ok(())
    }

    #[test]
    fn tiny_scale_has_rows() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for path in generate(dir.path(), 1e-9, 0)? {
            assert_eq!(parquet::read_batch(path)?.num_rows(), 1);
        }
        Ok(())
    }

    #[test]
    fn invalid_scale_factor() {
        assert!(generate("unused", 0.0, 0).is_err());
        assert!(generate("unused", f64::NAN, 0).is_err());
    }
}
