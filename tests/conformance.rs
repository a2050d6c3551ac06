//! End-to-end conformance tests: every registered case on every consumer,
//! over freshly generated fixtures, plus the harness scenarios.

use std::path::Path;

use planharness::columnar;
use planharness::error::Result;
use planharness::fixture::{tpch, FixtureLoader as _};
use planharness::harness::cases::{approximation, Category};
use planharness::harness::{compare, CompareOptions, Consumer, ConsumerKind, Producer, Suite};
use planharness::ir::{OutputOrder, PlanFormat};
use planharness::sql::engine::Session;
use planharness::HarnessConfig;
use tempfile::TempDir;
use test_case::test_case;

/// Generates small fixtures into a temporary directory.
fn fixtures() -> Result<TempDir> {
    let dir = tempfile::Builder::new().prefix("planharness").tempdir()?;
    tpch::generate(dir.path(), 0.001, 7)?;
    Ok(dir)
}

fn config(dir: &TempDir) -> HarnessConfig {
    HarnessConfig {
        data_dir: dir.path().to_string_lossy().to_string(),
        ..HarnessConfig::default()
    }
}

/// Connects a session with plans enabled and the given fixtures loaded.
fn session(dir: &Path, files: &[&str]) -> Result<(Session, Vec<String>)> {
    let mut session = Session::connect();
    session.execute("INSTALL plans")?;
    session.execute("LOAD plans")?;
    let tables = session.load(dir, files)?;
    Ok((session, tables))
}

#[test_case(Category::Arithmetic, "add")]
#[test_case(Category::Arithmetic, "subtract")]
#[test_case(Category::Arithmetic, "multiply")]
#[test_case(Category::Arithmetic, "divide")]
#[test_case(Category::Arithmetic, "modulus")]
#[test_case(Category::Arithmetic, "power")]
#[test_case(Category::Arithmetic, "sqrt")]
#[test_case(Category::Arithmetic, "exp")]
#[test_case(Category::Arithmetic, "negate")]
#[test_case(Category::Arithmetic, "abs")]
#[test_case(Category::Arithmetic, "sign")]
#[test_case(Category::Arithmetic, "mixed_arithmetic")]
#[test_case(Category::Arithmetic, "sum")]
#[test_case(Category::Arithmetic, "avg")]
#[test_case(Category::Arithmetic, "min_max")]
#[test_case(Category::Arithmetic, "count")]
#[test_case(Category::Arithmetic, "grouped_sum")]
#[test_case(Category::Arithmetic, "ordered_ties")]
#[test_case(Category::Boolean, "or")]
#[test_case(Category::Boolean, "and")]
#[test_case(Category::Boolean, "not")]
#[test_case(Category::Boolean, "xor")]
#[test_case(Category::Boolean, "predicate")]
#[test_case(Category::Boolean, "null_operand")]
#[test_case(Category::Boolean, "is_null")]
#[test_case(Category::Boolean, "is_null_or")]
#[test_case(Category::Boolean, "is_not_null")]
#[test_case(Category::Boolean, "comparison")]
#[test_case(Category::Boolean, "bool_and")]
#[test_case(Category::Boolean, "bool_and_nulls")]
#[test_case(Category::Boolean, "bool_or")]
#[test_case(Category::Rounding, "ceil")]
#[test_case(Category::Rounding, "floor")]
#[test_case(Category::Rounding, "round")]
#[test_case(Category::Rounding, "round_digits")]
#[test_case(Category::Rounding, "round_integer")]
#[test_case(Category::Rounding, "round_ordered")]
#[test_case(Category::Approximation, "approx_count_distinct")]
#[test_case(Category::Approximation, "approx_count_distinct_grouped")]
fn conforms(category: Category, name: &str) -> Result<()> {
    let dir = fixtures()?;
    let mut suite = Suite::setup(config(&dir), category)?;
    let case = category.case(name)?;
    for kind in ConsumerKind::ALL {
        let report = suite.check(case, kind).map_err(|err| err.error)?;
        report.assert_ok();
        assert_eq!(report.reference.is_some(), case.reference.is_some());
    }
    Ok(())
}

/// Every registered case passes on every consumer, including cases missing
/// from the list above.
#[test]
fn registry_passes() -> Result<()> {
    let dir = fixtures()?;
    for category in Category::ALL {
        let mut suite = Suite::setup(config(&dir), category)?;
        let results = suite.check_all();
        assert_eq!(results.len(), category.cases().len() * ConsumerKind::ALL.len());
        for result in results {
            match result {
                Ok(report) => report.assert_ok(),
                Err(err) => panic!("{err}"),
            }
        }
    }
    Ok(())
}

/// The approximate distinct count is close to the exact one.
#[test]
fn approx_count_distinct_within_tolerance() -> Result<()> {
    let dir = fixtures()?;
    let config = config(&dir);
    let tolerance = config.approx_tolerance;
    let mut suite = Suite::setup(config, Category::Approximation)?;
    let tables = suite.load(&["lineitem.parquet"])?;
    for column in ["l_orderkey", "l_partkey", "l_shipmode"] {
        let error = approximation::relative_error(&mut suite, &tables[0], column)?;
        assert!(error <= tolerance, "{column} estimate off by {error}");
    }
    Ok(())
}

/// Binary and JSON encodings of the same plan execute to identical tables on
/// both consumers, equal to direct SQL.
#[test]
fn encodings_round_trip() -> Result<()> {
    let dir = fixtures()?;
    let files = ["orders.parquet"];
    let (mut session, tables) = session(dir.path(), &files)?;
    let mut engine = columnar::Engine::new();
    engine.load(dir.path(), &files)?;

    let sql = format!(
        "SELECT o_orderstatus, count(*) AS orders, sum(o_totalprice) AS total FROM {} \
         WHERE o_shippriority = 0 GROUP BY o_orderstatus ORDER BY o_orderstatus",
        tables[0]
    );
    let expected = session.query(&sql)?;
    assert!(expected.num_rows() > 0);
    let order = session.produce(&sql, PlanFormat::Json)?.decode()?.output_order();
    assert_eq!(order, Some(OutputOrder { columns: vec![0], truncated: false }));
    let float_tolerance = HarnessConfig::default().float_tolerance;
    let options = CompareOptions { float_tolerance, order };

    let consumers: [&dyn Consumer; 2] = [&session, &engine];
    for consumer in consumers {
        let binary = consumer.run(&Producer::produce(&session, &sql, PlanFormat::Binary)?)?;
        let json = consumer.run(&Producer::produce(&session, &sql, PlanFormat::Json)?)?;
        assert_eq!(binary, json, "{} results differ by encoding", consumer.name());
        assert_eq!(compare(&expected, &binary, &options), Ok(()));
    }
    Ok(())
}

/// A plan referencing a table the consumer never loaded fails, rather than
/// returning an empty table.
#[test]
fn missing_table_errors() -> Result<()> {
    let dir = fixtures()?;
    let (session, tables) = session(dir.path(), &["lineitem.parquet"])?;
    let sql = format!("SELECT l_orderkey FROM {} WHERE l_quantity > 10.0", tables[0]);

    let engine = columnar::Engine::new();
    let payload = session.produce(&sql, engine.format())?;
    assert!(engine.run(&payload).is_err());

    let (other, _) = session_without_tables()?;
    let payload = session.produce(&sql, other.format())?;
    assert!(other.run(&payload).is_err());
    Ok(())
}

fn session_without_tables() -> Result<(Session, Vec<String>)> {
    let dir = tempfile::Builder::new().prefix("planharness-empty").tempdir()?;
    session(dir.path(), &[])
}

/// Loading the same fixture twice replaces the table with identical
/// contents.
#[test]
fn loading_is_idempotent() -> Result<()> {
    let dir = fixtures()?;
    let (mut session, tables) = session(dir.path(), &["partsupp.parquet"])?;
    let first = session.export_table(&tables[0])?;
    assert_eq!(session.load(dir.path(), &["partsupp.parquet"])?, tables);
    assert_eq!(session.export_table(&tables[0])?, first);
    assert_eq!(session.tables()?, vec!["partsupp".to_string()]);
    Ok(())
}

/// Fixture file names are sanitized into table names.
#[test]
fn fixture_names_are_sanitized() -> Result<()> {
    let dir = fixtures()?;
    std::fs::copy(dir.path().join("lineitem.parquet"), dir.path().join("line-item.parquet"))?;
    let (mut session, tables) = session(dir.path(), &["line-item.parquet"])?;
    assert_eq!(tables, vec!["lineitem".to_string()]);
    let count = session.query("SELECT count(*) AS n FROM lineitem")?;
    assert_eq!(count.num_rows(), 1);
    Ok(())
}

/// A missing fixture is a setup failure.
#[test]
fn missing_fixture_errors() -> Result<()> {
    let dir = tempfile::Builder::new().prefix("planharness-missing").tempdir()?;
    assert!(session(dir.path(), &["lineitem.parquet"]).is_err());
    let mut engine = columnar::Engine::new();
    assert!(engine.load(dir.path(), &["lineitem.parquet"]).is_err());
    Ok(())
}

/// Boolean predicates over a NULL operand follow three-valued logic on both
/// paths: the NULL row is neither selected by the predicate nor by its
/// negation.
#[test]
fn three_valued_predicate() -> Result<()> {
    let dir = fixtures()?;
    let mut suite = Suite::setup(config(&dir), Category::Boolean)?;
    let selected = suite.query("SELECT a FROM u WHERE c")?.num_rows();
    let rejected = suite.query("SELECT a FROM u WHERE NOT c")?.num_rows();
    assert_eq!(selected + rejected, 9);
    let selected = suite.query("SELECT b FROM t WHERE a > 2")?.num_rows();
    let rejected = suite.query("SELECT b FROM t WHERE NOT (a > 2)")?.num_rows();
    assert_eq!((selected, rejected), (7, 2));

    for kind in ConsumerKind::ALL {
        let report = suite.check(Category::Boolean.case("predicate")?, kind);
        let report = report.map_err(|err| err.error)?;
        report.assert_ok();
        assert_eq!(report.rows, 4);
    }
    Ok(())
}
