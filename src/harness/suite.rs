use std::path::Path;

use arrow::record_batch::RecordBatch;
use log::{debug, info, warn};

use super::cases::Category;
use super::compare::{compare, render, CompareOptions, Mismatch};
use super::{Consumer, Producer, TestCase};
use crate::columnar;
use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use crate::fixture::FixtureLoader as _;
use crate::ir::PlanPayload;
use crate::sql::engine::Session;

/// Selects one of the suite's consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerKind {
    /// The reference SQL session, consuming binary plans.
    Sql,
    /// The columnar engine, consuming textual plans.
    Columnar,
}

impl ConsumerKind {
    pub const ALL: [ConsumerKind; 2] = [ConsumerKind::Sql, ConsumerKind::Columnar];
}

/// The harness stage where a case failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Loading fixtures or substituting table names.
    Fixture,
    /// Running the SQL directly, or compiling it into a plan.
    Compile,
    /// Executing the plan on the consumer.
    Execute,
    /// Building or executing the reference plan.
    Reference,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Fixture => "fixture",
            Self::Compile => "compile",
            Self::Execute => "execute",
            Self::Reference => "reference",
        })
    }
}

/// A case error, with the unchanged engine error and the stage it surfaced
/// in.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseError {
    pub case: String,
    pub stage: Stage,
    pub error: Error,
}

impl std::fmt::Display for CaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "case {} failed at {} stage: {}", self.case, self.stage, self.error)
    }
}

impl std::error::Error for CaseError {}

/// The comparison results of a case on a consumer.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    /// The case, as category/name.
    pub case: String,
    /// The consumer name.
    pub consumer: &'static str,
    /// The number of expected rows.
    pub rows: usize,
    /// The compiled plan's result compared against direct SQL.
    pub plan: std::result::Result<(), Mismatch>,
    /// The reference plan's result compared against direct SQL, if the case
    /// has a reference builder.
    pub reference: Option<std::result::Result<(), Mismatch>>,
}

impl Report {
    /// Returns true if all paths matched.
    pub fn is_ok(&self) -> bool {
        self.plan.is_ok() && !matches!(self.reference, Some(Err(_)))
    }

    /// Panics if any path mismatched, naming the case, consumer and path.
    pub fn assert_ok(&self) {
        if let Err(mismatch) = &self.plan {
            panic!("case {} on {} consumer: plan mismatch: {mismatch}", self.case, self.consumer);
        }
        if let Some(Err(mismatch)) = &self.reference {
            panic!(
                "case {} on {} consumer: reference mismatch: {mismatch}",
                self.case, self.consumer
            );
        }
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = |result: &std::result::Result<(), Mismatch>| match result {
            Ok(()) => "ok".to_string(),
            Err(mismatch) => format!("MISMATCH ({mismatch})"),
        };
        let plan = status(&self.plan);
        write!(f, "{} [{}] {} rows: plan {plan}", self.case, self.consumer, self.rows)?;
        if let Some(reference) = &self.reference {
            write!(f, ", reference {}", status(reference))?;
        }
        Ok(())
    }
}

/// A conformance suite for one category. Owns a reference SQL session and a
/// columnar engine, both closed when the suite is dropped.
pub struct Suite {
    config: HarnessConfig,
    category: Category,
    session: Session,
    engine: columnar::Engine,
}

impl Suite {
    /// Sets up a suite: connects the session, enables plans, and creates the
    /// category's inline tables in both engines.
    pub fn setup(config: HarnessConfig, category: Category) -> Result<Self> {
        let mut suite =
            Self { config, category, session: Session::connect(), engine: columnar::Engine::new() };
        suite.session.execute("INSTALL plans")?;
        suite.session.execute("LOAD plans")?;
        for statement in category.setup() {
            suite.session.execute(statement)?;
        }
        for table in suite.session.tables()? {
            suite.engine.register_table(&table, suite.session.export_table(&table)?)?;
        }
        info!("set up {category} suite with {} inline tables", suite.engine.table_names().len());
        Ok(suite)
    }

    /// Returns the suite's category.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Returns the given consumer.
    pub fn consumer(&self, kind: ConsumerKind) -> &dyn Consumer {
        match kind {
            ConsumerKind::Sql => &self.session,
            ConsumerKind::Columnar => &self.engine,
        }
    }

    /// Loads fixture files into both engines, returning their table names.
    pub fn load(&mut self, files: &[&str]) -> Result<Vec<String>> {
        let data_dir = Path::new(&self.config.data_dir);
        let names = self.session.load(data_dir, files)?;
        self.engine.load(data_dir, files)?;
        Ok(names)
    }

    /// Runs a SQL query directly on the reference session.
    pub fn query(&mut self, sql: &str) -> Result<RecordBatch> {
        self.session.query(sql)
    }

    /// Checks a case on a consumer: runs the SQL directly, then compiles it
    /// into a plan for the consumer and compares the results. Cases with a
    /// reference builder also have the reference plan run and compared.
    pub fn check(
        &mut self,
        case: &TestCase,
        kind: ConsumerKind,
    ) -> std::result::Result<Report, CaseError> {
        let name = format!("{}/{}", self.category, case.name);
        let fail = |stage| {
            let name = name.clone();
            move |error| CaseError { case: name, stage, error }
        };

        let tables = self.load(case.files).map_err(fail(Stage::Fixture))?;
        let sql = case.sql_for(&tables).map_err(fail(Stage::Fixture))?;
        debug!("checking {name} with {sql}");

        let expected = self.session.query(&sql).map_err(fail(Stage::Compile))?;
        let consumer = self.consumer(kind);
        let payload = Producer::produce(&self.session, &sql, consumer.format())
            .map_err(fail(Stage::Compile))?;
        let order = payload.decode().map_err(fail(Stage::Compile))?.output_order();
        let actual = consumer.run(&payload).map_err(fail(Stage::Execute))?;
        let float_tolerance = self.config.float_tolerance;
        let plan = compare(&expected, &actual, &CompareOptions { float_tolerance, order });
        if plan.is_err() {
            warn!("{name} plan on {} mismatched:\n{}", consumer.name(), render(&actual));
        }

        let reference = match case.reference {
            Some(build) => {
                let reference = || -> Result<_> {
                    let schemas: Vec<_> =
                        tables.iter().map(|t| self.session.table(t)).collect::<Result<_>>()?;
                    let plan = build(&schemas)?;
                    let payload = PlanPayload::encode(&plan, consumer.format())?;
                    Ok((plan.output_order(), consumer.run(&payload)?))
                };
                let (order, actual) = reference().map_err(fail(Stage::Reference))?;
                let options = CompareOptions { float_tolerance, order };
                let result = compare(&expected, &actual, &options);
                if result.is_err() {
                    let rendered = render(&actual);
                    warn!("{name} reference on {} mismatched:\n{rendered}", consumer.name());
                }
                Some(result)
            }
            None => None,
        };

        Ok(Report {
            case: name,
            consumer: consumer.name(),
            rows: expected.num_rows(),
            plan,
            reference,
        })
    }

    /// Checks every case of the category on every consumer.
    pub fn check_all(&mut self) -> Vec<std::result::Result<Report, CaseError>> {
        let mut results = Vec::new();
        for case in self.category.cases() {
            for kind in ConsumerKind::ALL {
                results.push(self.check(case, kind));
            }
        }
        results
    }
}

impl Drop for Suite {
    fn drop(&mut self) {
        self.session.close();
        self.engine.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A config without generated fixtures. Only inline-table cases can run.
    fn config() -> HarnessConfig {
        HarnessConfig { data_dir: "does/not/exist".into(), ..HarnessConfig::default() }
    }

    #[test]
    fn inline_cases_match() -> Result<()> {
        for category in [Category::Arithmetic, Category::Boolean] {
            let mut suite = Suite::setup(config(), category)?;
            for case in category.cases().iter().filter(|case| case.files.is_empty()) {
                for kind in ConsumerKind::ALL {
                    let report = suite.check(case, kind).map_err(|err| err.error)?;
                    report.assert_ok();
                    assert_eq!(report.reference.is_some(), case.reference.is_some());
                }
            }
        }
        Ok(())
    }

    #[test]
    fn missing_fixture_fails_at_fixture_stage() -> Result<()> {
        let mut suite = Suite::setup(config(), Category::Rounding)?;
        let case = Category::Rounding.case("ceil")?;
        let err = suite.check(case, ConsumerKind::Columnar).unwrap_err();
        assert_eq!(err.stage, Stage::Fixture);
        assert_eq!(err.case, "rounding/ceil");
        Ok(())
    }

    #[test]
    fn engine_errors_pass_through() -> Result<()> {
        let mut suite = Suite::setup(config(), Category::Arithmetic)?;
        let case = TestCase::new("unknown_function", &[], "SELECT nope(a) FROM t");
        let err = suite.check(&case, ConsumerKind::Sql).unwrap_err();
        assert_eq!(err.stage, Stage::Compile);
        assert!(matches!(err.error, Error::InvalidInput(_)));

        let case = TestCase::new("placeholder", &[], "SELECT a FROM {0}");
        let err = suite.check(&case, ConsumerKind::Sql).unwrap_err();
        assert_eq!(err.stage, Stage::Fixture);
        Ok(())
    }

    #[test]
    fn ordered_case_compares_in_order() -> Result<()> {
        let mut suite = Suite::setup(config(), Category::Boolean)?;
        let report = suite.check(Category::Boolean.case("comparison")?, ConsumerKind::Columnar);
        let report = report.map_err(|err| err.error)?;
        assert!(report.is_ok());
        assert_eq!(report.rows, 10);
        Ok(())
    }

    #[test]
    #[should_panic(expected = "case arithmetic/x on sql consumer: plan mismatch")]
    fn report_panics_on_mismatch() {
        let report = Report {
            case: "arithmetic/x".into(),
            consumer: "sql",
            rows: 1,
            plan: Err(Mismatch::RowCount { expected: 1, actual: 0 }),
            reference: None,
        };
        assert!(!report.is_ok());
        report.assert_ok();
    }
}
