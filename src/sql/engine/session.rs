use std::collections::BTreeSet;

use arrow::record_batch::RecordBatch;
use itertools::Itertools as _;
use log::{debug, info};

use super::{Catalog as _, Memory, Transaction as _};
use crate::error::Result;
use crate::ir::{PlanFormat, PlanPayload};
use crate::sql::execution::{self, ExecutionResult};
use crate::sql::parser::{ast, Parser};
use crate::sql::planner::{self, Plan, Planner};
use crate::sql::types::{batch, DataType, Row, Table};
use crate::{errdata, errinput};

/// The producer name recorded in plans compiled by this engine.
pub const PRODUCER: &str = concat!("planharness-sql/", env!("CARGO_PKG_VERSION"));

/// The extension that enables compiling and executing portable plans.
const PLANS_EXTENSION: &str = "plans";

/// Extensions known to the engine.
const EXTENSIONS: &[&str] = &[PLANS_EXTENSION];

/// A SQL session, which executes SQL statements and portable plans against
/// its own in-memory tables. Tables live as long as the session.
#[derive(Debug, Default)]
pub struct Session {
    /// The session's tables.
    storage: Memory,
    /// Installed extensions.
    installed: BTreeSet<String>,
    /// Extensions loaded into the session. Must be installed first.
    loaded: BTreeSet<String>,
    /// Whether the session has been closed.
    closed: bool,
}

/// A session statement result.
#[derive(Debug, PartialEq)]
pub enum StatementResult {
    CreateTable { name: String, count: Option<u64> },
    DropTable { name: String, existed: bool },
    Insert { count: u64 },
    Install { extension: String },
    Load { extension: String },
    Select { columns: Vec<String>, types: Vec<Option<DataType>>, rows: Vec<Row> },
}

impl StatementResult {
    /// Converts a SELECT result into a record batch.
    pub fn into_record_batch(self) -> Result<RecordBatch> {
        let StatementResult::Select { columns, types, rows } = self else {
            return errinput!("statement did not return rows");
        };
        batch::to_record_batch(&columns, &types, &rows)
    }
}

impl Session {
    /// Connects a new session, with no tables or extensions.
    pub fn connect() -> Self {
        debug!("connecting SQL session");
        Self::default()
    }

    /// Executes a SQL statement.
    pub fn execute(&mut self, statement: &str) -> Result<StatementResult> {
        self.check_open()?;
        debug!("executing {statement}");
        let statement = Parser::parse(statement)?;
        Ok(match statement {
            ast::Statement::Install { extension } => {
                Self::check_extension(&extension)?;
                self.installed.insert(extension.clone());
                StatementResult::Install { extension }
            }
            ast::Statement::Load { extension } => {
                Self::check_extension(&extension)?;
                if !self.installed.contains(&extension) {
                    return errinput!("extension {extension} is not installed");
                }
                self.loaded.insert(extension.clone());
                StatementResult::Load { extension }
            }
            statement => {
                let plan = Planner::new(&self.storage).build(statement)?;
                match execution::execute_plan(plan, &self.storage, &self.storage)? {
                    ExecutionResult::CreateTable { name, count } => {
                        StatementResult::CreateTable { name, count }
                    }
                    ExecutionResult::DropTable { name, existed } => {
                        StatementResult::DropTable { name, existed }
                    }
                    ExecutionResult::Insert { count } => StatementResult::Insert { count },
                    ExecutionResult::Select { rows, columns, types } => {
                        let rows = rows.try_collect()?;
                        StatementResult::Select { columns, types, rows }
                    }
                }
            }
        })
    }

    /// Executes a SQL query, returning its result as a record batch.
    pub fn query(&mut self, query: &str) -> Result<RecordBatch> {
        self.execute(query)?.into_record_batch()
    }

    /// Compiles a SQL query into a portable plan payload in the given format.
    /// Requires the plans extension.
    pub fn produce(&self, query: &str, format: PlanFormat) -> Result<PlanPayload> {
        self.check_open()?;
        self.check_loaded(PLANS_EXTENSION)?;
        let statement = Parser::parse(query)?;
        if !matches!(statement, ast::Statement::Select { .. }) {
            return errinput!("only SELECT statements can be compiled to plans");
        }
        let Plan::Select(node) = Planner::new(&self.storage).build(statement)? else {
            return errdata!("SELECT statement did not produce a query plan");
        };
        let plan = planner::to_ir(&node, PRODUCER)?;
        debug!("compiled {query} to plan using {} functions", plan.extensions.len());
        PlanPayload::encode(&plan, format)
    }

    /// Executes a portable plan payload, returning the result as a record
    /// batch. Requires the plans extension.
    pub fn execute_plan(&self, payload: &PlanPayload) -> Result<RecordBatch> {
        self.check_open()?;
        self.check_loaded(PLANS_EXTENSION)?;
        let plan = payload.decode()?;
        let (node, columns) = planner::from_ir(&plan, &self.storage)?;
        let types = node.column_types();
        let rows: Vec<Row> = execution::execute(node, &self.storage)?.try_collect()?;
        batch::to_record_batch(&columns, &types, &rows)
    }

    /// Exports a table's rows as a record batch.
    pub fn export_table(&self, name: &str) -> Result<RecordBatch> {
        self.check_open()?;
        let table = self.storage.must_get_table(name)?;
        let rows: Vec<Row> = self.storage.scan(name, None)?.try_collect()?;
        let columns = table.columns.iter().map(|c| c.name.clone()).collect_vec();
        let types = table.columns.iter().map(|c| Some(c.datatype)).collect_vec();
        batch::to_record_batch(&columns, &types, &rows)
    }

    /// Returns a table's schema.
    pub fn table(&self, name: &str) -> Result<Table> {
        self.check_open()?;
        self.storage.must_get_table(name)
    }

    /// Returns the names of all tables.
    pub fn tables(&self) -> Result<Vec<String>> {
        self.check_open()?;
        Ok(self.storage.list_tables()?.into_iter().map(|t| t.name).collect())
    }

    /// Closes the session, dropping all tables. Further use errors.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        let tables = self.storage.list_tables().map_or(0, |tables| tables.len());
        info!("closing SQL session with {tables} tables");
        self.storage.clear();
        self.loaded.clear();
        self.closed = true;
    }

    /// Returns true if the session is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return errinput!("session is closed");
        }
        Ok(())
    }

    fn check_loaded(&self, extension: &str) -> Result<()> {
        if !self.loaded.contains(extension) {
            return errinput!("extension {extension} is not loaded");
        }
        Ok(())
    }

    fn check_extension(extension: &str) -> Result<()> {
        if !EXTENSIONS.contains(&extension) {
            return errinput!("unknown extension {extension}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::types::Value;
    use arrow::array::AsArray as _;
    use arrow::datatypes::Int64Type;

    fn session() -> Result<Session> {
        let mut session = Session::connect();
        session.execute("CREATE TABLE t (a INTEGER, b FLOAT, c STRING)")?;
        session.execute("INSERT INTO t VALUES (1, 1.5, 'x'), (2, NULL, 'y'), (NULL, 3.0, NULL)")?;
        Ok(session)
    }

    #[test]
    fn produce_requires_extension() -> Result<()> {
        let mut session = session()?;
        assert!(session.produce("SELECT a FROM t", PlanFormat::Json).is_err());
        assert!(session.execute("LOAD plans").is_err());
        session.execute("INSTALL plans")?;
        session.execute("LOAD plans")?;
        session.produce("SELECT a FROM t", PlanFormat::Json)?;
        assert!(session.execute("INSTALL nope").is_err());
        Ok(())
    }

    #[test]
    fn produce_rejects_non_queries() -> Result<()> {
        let mut session = session()?;
        session.execute("INSTALL plans")?;
        session.execute("LOAD plans")?;
        assert!(session.produce("DROP TABLE t", PlanFormat::Binary).is_err());
        assert!(session.produce("SELECT * FROM missing", PlanFormat::Binary).is_err());
        assert!(session.produce("SELECT nope(a) FROM t", PlanFormat::Binary).is_err());
        Ok(())
    }

    #[test]
    fn plan_matches_sql() -> Result<()> {
        let mut session = session()?;
        session.execute("INSTALL plans")?;
        session.execute("LOAD plans")?;
        let query = "SELECT a * 2 AS twice, b FROM t WHERE a IS NOT NULL ORDER BY a DESC";
        let expected = session.query(query)?;
        for format in [PlanFormat::Binary, PlanFormat::Json] {
            let payload = session.produce(query, format)?;
            assert_eq!(session.execute_plan(&payload)?, expected);
        }
        let column = expected.column(0).as_primitive::<Int64Type>();
        assert_eq!(column.values().to_vec(), vec![4, 2]);
        Ok(())
    }

    #[test]
    fn create_table_as_replaces() -> Result<()> {
        let mut session = session()?;
        session.execute("CREATE TABLE u AS SELECT a, c FROM t WHERE a > 1")?;
        assert!(session.execute("CREATE TABLE u AS SELECT a FROM t").is_err());
        let result = session.execute("CREATE OR REPLACE TABLE u AS SELECT a FROM t")?;
        assert_eq!(result, StatementResult::CreateTable { name: "u".into(), count: Some(3) });
        assert_eq!(session.export_table("u")?.num_rows(), 3);
        Ok(())
    }

    #[test]
    fn select_without_from() -> Result<()> {
        let mut session = Session::connect();
        let result = session.execute("SELECT 1 + 2, 7 / 2.0 AS half")?;
        assert_eq!(
            result,
            StatementResult::Select {
                columns: vec!["column0".into(), "half".into()],
                types: vec![Some(DataType::Integer), Some(DataType::Float)],
                rows: vec![vec![Value::Integer(3), Value::Float(3.5)]],
            }
        );
        Ok(())
    }

    #[test]
    fn closed_session_errors() -> Result<()> {
        let mut session = session()?;
        session.close();
        assert!(session.is_closed());
        assert!(session.execute("SELECT 1").is_err());
        assert!(session.export_table("t").is_err());
        Ok(())
    }
}
