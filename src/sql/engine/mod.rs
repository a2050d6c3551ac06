//! The reference SQL engine: an in-memory catalog and row storage, and
//! sessions that execute SQL statements and plans against them.

mod memory;
mod session;

pub use memory::Memory;
pub use session::{Session, StatementResult, PRODUCER};

use crate::errinput;
use crate::error::Result;
use crate::sql::types::{Expression, Row, Rows, Table};

/// Row storage. Tables are append-only heaps, read by full scans.
pub trait Transaction {
    /// Inserts rows into a table, validating them against the schema. Either
    /// all rows are inserted or none are.
    fn insert(&self, table: &str, rows: Vec<Row>) -> Result<u64>;
    /// Scans a table's rows, optionally only returning rows for which the
    /// filter evaluates to true.
    fn scan(&self, table: &str, filter: Option<Expression>) -> Result<Rows>;
}

/// The catalog stores table schema information. For simplicity, it only
/// supports creating and dropping tables.
///
/// This is separate from Transaction, even though the storage implements
/// both, to make it clear when catalog access is used (i.e. during planning,
/// not execution).
pub trait Catalog {
    /// Creates a new table. Errors if it already exists.
    fn create_table(&self, table: Table) -> Result<()>;
    /// Drops a table. Errors if it does not exist, unless if_exists is true.
    /// Returns true if the table existed and was deleted.
    fn drop_table(&self, table: &str, if_exists: bool) -> Result<bool>;
    /// Fetches a table schema, or None if it doesn't exist.
    fn get_table(&self, table: &str) -> Result<Option<Table>>;
    /// Returns a list of all table schemas.
    fn list_tables(&self) -> Result<Vec<Table>>;

    /// Fetches a table schema, or errors if it does not exist.
    fn must_get_table(&self, table: &str) -> Result<Table> {
        self.get_table(table)?.ok_or_else(|| errinput!("table {table} does not exist"))
    }
}
