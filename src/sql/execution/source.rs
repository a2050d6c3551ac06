use itertools::Itertools as _;

use crate::errdata;
use crate::error::Result;
use crate::fixture;
use crate::sql::engine::Transaction;
use crate::sql::types::{batch, Expression, Row, Rows, Table};

/// A table scan source.
pub fn scan(txn: &impl Transaction, table: Table, filter: Option<Expression>) -> Result<Rows> {
    txn.scan(&table.name, filter)
}

/// Returns nothing. Used to short-circuit nodes that can't produce any rows.
pub fn nothing() -> Rows {
    Box::new(std::iter::empty())
}

/// Emits predefined constant values.
pub fn values(rows: Vec<Vec<Expression>>) -> Rows {
    Box::new(
        rows.into_iter()
            .map(|row| row.into_iter().map(|value| value.evaluate(None)).collect()),
    )
}

/// Reads all rows of a Parquet file. The file is read eagerly, and must still
/// have the schema it had when the query was planned.
pub fn parquet(path: &str, table: &Table) -> Result<Rows> {
    let mut rows: Vec<Row> = Vec::new();
    for batch in fixture::parquet::read(path)? {
        if batch.num_columns() != table.columns.len() {
            return errdata!("parquet file {path} changed while reading");
        }
        rows.extend(batch::to_rows(&batch)?);
    }
    let rows: Vec<Row> = rows.into_iter().map(|row| table.validate_row(row)).try_collect()?;
    Ok(Box::new(rows.into_iter().map(Ok)))
}
