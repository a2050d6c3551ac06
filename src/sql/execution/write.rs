use std::collections::HashMap;

use crate::errinput;
use crate::error::Result;
use crate::sql::engine::Transaction;
use crate::sql::types::{Row, Rows, Table, Value};

/// Inserts rows into a table (i.e. INSERT) from the given source. Returns the
/// number of rows inserted.
///
/// If given, column_map contains the mapping of table → source columns for
/// all columns in source. Otherwise, every column in source corresponds to
/// the table column at the same position. Missing columns get NULL.
pub fn insert(
    txn: &impl Transaction,
    table: Table,
    column_map: Option<HashMap<usize, usize>>,
    source: Rows,
) -> Result<u64> {
    let mut rows: Vec<Row> = Vec::new();
    for values in source {
        let values = values?;
        // Fast path: the row is already complete, with no column mapping.
        if values.len() == table.columns.len() && column_map.is_none() {
            rows.push(values);
            continue;
        }
        if values.len() > table.columns.len() {
            return errinput!("too many values for table {}", table.name);
        }
        if let Some(column_map) = &column_map {
            if column_map.len() != values.len() {
                return errinput!("column and value counts do not match");
            }
        }
        let mut row = Vec::with_capacity(table.columns.len());
        for cidx in 0..table.columns.len() {
            if column_map.is_none() && cidx < values.len() {
                row.push(values[cidx].clone())
            } else if let Some(vidx) = column_map.as_ref().and_then(|c| c.get(&cidx)).copied() {
                row.push(values[vidx].clone())
            } else {
                row.push(Value::Null)
            }
        }
        rows.push(row);
    }
    txn.insert(&table.name, rows)
}
