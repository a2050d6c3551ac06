use std::cell::RefCell;
use std::collections::BTreeMap;

use itertools::Itertools as _;

use super::{Catalog, Transaction};
use crate::error::Result;
use crate::sql::types::{Expression, Row, Rows, Table, Value};
use crate::{errdata, errinput};

/// In-memory storage for tables and their rows. Owned by a single session,
/// and thus single-threaded, but uses interior mutability since catalog and
/// row access take shared references.
#[derive(Debug, Default)]
pub struct Memory {
    tables: RefCell<BTreeMap<String, Heap>>,
}

/// A table's schema and rows, in insertion order.
#[derive(Debug)]
struct Heap {
    schema: Table,
    rows: Vec<Row>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all tables.
    pub fn clear(&self) {
        self.tables.borrow_mut().clear()
    }
}

impl Catalog for Memory {
    fn create_table(&self, table: Table) -> Result<()> {
        table.validate()?;
        let mut tables = self.tables.borrow_mut();
        if tables.contains_key(&table.name) {
            return errinput!("table {} already exists", table.name);
        }
        tables.insert(table.name.clone(), Heap { schema: table, rows: Vec::new() });
        Ok(())
    }

    fn drop_table(&self, table: &str, if_exists: bool) -> Result<bool> {
        let existed = self.tables.borrow_mut().remove(table).is_some();
        if !existed && !if_exists {
            return errinput!("table {table} does not exist");
        }
        Ok(existed)
    }

    fn get_table(&self, table: &str) -> Result<Option<Table>> {
        Ok(self.tables.borrow().get(table).map(|heap| heap.schema.clone()))
    }

    fn list_tables(&self) -> Result<Vec<Table>> {
        Ok(self.tables.borrow().values().map(|heap| heap.schema.clone()).collect())
    }
}

impl Transaction for Memory {
    fn insert(&self, table: &str, rows: Vec<Row>) -> Result<u64> {
        let mut tables = self.tables.borrow_mut();
        let Some(heap) = tables.get_mut(table) else {
            return errinput!("table {table} does not exist");
        };
        let rows: Vec<Row> =
            rows.into_iter().map(|row| heap.schema.validate_row(row)).try_collect()?;
        let count = u64::try_from(rows.len())?;
        heap.rows.extend(rows);
        Ok(count)
    }

    fn scan(&self, table: &str, filter: Option<Expression>) -> Result<Rows> {
        let tables = self.tables.borrow();
        let Some(heap) = tables.get(table) else {
            return errinput!("table {table} does not exist");
        };
        // Rows are copied out, since the iterator can't borrow the storage.
        let mut rows = Vec::with_capacity(heap.rows.len());
        for row in &heap.rows {
            if let Some(filter) = &filter {
                match filter.evaluate(Some(row))? {
                    Value::Boolean(true) => {}
                    Value::Boolean(false) | Value::Null => continue,
                    value => return errdata!("filter returned {value}, expected boolean"),
                }
            }
            rows.push(row.clone());
        }
        Ok(Box::new(rows.into_iter().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::types::{Column, DataType};

    fn table() -> Table {
        Table {
            name: "t".into(),
            columns: vec![
                Column { name: "a".into(), datatype: DataType::Integer, nullable: false },
                Column { name: "b".into(), datatype: DataType::Float, nullable: true },
            ],
        }
    }

    #[test]
    fn create_and_drop() -> Result<()> {
        let memory = Memory::new();
        memory.create_table(table())?;
        assert!(memory.create_table(table()).is_err());
        assert_eq!(memory.list_tables()?, vec![table()]);
        assert!(memory.drop_table("t", false)?);
        assert!(!memory.drop_table("t", true)?);
        assert!(memory.drop_table("t", false).is_err());
        assert!(memory.must_get_table("t").is_err());
        Ok(())
    }

    #[test]
    fn insert_is_atomic() -> Result<()> {
        let memory = Memory::new();
        memory.create_table(table())?;
        let rows = vec![
            vec![Value::Integer(1), Value::Integer(2)],
            vec![Value::Null, Value::Float(1.0)],
        ];
        assert!(memory.insert("t", rows).is_err());
        assert_eq!(memory.scan("t", None)?.count(), 0);
        Ok(())
    }

    #[test]
    fn scan_filters() -> Result<()> {
        let memory = Memory::new();
        memory.create_table(table())?;
        let rows = vec![
            vec![Value::Integer(1), Value::Null],
            vec![Value::Integer(2), Value::Float(2.5)],
            vec![Value::Integer(3), Value::Float(0.5)],
        ];
        assert_eq!(memory.insert("t", rows)?, 3);

        // b > 1 skips the NULL row.
        let filter = Expression::GreaterThan(
            Expression::Column(1).into(),
            Value::Integer(1).into(),
        );
        let rows: Vec<Row> = memory.scan("t", Some(filter))?.try_collect()?;
        assert_eq!(rows, vec![vec![Value::Integer(2), Value::Float(2.5)]]);
        Ok(())
    }
}
