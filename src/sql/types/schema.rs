use serde::{Deserialize, Serialize};

use super::{DataType, Row, Value};
use crate::errinput;
use crate::error::Result;

/// A table schema. Tables are heap-organized without primary keys, since
/// fixture tables are append-only and only ever scanned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// The table name. Can't be empty.
    pub name: String,
    /// The table's columns. Must have at least one.
    pub columns: Vec<Column>,
}

/// A table column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name. Can't be empty, and must be unique in the table.
    pub name: String,
    /// Column datatype.
    pub datatype: DataType,
    /// Whether the column allows null values.
    pub nullable: bool,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "CREATE TABLE {} (", self.name)?;
        for (i, column) in self.columns.iter().enumerate() {
            write!(f, "  {} {}", column.name, column.datatype)?;
            if !column.nullable {
                write!(f, " NOT NULL")?;
            }
            if i < self.columns.len() - 1 {
                write!(f, ",")?;
            }
            writeln!(f)?;
        }
        write!(f, ")")
    }
}

impl Table {
    /// Validates the table schema.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return errinput!("table name can't be empty");
        }
        if self.columns.is_empty() {
            return errinput!("table {} has no columns", self.name);
        }
        for (i, column) in self.columns.iter().enumerate() {
            if column.name.is_empty() {
                return errinput!("table {} has a column with no name", self.name);
            }
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return errinput!("duplicate column {} in table {}", column.name, self.name);
            }
        }
        Ok(())
    }

    /// Returns the index of the named column, if it exists.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| errinput!("unknown column {name} in table {}", self.name))
    }

    /// Validates a row against the schema, coercing integers into float
    /// columns. Returns the validated row.
    pub fn validate_row(&self, row: Row) -> Result<Row> {
        if row.len() != self.columns.len() {
            return errinput!(
                "invalid row size {} for table {}, expected {}",
                row.len(),
                self.name,
                self.columns.len()
            );
        }
        row.into_iter().zip(&self.columns).map(|(value, column)| column.coerce(value)).collect()
    }
}

impl Column {
    /// Coerces a value into the column type, erroring on type mismatches.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        match (self.datatype, value) {
            (_, Value::Null) if self.nullable => Ok(Value::Null),
            (_, Value::Null) => errinput!("NULL value not allowed for column {}", self.name),
            (DataType::Float, Value::Integer(i)) => Ok(Value::Float(i as f64)),
            (datatype, value) if value.datatype() == Some(datatype) => Ok(value),
            (datatype, value) => {
                errinput!("invalid {datatype} value {value} for column {}", self.name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table {
            name: "t".into(),
            columns: vec![
                Column { name: "a".into(), datatype: DataType::Integer, nullable: true },
                Column { name: "b".into(), datatype: DataType::Float, nullable: false },
            ],
        }
    }

    #[test]
    fn validate_row_coerces() -> Result<()> {
        let row = table().validate_row(vec![Value::Null, Value::Integer(2)])?;
        assert_eq!(row, vec![Value::Null, Value::Float(2.0)]);
        Ok(())
    }

    #[test]
    fn validate_row_rejects() {
        let table = table();
        assert!(table.validate_row(vec![Value::Integer(1)]).is_err());
        assert!(table.validate_row(vec![Value::Integer(1), Value::Null]).is_err());
        assert!(table.validate_row(vec![Value::String("x".into()), Value::Float(1.0)]).is_err());
    }

    #[test]
    fn duplicate_columns() {
        let mut table = table();
        table.columns[1].name = "a".into();
        assert!(table.validate().is_err());
    }
}
