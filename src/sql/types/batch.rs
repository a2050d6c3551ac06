//! Conversion between rows and Arrow record batches. Record batches are the
//! result format shared by all engines, and the format fixtures are read in.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray as _, BooleanArray, Float64Array, Int64Array, NullArray, StringArray,
};
use arrow::datatypes::{DataType as ArrowType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use super::{DataType, Row, Value};
use crate::errdata;
use crate::error::Result;

/// Returns the Arrow type for a column type. Columns without a known type
/// (i.e. only NULLs) map to the Arrow null type.
pub fn arrow_type(datatype: Option<DataType>) -> ArrowType {
    match datatype {
        Some(DataType::Boolean) => ArrowType::Boolean,
        Some(DataType::Integer) => ArrowType::Int64,
        Some(DataType::Float) => ArrowType::Float64,
        Some(DataType::String) => ArrowType::Utf8,
        None => ArrowType::Null,
    }
}

/// Returns the column type for an Arrow type, or None for the null type.
/// Narrower integers and floats are widened, dates are read as strings.
pub fn column_type(arrow: &ArrowType) -> Result<Option<DataType>> {
    use ArrowType::*;
    Ok(Some(match arrow {
        Null => return Ok(None),
        Boolean => DataType::Boolean,
        Int8 | Int16 | Int32 | Int64 | UInt8 | UInt16 | UInt32 | UInt64 => DataType::Integer,
        Float16 | Float32 | Float64 | Decimal128(_, _) | Decimal256(_, _) => DataType::Float,
        Utf8 | LargeUtf8 | Utf8View | Date32 | Date64 => DataType::String,
        other => return errdata!("unsupported column type {other}"),
    }))
}

/// Builds a record batch from rows. Each row must have one value per column,
/// matching the column's type or NULL.
pub fn to_record_batch(
    names: &[String],
    types: &[Option<DataType>],
    rows: &[Row],
) -> Result<RecordBatch> {
    if names.len() != types.len() {
        return errdata!("got {} column names for {} columns", names.len(), types.len());
    }
    if let Some(row) = rows.iter().find(|row| row.len() != names.len()) {
        return errdata!("row of {} values for {} columns", row.len(), names.len());
    }

    let mut fields = Vec::with_capacity(names.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(names.len());
    for (index, (name, datatype)) in names.iter().zip(types).enumerate() {
        let values = rows.iter().map(|row| &row[index]);
        let array: ArrayRef = match datatype {
            None => Arc::new(NullArray::new(rows.len())),
            Some(DataType::Boolean) => Arc::new(
                values
                    .map(|v| match v {
                        Value::Boolean(b) => Ok(Some(*b)),
                        Value::Null => Ok(None),
                        v => errdata!("invalid boolean value {v}"),
                    })
                    .collect::<Result<BooleanArray>>()?,
            ),
            Some(DataType::Integer) => Arc::new(
                values
                    .map(|v| match v {
                        Value::Integer(i) => Ok(Some(*i)),
                        Value::Null => Ok(None),
                        v => errdata!("invalid integer value {v}"),
                    })
                    .collect::<Result<Int64Array>>()?,
            ),
            Some(DataType::Float) => Arc::new(
                values
                    .map(|v| match v {
                        Value::Float(f) => Ok(Some(*f)),
                        Value::Integer(i) => Ok(Some(*i as f64)),
                        Value::Null => Ok(None),
                        v => errdata!("invalid float value {v}"),
                    })
                    .collect::<Result<Float64Array>>()?,
            ),
            Some(DataType::String) => Arc::new(
                values
                    .map(|v| match v {
                        Value::String(s) => Ok(Some(s.as_str())),
                        Value::Null => Ok(None),
                        v => errdata!("invalid string value {v}"),
                    })
                    .collect::<Result<StringArray>>()?,
            ),
        };
        fields.push(Field::new(name, arrow_type(*datatype), true));
        arrays.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    Ok(RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)?)
}

/// Returns the column names of a record batch.
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch.schema().fields().iter().map(|f| f.name().clone()).collect()
}

/// Returns the column types of a record batch.
pub fn column_types(batch: &RecordBatch) -> Result<Vec<Option<DataType>>> {
    batch.schema().fields().iter().map(|f| column_type(f.data_type())).collect()
}

/// Converts a single Arrow array into values, widening it as necessary.
pub fn array_values(array: &dyn Array) -> Result<Vec<Value>> {
    let datatype = column_type(array.data_type())?;
    let Some(datatype) = datatype else {
        return Ok(vec![Value::Null; array.len()]);
    };
    let array = arrow::compute::cast(array, &arrow_type(Some(datatype)))?;
    Ok(match datatype {
        DataType::Boolean => array.as_boolean().iter().map(Value::from).collect(),
        DataType::Integer => array.as_primitive::<Int64Type>().iter().map(Value::from).collect(),
        DataType::Float => array.as_primitive::<Float64Type>().iter().map(Value::from).collect(),
        DataType::String => array.as_string::<i32>().iter().map(Value::from).collect(),
    })
}

/// Converts a record batch into rows.
pub fn to_rows(batch: &RecordBatch) -> Result<Vec<Row>> {
    let columns =
        batch.columns().iter().map(|c| array_values(c.as_ref())).collect::<Result<Vec<_>>>()?;
    let mut rows = vec![Vec::with_capacity(columns.len()); batch.num_rows()];
    for column in columns {
        for (row, value) in rows.iter_mut().zip(column) {
            row.push(value);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_roundtrip() -> Result<()> {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let types = vec![Some(DataType::Integer), Some(DataType::String), None];
        let rows = vec![
            vec![Value::Integer(1), Value::from("x"), Value::Null],
            vec![Value::Null, Value::Null, Value::Null],
        ];
        let batch = to_record_batch(&names, &types, &rows)?;
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(2).data_type(), &ArrowType::Null);
        assert_eq!(column_names(&batch), names);
        assert_eq!(column_types(&batch)?, types);
        assert_eq!(to_rows(&batch)?, rows);
        Ok(())
    }

    #[test]
    fn zero_columns_keep_row_count() -> Result<()> {
        let batch = to_record_batch(&[], &[], &[vec![], vec![]])?;
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(to_rows(&batch)?, vec![Vec::<Value>::new(); 2]);
        Ok(())
    }

    #[test]
    fn narrow_integers_widen() -> Result<()> {
        let array = arrow::array::Int32Array::from(vec![Some(3), None]);
        assert_eq!(array_values(&array)?, vec![Value::Integer(3), Value::Null]);
        Ok(())
    }

    #[test]
    fn mismatched_values_error() {
        let names = vec!["a".to_string()];
        let rows = vec![vec![Value::from("x")]];
        assert!(to_record_batch(&names, &[Some(DataType::Integer)], &rows).is_err());
    }
}
