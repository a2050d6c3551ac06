//! Parquet file reading and writing.

use std::fs::File;
use std::path::Path;

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::table_name;
use crate::error::Result;
use crate::sql::types::{batch, Column, DataType, Table};

/// Reads all record batches of a Parquet file.
pub fn read(path: impl AsRef<Path>) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

/// Reads a Parquet file into a single record batch.
pub fn read_batch(path: impl AsRef<Path>) -> Result<RecordBatch> {
    let path = path.as_ref();
    let schema = read_arrow_schema(path)?;
    let batches = read(path)?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Reads a Parquet file's schema as a table schema, named after the file
/// (or "read_parquet" if no name can be derived from it). Columns of the
/// Arrow null type become nullable integer columns.
pub fn read_schema(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let schema = read_arrow_schema(path)?;
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let datatype = batch::column_type(field.data_type())?;
            Ok(Column {
                name: field.name().clone(),
                datatype: datatype.unwrap_or(DataType::Integer),
                nullable: field.is_nullable() || datatype.is_none(),
            })
        })
        .collect::<Result<_>>()?;
    let name = table_name(&path.to_string_lossy()).unwrap_or_else(|_| "read_parquet".into());
    let table = Table { name, columns };
    table.validate()?;
    Ok(table)
}

/// Writes record batches to a Parquet file, replacing any existing file.
pub fn write(path: impl AsRef<Path>, schema: SchemaRef, batches: &[RecordBatch]) -> Result<()> {
    let mut writer = writer(path, schema)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;
    Ok(())
}

/// Opens a Parquet writer, for writing batches incrementally.
pub fn writer(path: impl AsRef<Path>, schema: SchemaRef) -> Result<ArrowWriter<File>> {
    let props = WriterProperties::builder().set_compression(Compression::SNAPPY).build();
    Ok(ArrowWriter::try_new(File::create(path)?, schema, Some(props))?)
}

fn read_arrow_schema(path: &Path) -> Result<SchemaRef> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    Ok(builder.schema().clone())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Float32Array, Int32Array, StringArray};
    use arrow::datatypes::{DataType as ArrowType, Field, Schema};

    use super::*;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", ArrowType::Int32, false),
            Field::new("score", ArrowType::Float32, true),
            Field::new("name", ArrowType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![1, 2, 3])),
                Arc::new(Float32Array::from(vec![Some(0.5), None, Some(2.0)])),
                Arc::new(StringArray::from(vec![Some("a"), Some("b"), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn write_and_read() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("my-scores.parquet");
        let batch = batch();
        write(&path, batch.schema(), &[batch.clone(), batch.clone()])?;

        let read = read_batch(&path)?;
        assert_eq!(read.num_rows(), 6);
        assert_eq!(read.schema(), batch.schema());

        let table = read_schema(&path)?;
        assert_eq!(table.name, "myscores");
        assert_eq!(
            table.columns,
            vec![
                Column { name: "id".into(), datatype: DataType::Integer, nullable: false },
                Column { name: "score".into(), datatype: DataType::Float, nullable: true },
                Column { name: "name".into(), datatype: DataType::String, nullable: true },
            ]
        );
        Ok(())
    }

    #[test]
    fn missing_file_errors() {
        assert!(read("/nonexistent/file.parquet").is_err());
        assert!(read_schema("/nonexistent/file.parquet").is_err());
    }

    #[test]
    fn malformed_file_errors() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.parquet");
        std::fs::write(&path, b"not parquet")?;
        assert!(read(&path).is_err());
        Ok(())
    }
}
