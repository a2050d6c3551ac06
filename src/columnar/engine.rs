use std::collections::BTreeMap;

use arrow::record_batch::RecordBatch;
use log::{debug, info};

use super::aggregate::aggregate;
use super::compile::{compile, Kernel, Operator};
use super::vector::{Chunk, Vector};
use crate::encoding::json;
use crate::error::Result;
use crate::ir::{self, PlanPayload, SortDirection, MAJOR_VERSION};
use crate::{errdata, errinput};

/// A columnar engine, which executes portable plans against registered
/// tables. It has no SQL front end.
#[derive(Debug, Default)]
pub struct Engine {
    /// Registered tables by name.
    tables: BTreeMap<String, Chunk>,
    closed: bool,
}

impl Engine {
    /// Creates an engine without tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record batch as a table, replacing any existing table of
    /// the same name.
    pub fn register_table(&mut self, name: &str, batch: RecordBatch) -> Result<()> {
        self.check_open()?;
        if name.is_empty() {
            return errinput!("table name can't be empty");
        }
        let chunk = Chunk::from_record_batch(&batch)?;
        debug!("registering table {name} with {} rows", chunk.len);
        if self.tables.insert(name.to_string(), chunk).is_some() {
            debug!("replaced existing table {name}");
        }
        Ok(())
    }

    /// Drops a table. Returns true if it existed.
    pub fn drop_table(&mut self, name: &str) -> Result<bool> {
        self.check_open()?;
        Ok(self.tables.remove(name).is_some())
    }

    /// Returns the registered table names, in order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Executes a plan payload. The payload is decoded into a generic
    /// message, whose version is checked before it is interpreted as a plan.
    pub fn execute(&self, payload: &PlanPayload) -> Result<RecordBatch> {
        self.check_open()?;
        let message = payload.to_message()?;
        let major = message.pointer("/version/major").and_then(serde_json::Value::as_u64);
        match major {
            Some(major) if major == u64::from(MAJOR_VERSION) => {}
            Some(major) => return errdata!("unsupported plan major version {major}"),
            None => return errdata!("plan message has no version"),
        }
        let plan: ir::Plan = json::from_message(message)?;
        self.execute_plan(&plan)
    }

    /// Executes a decoded plan.
    pub fn execute_plan(&self, plan: &ir::Plan) -> Result<RecordBatch> {
        self.check_open()?;
        plan.version.check()?;
        let operator = compile(plan, &self.tables)?;
        debug!("executing plan from {}: {operator:?}", plan.version.producer);
        let chunk = self.evaluate(&operator)?;
        chunk.into_record_batch(&plan.root.names)
    }

    /// Closes the engine, dropping all tables. Further use errors.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        info!("closing columnar engine with {} tables", self.tables.len());
        self.tables.clear();
        self.closed = true;
    }

    /// Returns true if the engine is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return errinput!("engine is closed");
        }
        Ok(())
    }

    /// Runs an operator, materializing its output.
    fn evaluate(&self, operator: &Operator) -> Result<Chunk> {
        Ok(match operator {
            Operator::Scan { table, filter } => {
                let Some(chunk) = self.tables.get(table) else {
                    return errinput!("table {table} does not exist");
                };
                match filter {
                    Some(predicate) => filter_chunk(chunk, predicate)?,
                    None => chunk.clone(),
                }
            }
            Operator::Filter { input, predicate } => {
                filter_chunk(&self.evaluate(input)?, predicate)?
            }
            Operator::Project { input, expressions } => {
                let chunk = self.evaluate(input)?;
                let columns =
                    expressions.iter().map(|e| e.evaluate(&chunk)).collect::<Result<_>>()?;
                Chunk::new(columns, chunk.len)?
            }
            Operator::Aggregate { input, groupings, measures } => {
                aggregate(&self.evaluate(input)?, groupings, measures)?
            }
            Operator::Sort { input, keys } => sort(&self.evaluate(input)?, keys)?,
            Operator::Fetch { input, offset, count } => {
                let chunk = self.evaluate(input)?;
                let start = (*offset).min(chunk.len);
                let end = match count {
                    Some(count) => start.saturating_add(*count).min(chunk.len),
                    None => chunk.len,
                };
                chunk.take(&(start..end).collect::<Vec<_>>())
            }
            Operator::Values { chunk } => chunk.clone(),
        })
    }
}

/// Keeps the rows where the predicate is true. Rows where it is false or
/// NULL are discarded.
fn filter_chunk(chunk: &Chunk, predicate: &Kernel) -> Result<Chunk> {
    let indices: Vec<usize> = match predicate.evaluate(chunk)? {
        Vector::Boolean(values) => {
            values.iter().enumerate().filter(|(_, v)| **v == Some(true)).map(|(i, _)| i).collect()
        }
        vector if vector.has_values() => {
            return errdata!("filter returned {}, expected boolean", vector.type_name())
        }
        _ => Vec::new(),
    };
    Ok(chunk.take(&indices))
}

/// Sorts the chunk's rows by the keys. The sort is stable, and NULLs sort
/// first in ascending order and last in descending order.
fn sort(chunk: &Chunk, keys: &[(Kernel, SortDirection)]) -> Result<Chunk> {
    let vectors: Vec<(Vector, SortDirection)> =
        keys.iter().map(|(k, dir)| Ok((k.evaluate(chunk)?, *dir))).collect::<Result<_>>()?;
    let mut indices: Vec<usize> = (0..chunk.len).collect();
    indices.sort_by(|&a, &b| {
        for (vector, direction) in &vectors {
            let order = vector.compare(a, b);
            if order.is_ne() {
                return match direction {
                    SortDirection::AscNullsFirst => order,
                    SortDirection::DescNullsLast => order.reverse(),
                };
            }
        }
        std::cmp::Ordering::Equal
    });
    Ok(chunk.take(&indices))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Array as _, AsArray as _, Int32Array, StringArray};
    use arrow::datatypes::{DataType as ArrowType, Field, Int64Type, Schema};

    use super::*;
    use crate::ir::builder::RelBuilder;
    use crate::ir::{NamedStruct, PlanFormat, Type, TypeKind};

    fn engine() -> Result<Engine> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", ArrowType::Int32, false),
            Field::new("name", ArrowType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int32Array::from(vec![3, 1, 2, 4])),
                Arc::new(StringArray::from(vec![Some("c"), None, Some("b"), Some("a")])),
            ],
        )?;
        let mut engine = Engine::new();
        engine.register_table("t", batch)?;
        Ok(engine)
    }

    fn read() -> RelBuilder {
        let schema = NamedStruct {
            names: vec!["id".into(), "name".into()],
            types: vec![
                Type { kind: TypeKind::Integer, nullable: false },
                Type { kind: TypeKind::String, nullable: true },
            ],
        };
        RelBuilder::read("t", schema)
    }

    #[test]
    fn filter_sort_fetch() -> Result<()> {
        let engine = engine()?;
        let mut builder = read();
        let condition = builder.call("gt", vec![builder.field("id")?, builder.literal(1i64)])?;
        let name = builder.field("name")?;
        let plan = builder
            .filter(condition)
            .sort(vec![(name, SortDirection::DescNullsLast)])
            .fetch(1, Some(5))
            .build("test");
        for format in [PlanFormat::Binary, PlanFormat::Json] {
            let batch = engine.execute(&PlanPayload::encode(&plan, format)?)?;
            let ids = batch.column(0).as_primitive::<Int64Type>();
            assert_eq!(ids.values().to_vec(), vec![2, 4]);
        }
        Ok(())
    }

    #[test]
    fn nulls_sort_first_ascending() -> Result<()> {
        let engine = engine()?;
        let builder = read();
        let name = builder.field("name")?;
        let plan = builder.sort(vec![(name, SortDirection::AscNullsFirst)]).build("test");
        let batch = engine.execute_plan(&plan)?;
        let names = batch.column(1).as_string::<i32>();
        assert!(names.is_null(0));
        assert_eq!(names.value(1), "a");
        Ok(())
    }

    #[test]
    fn aggregate_without_rows() -> Result<()> {
        let engine = engine()?;
        let mut builder = read();
        let condition = builder.literal(false);
        let count = builder.measure("count", vec![])?;
        let plan = builder.filter(condition).aggregate(vec![], vec![(count, "n")]).build("test");
        let batch = engine.execute_plan(&plan)?;
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.column(0).as_primitive::<Int64Type>().value(0), 0);
        Ok(())
    }

    #[test]
    fn non_boolean_filter_errors() -> Result<()> {
        let engine = engine()?;
        let builder = read();
        let condition = builder.field("id")?;
        let plan = builder.filter(condition).build("test");
        assert!(engine.execute_plan(&plan).is_err());
        Ok(())
    }

    #[test]
    fn missing_table_errors() -> Result<()> {
        let mut engine = engine()?;
        let plan = read().build("test");
        assert!(engine.execute_plan(&plan).is_ok());
        assert!(engine.drop_table("t")?);
        assert!(engine.execute_plan(&plan).is_err());
        Ok(())
    }

    #[test]
    fn version_mismatch_errors() -> Result<()> {
        let engine = engine()?;
        let mut plan = read().build("test");
        plan.version.major += 1;
        let payload = PlanPayload::encode(&plan, PlanFormat::Json)?;
        assert!(engine.execute(&payload).is_err());
        Ok(())
    }

    #[test]
    fn closed_engine_errors() -> Result<()> {
        let mut engine = engine()?;
        engine.close();
        assert!(engine.is_closed());
        assert!(engine.table_names().is_empty());
        assert!(engine.execute_plan(&read().build("test")).is_err());
        Ok(())
    }
}
