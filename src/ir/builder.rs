//! A builder for plans, used to construct reference plans by hand rather than
//! compiling them from SQL. Column references are resolved by name against
//! the output columns of the relation built so far.

use super::{
    Expr, Extensions, FunctionKind, Literal, Measure, NamedStruct, Plan, Rel, RelRoot,
    SortDirection, SortField, Version,
};
use crate::errinput;
use crate::error::Result;

/// Builds a relation tree bottom-up, tracking output column names and the
/// extension functions referenced along the way.
#[derive(Debug)]
pub struct RelBuilder {
    rel: Rel,
    names: Vec<String>,
    extensions: Extensions,
}

impl RelBuilder {
    /// Starts from a table read.
    pub fn read(table: &str, schema: NamedStruct) -> Self {
        let names = schema.names.clone();
        let rel = Rel::Read { table: table.to_string(), schema, filter: None };
        Self { rel, names, extensions: Extensions::default() }
    }

    /// Starts from constant rows.
    pub fn values(names: &[&str], rows: Vec<Vec<Literal>>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|row| row.len() != names.len()) {
            return errinput!("values row has {} columns, expected {}", row.len(), names.len());
        }
        let rel = Rel::Values { width: names.len(), rows };
        let names = names.iter().map(|n| n.to_string()).collect();
        Ok(Self { rel, names, extensions: Extensions::default() })
    }

    /// Returns a reference to the named output column.
    pub fn field(&self, name: &str) -> Result<Expr> {
        match self.names.iter().position(|n| n == name) {
            Some(index) => Ok(Expr::Field(index)),
            None => errinput!("unknown column {name}"),
        }
    }

    /// Returns a literal expression.
    pub fn literal(&self, literal: impl Into<Literal>) -> Expr {
        Expr::Literal(literal.into())
    }

    /// Returns a scalar function call, declaring the function.
    pub fn call(&mut self, name: &str, arguments: Vec<Expr>) -> Result<Expr> {
        let function = self.extensions.anchor(name, FunctionKind::Scalar, arguments.len())?;
        Ok(Expr::Call { function, arguments })
    }

    /// Returns an aggregate measure, declaring the function.
    pub fn measure(&mut self, name: &str, arguments: Vec<Expr>) -> Result<Measure> {
        let function = self.extensions.anchor(name, FunctionKind::Aggregate, arguments.len())?;
        Ok(Measure { function, arguments })
    }

    /// Filters the current relation. A filter directly on a table read is
    /// folded into the read.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.rel = match self.rel {
            Rel::Read { table, schema, filter: None } => {
                Rel::Read { table, schema, filter: Some(condition) }
            }
            input => Rel::Filter { input: Box::new(input), condition },
        };
        self
    }

    /// Projects named expressions.
    pub fn project(mut self, columns: Vec<(Expr, &str)>) -> Self {
        let (expressions, names) = Self::split(columns);
        self.rel = Rel::Project { input: Box::new(self.rel), expressions };
        self.names = names;
        self
    }

    /// Groups by the named groupings and computes the named measures.
    pub fn aggregate(
        mut self,
        groupings: Vec<(Expr, &str)>,
        measures: Vec<(Measure, &str)>,
    ) -> Self {
        let (groupings, mut names) = Self::split(groupings);
        let (measures, measure_names) = Self::split(measures);
        names.extend(measure_names);
        self.rel = Rel::Aggregate { input: Box::new(self.rel), groupings, measures };
        self.names = names;
        self
    }

    /// Sorts by the given expressions.
    pub fn sort(mut self, sorts: Vec<(Expr, SortDirection)>) -> Self {
        let sorts =
            sorts.into_iter().map(|(expr, direction)| SortField { expr, direction }).collect();
        self.rel = Rel::Sort { input: Box::new(self.rel), sorts };
        self
    }

    /// Skips offset rows and emits at most count rows.
    pub fn fetch(mut self, offset: u64, count: Option<u64>) -> Self {
        self.rel = Rel::Fetch { input: Box::new(self.rel), offset, count };
        self
    }

    /// Returns the current output column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Finishes the plan.
    pub fn build(self, producer: &str) -> Plan {
        Plan {
            version: Version::current(producer),
            extensions: self.extensions.into_declarations(),
            root: RelRoot { input: self.rel, names: self.names },
        }
    }

    fn split<T>(columns: Vec<(T, &str)>) -> (Vec<T>, Vec<String>) {
        columns.into_iter().map(|(item, name)| (item, name.to_string())).unzip()
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Type, TypeKind};

    fn schema() -> NamedStruct {
        let int = Type { kind: TypeKind::Integer, nullable: true };
        NamedStruct { names: vec!["a".into(), "b".into()], types: vec![int, int] }
    }

    #[test]
    fn builds_aggregate_plan() -> Result<()> {
        let mut b = RelBuilder::read("t", schema());
        let add = b.call("add", vec![b.field("a")?, b.field("b")?])?;
        let sum = b.measure("sum", vec![add])?;
        let plan = b.aggregate(vec![], vec![(sum, "total")]).build("test");
        assert_eq!(plan.root.names, vec!["total".to_string()]);
        assert_eq!(plan.extensions.len(), 2);
        assert!(plan.function(1).is_ok());
        Ok(())
    }

    #[test]
    fn folds_filter_into_read() -> Result<()> {
        let mut b = RelBuilder::read("t", schema());
        let condition = b.call("gt", vec![b.field("a")?, b.literal(1i64)])?;
        let plan = b.filter(condition).build("test");
        assert!(matches!(plan.root.input, Rel::Read { filter: Some(_), .. }));
        Ok(())
    }

    #[test]
    fn rejects_unknown_columns_and_functions() {
        let mut b = RelBuilder::read("t", schema());
        assert!(b.field("c").is_err());
        assert!(b.call("nope", vec![]).is_err());
        assert!(b.measure("add", vec![Expr::Field(0), Expr::Field(1)]).is_err());
        assert!(RelBuilder::values(&["a"], vec![vec![]]).is_err());
    }
}
