//! Compiles portable plans into physical operator trees. Function anchors are
//! resolved to kernels, tables are resolved in the engine's catalog, and
//! field references are bounds-checked against their input.

use std::collections::BTreeMap;

use itertools::izip;

use super::vector::{Chunk, Scalar, Vector};
use crate::error::Result;
use crate::ir::{self, Expr, FunctionKind, Literal, Rel, SortDirection};
use crate::{errdata, errinput};

/// A physical operator. Each operator materializes its output as a chunk.
#[derive(Debug, PartialEq)]
pub enum Operator {
    Scan { table: String, filter: Option<Kernel> },
    Filter { input: Box<Operator>, predicate: Kernel },
    Project { input: Box<Operator>, expressions: Vec<Kernel> },
    Aggregate { input: Box<Operator>, groupings: Vec<Kernel>, measures: Vec<AggregateCall> },
    Sort { input: Box<Operator>, keys: Vec<(Kernel, SortDirection)> },
    Fetch { input: Box<Operator>, offset: usize, count: Option<usize> },
    Values { chunk: Chunk },
}

/// A compiled scalar expression, evaluated a chunk at a time.
#[derive(Debug, PartialEq)]
pub enum Kernel {
    Constant(Literal),
    Column(usize),
    Call(ScalarFunction, Vec<Kernel>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarFunction {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Power,
    Negate,
    Sqrt,
    Exp,
    Abs,
    Sign,
    Ceil,
    Floor,
    Round,
    And,
    Or,
    Not,
    Xor,
    Equal,
    NotEqual,
    Lt,
    Lte,
    Gt,
    Gte,
    IsNull,
    IsNotNull,
    IsNan,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFunction {
    ApproxCountDistinct,
    Avg,
    BoolAnd,
    BoolOr,
    Count,
    Max,
    Min,
    Sum,
}

/// A compiled aggregate call. Count without an argument counts rows.
#[derive(Debug, PartialEq)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    pub argument: Option<Kernel>,
}

impl ScalarFunction {
    fn from_name(name: &str) -> Result<Self> {
        use ScalarFunction::*;
        Ok(match name {
            "add" => Add,
            "subtract" => Subtract,
            "multiply" => Multiply,
            "divide" => Divide,
            "modulus" => Modulus,
            "power" => Power,
            "negate" => Negate,
            "sqrt" => Sqrt,
            "exp" => Exp,
            "abs" => Abs,
            "sign" => Sign,
            "ceil" => Ceil,
            "floor" => Floor,
            "round" => Round,
            "and" => And,
            "or" => Or,
            "not" => Not,
            "xor" => Xor,
            "equal" => Equal,
            "not_equal" => NotEqual,
            "lt" => Lt,
            "lte" => Lte,
            "gt" => Gt,
            "gte" => Gte,
            "is_null" => IsNull,
            "is_not_null" => IsNotNull,
            "is_nan" => IsNan,
            name => return errinput!("no kernel for scalar function {name}"),
        })
    }
}

impl AggregateFunction {
    fn from_name(name: &str) -> Result<Self> {
        use AggregateFunction::*;
        Ok(match name {
            "approx_count_distinct" => ApproxCountDistinct,
            "avg" => Avg,
            "bool_and" => BoolAnd,
            "bool_or" => BoolOr,
            "count" => Count,
            "max" => Max,
            "min" => Min,
            "sum" => Sum,
            name => return errinput!("no kernel for aggregate function {name}"),
        })
    }
}

/// Compiles a plan against the given tables. Returns the root operator.
pub fn compile(plan: &ir::Plan, tables: &BTreeMap<String, Chunk>) -> Result<Operator> {
    let compiler = Compiler { plan, tables };
    let (operator, width) = compiler.rel(&plan.root.input)?;
    if plan.root.names.len() != width {
        return errdata!("plan names {} columns, but its root has {width}", plan.root.names.len());
    }
    Ok(operator)
}

struct Compiler<'a> {
    plan: &'a ir::Plan,
    tables: &'a BTreeMap<String, Chunk>,
}

impl Compiler<'_> {
    /// Compiles a relation, returning its operator and output width.
    fn rel(&self, rel: &Rel) -> Result<(Operator, usize)> {
        Ok(match rel {
            Rel::Read { table, schema, filter } => {
                let Some(chunk) = self.tables.get(table) else {
                    return errinput!("table {table} does not exist");
                };
                self.check_schema(table, schema, chunk)?;
                let width = schema.len();
                let filter = filter.as_ref().map(|f| self.kernel(f, width)).transpose()?;
                (Operator::Scan { table: table.clone(), filter }, width)
            }

            Rel::Filter { input, condition } => {
                let (input, width) = self.rel(input)?;
                let predicate = self.kernel(condition, width)?;
                (Operator::Filter { input: input.into(), predicate }, width)
            }

            Rel::Project { input, expressions } => {
                let (input, width) = self.rel(input)?;
                let expressions: Vec<Kernel> =
                    expressions.iter().map(|e| self.kernel(e, width)).collect::<Result<_>>()?;
                let width = expressions.len();
                (Operator::Project { input: input.into(), expressions }, width)
            }

            Rel::Aggregate { input, groupings, measures } => {
                let (input, width) = self.rel(input)?;
                let groupings: Vec<Kernel> =
                    groupings.iter().map(|e| self.kernel(e, width)).collect::<Result<_>>()?;
                let measures: Vec<AggregateCall> =
                    measures.iter().map(|m| self.measure(m, width)).collect::<Result<_>>()?;
                let width = groupings.len() + measures.len();
                (Operator::Aggregate { input: input.into(), groupings, measures }, width)
            }

            Rel::Sort { input, sorts } => {
                let (input, width) = self.rel(input)?;
                let keys = sorts
                    .iter()
                    .map(|sort| Ok((self.kernel(&sort.expr, width)?, sort.direction)))
                    .collect::<Result<_>>()?;
                (Operator::Sort { input: input.into(), keys }, width)
            }

            Rel::Fetch { input, offset, count } => {
                let (input, width) = self.rel(input)?;
                let offset = usize::try_from(*offset)?;
                let count = count.map(usize::try_from).transpose()?;
                (Operator::Fetch { input: input.into(), offset, count }, width)
            }

            Rel::Values { width, rows } => {
                let mut columns = vec![Vec::with_capacity(rows.len()); *width];
                for row in rows {
                    if row.len() != *width {
                        return errdata!("values row has {} columns, expected {width}", row.len());
                    }
                    for (column, literal) in columns.iter_mut().zip(row) {
                        column.push(Scalar::from(literal));
                    }
                }
                let columns = columns.into_iter().map(Vector::from_scalars).collect::<Result<_>>()?;
                (Operator::Values { chunk: Chunk::new(columns, rows.len())? }, *width)
            }
        })
    }

    /// Checks a read schema against the registered table. NULL-only columns
    /// match any type.
    fn check_schema(&self, table: &str, schema: &ir::NamedStruct, chunk: &Chunk) -> Result<()> {
        if schema.len() != chunk.columns.len() || schema.types.len() != schema.len() {
            return errdata!(
                "plan reads {} columns from table {table}, which has {}",
                schema.len(),
                chunk.columns.len()
            );
        }
        for (name, datatype, column) in izip!(&schema.names, &schema.types, &chunk.columns) {
            if column.kind().is_some_and(|kind| kind != datatype.kind) {
                return errdata!(
                    "plan reads column {name} of table {table} as {}, but it is {}",
                    datatype.kind,
                    column.type_name()
                );
            }
        }
        Ok(())
    }

    fn measure(&self, measure: &ir::Measure, width: usize) -> Result<AggregateCall> {
        let signature = self.plan.function(measure.function)?;
        signature.check(FunctionKind::Aggregate, measure.arguments.len())?;
        let function = AggregateFunction::from_name(signature.name)?;
        let argument = measure.arguments.first().map(|a| self.kernel(a, width)).transpose()?;
        Ok(AggregateCall { function, argument })
    }

    fn kernel(&self, expr: &Expr, width: usize) -> Result<Kernel> {
        Ok(match expr {
            Expr::Literal(literal) => Kernel::Constant(literal.clone()),
            Expr::Field(index) if *index < width => Kernel::Column(*index),
            Expr::Field(index) => {
                return errdata!("field {index} out of bounds for {width} input columns")
            }
            Expr::Call { function, arguments } => {
                let signature = self.plan.function(*function)?;
                signature.check(FunctionKind::Scalar, arguments.len())?;
                let arguments =
                    arguments.iter().map(|a| self.kernel(a, width)).collect::<Result<_>>()?;
                Kernel::Call(ScalarFunction::from_name(signature.name)?, arguments)
            }
        })
    }
}

impl From<&Literal> for Scalar {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Null => Self::Null,
            Literal::Boolean(b) => Self::Boolean(*b),
            Literal::Integer(i) => Self::Integer(*i),
            Literal::Float(f) => Self::Float(*f),
            Literal::String(s) => Self::String(s.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::RelBuilder;
    use crate::ir::{NamedStruct, Type, TypeKind};

    fn tables() -> BTreeMap<String, Chunk> {
        let chunk = Chunk::new(vec![Vector::Integer(vec![Some(1)]), Vector::Null(1)], 1).unwrap();
        BTreeMap::from([("t".to_string(), chunk)])
    }

    fn schema(kinds: &[TypeKind]) -> NamedStruct {
        NamedStruct {
            names: (0..kinds.len()).map(|i| format!("c{i}")).collect(),
            types: kinds.iter().map(|&kind| Type { kind, nullable: true }).collect(),
        }
    }

    #[test]
    fn resolves_tables_and_functions() -> Result<()> {
        let mut builder = RelBuilder::read("t", schema(&[TypeKind::Integer, TypeKind::String]));
        let sum = builder.call("add", vec![builder.field("c0")?, builder.literal(1i64)])?;
        let plan = builder.project(vec![(sum, "sum")]).build("test");
        let operator = compile(&plan, &tables())?;
        let Operator::Project { input, expressions } = operator else {
            panic!("expected projection, got {operator:?}");
        };
        assert_eq!(*input, Operator::Scan { table: "t".into(), filter: None });
        assert_eq!(
            expressions,
            vec![Kernel::Call(
                ScalarFunction::Add,
                vec![Kernel::Column(0), Kernel::Constant(Literal::Integer(1))]
            )]
        );
        Ok(())
    }

    #[test]
    fn missing_table_errors() {
        let plan = RelBuilder::read("missing", schema(&[TypeKind::Integer])).build("test");
        assert!(compile(&plan, &tables()).is_err());
    }

    #[test]
    fn mismatched_schema_errors() {
        let plan = RelBuilder::read("t", schema(&[TypeKind::Integer])).build("test");
        assert!(compile(&plan, &tables()).is_err());
        let read = RelBuilder::read("t", schema(&[TypeKind::Float, TypeKind::String]));
        assert!(compile(&read.build("test"), &tables()).is_err());
    }

    #[test]
    fn out_of_bounds_field_errors() {
        let read = RelBuilder::read("t", schema(&[TypeKind::Integer, TypeKind::Float]));
        let mut plan = read.build("test");
        let input = plan.root.input.into();
        plan.root.input = Rel::Project { input, expressions: vec![Expr::Field(2)] };
        plan.root.names = vec!["x".into()];
        assert!(compile(&plan, &tables()).is_err());
    }
}
