//! Conversion between query plan nodes and portable plans. Exporting is how
//! SQL queries are compiled to portable plans, and importing is how portable
//! plans are executed by this engine.

use super::plan::{remap_sources, Aggregate, Direction, Node};
use crate::error::Result;
use crate::ir::{self, Expr, Extensions, FunctionKind, Literal, Rel, SortDirection};
use crate::sql::engine::Catalog;
use crate::sql::types::{DataType, Expression, Label, Table, Value};
use crate::{errdata, errinput};

/// Exports a query plan node tree as a portable plan.
pub fn to_ir(node: &Node, producer: &str) -> Result<ir::Plan> {
    let mut exporter = Exporter { extensions: Extensions::default() };
    let input = exporter.rel(node)?;
    Ok(ir::Plan {
        version: ir::Version::current(producer),
        extensions: exporter.extensions.into_declarations(),
        root: ir::RelRoot { input, names: node.column_names() },
    })
}

/// Imports a portable plan as a query plan node tree, resolving tables in the
/// given catalog. Returns the node along with the output column names.
pub fn from_ir(plan: &ir::Plan, catalog: &impl Catalog) -> Result<(Node, Vec<String>)> {
    plan.version.check()?;
    let importer = Importer { plan, catalog };
    let node = importer.rel(&plan.root.input)?;
    if plan.root.names.len() != node.columns() {
        return errdata!(
            "plan names {} columns, but its root emits {}",
            plan.root.names.len(),
            node.columns()
        );
    }
    Ok((node, plan.root.names.clone()))
}

/// Exports nodes and expressions, declaring functions as they're used.
struct Exporter {
    extensions: Extensions,
}

impl Exporter {
    fn rel(&mut self, node: &Node) -> Result<Rel> {
        Ok(match node {
            Node::Aggregate { source, group_by, aggregates } => Rel::Aggregate {
                input: self.rel(source)?.into(),
                groupings: group_by.iter().map(|e| self.expr(e)).collect::<Result<_>>()?,
                measures: aggregates.iter().map(|a| self.measure(a)).collect::<Result<_>>()?,
            },
            Node::Filter { source, predicate } => {
                Rel::Filter { input: self.rel(source)?.into(), condition: self.expr(predicate)? }
            }
            // Fold OFFSET into a subsequent LIMIT.
            Node::Limit { source, limit } => match source.as_ref() {
                Node::Offset { source, offset } => Rel::Fetch {
                    input: self.rel(source)?.into(),
                    offset: u64::try_from(*offset)?,
                    count: Some(u64::try_from(*limit)?),
                },
                source => Rel::Fetch {
                    input: self.rel(source)?.into(),
                    offset: 0,
                    count: Some(u64::try_from(*limit)?),
                },
            },
            Node::Nothing { columns } => Rel::Values { width: columns.len(), rows: Vec::new() },
            Node::Offset { source, offset } => Rel::Fetch {
                input: self.rel(source)?.into(),
                offset: u64::try_from(*offset)?,
                count: None,
            },
            Node::Order { source, key } => Rel::Sort {
                input: self.rel(source)?.into(),
                sorts: key
                    .iter()
                    .map(|(expr, direction)| {
                        Ok(ir::SortField {
                            expr: self.expr(expr)?,
                            direction: match direction {
                                Direction::Ascending => SortDirection::AscNullsFirst,
                                Direction::Descending => SortDirection::DescNullsLast,
                            },
                        })
                    })
                    .collect::<Result<_>>()?,
            },
            Node::Parquet { path, .. } => {
                return errinput!("read_parquet('{path}') can't be compiled to a plan")
            }
            Node::Projection { source, expressions, .. } => Rel::Project {
                input: self.rel(source)?.into(),
                expressions: expressions.iter().map(|e| self.expr(e)).collect::<Result<_>>()?,
            },
            Node::Remap { source, targets } => Rel::Project {
                input: self.rel(source)?.into(),
                expressions: remap_sources(targets)
                    .into_iter()
                    .map(|source| match source {
                        Some(index) => Expr::Field(index),
                        None => Expr::Literal(Literal::Null),
                    })
                    .collect(),
            },
            Node::Scan { table, filter, .. } => Rel::Read {
                table: table.name.clone(),
                schema: table.into(),
                filter: filter.as_ref().map(|f| self.expr(f)).transpose()?,
            },
            Node::Values { rows } => Rel::Values {
                width: node.columns(),
                rows: rows
                    .iter()
                    .map(|row| {
                        row.iter().map(|e| Ok(e.evaluate(None)?.into())).collect::<Result<Vec<_>>>()
                    })
                    .collect::<Result<_>>()?,
            },
        })
    }

    fn measure(&mut self, aggregate: &Aggregate) -> Result<ir::Measure> {
        let arguments = match aggregate.expression() {
            Some(expr) => vec![self.expr(expr)?],
            None => Vec::new(),
        };
        let function =
            self.extensions.anchor(aggregate.name(), FunctionKind::Aggregate, arguments.len())?;
        Ok(ir::Measure { function, arguments })
    }

    fn call(&mut self, name: &str, arguments: &[&Expression]) -> Result<Expr> {
        let arguments = arguments.iter().map(|e| self.expr(e)).collect::<Result<Vec<_>>>()?;
        let function = self.extensions.anchor(name, FunctionKind::Scalar, arguments.len())?;
        Ok(Expr::Call { function, arguments })
    }

    fn expr(&mut self, expr: &Expression) -> Result<Expr> {
        use Expression::*;
        Ok(match expr {
            Constant(value) => Expr::Literal(value.clone().into()),
            Column(index) => Expr::Field(*index),

            // The planner expands >=, <=, != and IS NOT NULL. Contract them
            // back into single functions where possible.
            Or(lhs, rhs) => match (lhs.as_ref(), rhs.as_ref()) {
                (GreaterThan(a, b), Equal(c, d)) if a == c && b == d => self.call("gte", &[a, b])?,
                (LessThan(a, b), Equal(c, d)) if a == c && b == d => self.call("lte", &[a, b])?,
                _ => self.call("or", &[lhs, rhs])?,
            },
            Not(expr) => match expr.as_ref() {
                Equal(lhs, rhs) => self.call("not_equal", &[lhs, rhs])?,
                Is(expr, Value::Null) => self.call("is_not_null", &[expr])?,
                _ => self.call("not", &[expr])?,
            },
            And(lhs, rhs) => self.call("and", &[lhs, rhs])?,
            Xor(lhs, rhs) => self.call("xor", &[lhs, rhs])?,

            Equal(lhs, rhs) => self.call("equal", &[lhs, rhs])?,
            GreaterThan(lhs, rhs) => self.call("gt", &[lhs, rhs])?,
            LessThan(lhs, rhs) => self.call("lt", &[lhs, rhs])?,
            Is(expr, Value::Null) => self.call("is_null", &[expr])?,
            Is(expr, Value::Float(f)) if f.is_nan() => self.call("is_nan", &[expr])?,
            Is(_, value) => return errinput!("can't export IS {value}"),

            Add(lhs, rhs) => self.call("add", &[lhs, rhs])?,
            Divide(lhs, rhs) => self.call("divide", &[lhs, rhs])?,
            Exponentiate(lhs, rhs) => self.call("power", &[lhs, rhs])?,
            Identity(expr) => self.expr(expr)?,
            Multiply(lhs, rhs) => self.call("multiply", &[lhs, rhs])?,
            Negate(expr) => self.call("negate", &[expr])?,
            Remainder(lhs, rhs) => self.call("modulus", &[lhs, rhs])?,
            Subtract(lhs, rhs) => self.call("subtract", &[lhs, rhs])?,

            Abs(expr) => self.call("abs", &[expr])?,
            Ceil(expr) => self.call("ceil", &[expr])?,
            Exp(expr) => self.call("exp", &[expr])?,
            Floor(expr) => self.call("floor", &[expr])?,
            Round(expr, digits) => self.call("round", &[expr, digits])?,
            Sign(expr) => self.call("sign", &[expr])?,
            SquareRoot(expr) => self.call("sqrt", &[expr])?,
        })
    }
}

/// Imports relations and expressions from a plan.
struct Importer<'a, C: Catalog> {
    plan: &'a ir::Plan,
    catalog: &'a C,
}

impl<C: Catalog> Importer<'_, C> {
    fn rel(&self, rel: &Rel) -> Result<Node> {
        Ok(match rel {
            Rel::Read { table, schema, filter } => {
                let table = self.catalog.must_get_table(table)?;
                if schema.len() != table.columns.len() {
                    return errdata!(
                        "table {} has {} columns, plan expects {}",
                        table.name,
                        table.columns.len(),
                        schema.len()
                    );
                }
                let width = table.columns.len();
                let filter = filter.as_ref().map(|f| self.expr(f, width)).transpose()?;
                Node::Scan { table, filter, alias: None }
            }
            Rel::Filter { input, condition } => {
                let source = self.rel(input)?;
                let predicate = self.expr(condition, source.columns())?;
                Node::Filter { source: source.into(), predicate }
            }
            Rel::Project { input, expressions } => {
                let source = self.rel(input)?;
                let width = source.columns();
                let expressions =
                    expressions.iter().map(|e| self.expr(e, width)).collect::<Result<Vec<_>>>()?;
                let aliases = vec![Label::None; expressions.len()];
                Node::Projection { source: source.into(), expressions, aliases }
            }
            Rel::Aggregate { input, groupings, measures } => {
                let source = self.rel(input)?;
                let width = source.columns();
                let group_by =
                    groupings.iter().map(|e| self.expr(e, width)).collect::<Result<_>>()?;
                let aggregates =
                    measures.iter().map(|m| self.measure(m, width)).collect::<Result<_>>()?;
                Node::Aggregate { source: source.into(), group_by, aggregates }
            }
            Rel::Sort { input, sorts } => {
                let source = self.rel(input)?;
                let width = source.columns();
                let key = sorts
                    .iter()
                    .map(|sort| {
                        let direction = match sort.direction {
                            SortDirection::AscNullsFirst => Direction::Ascending,
                            SortDirection::DescNullsLast => Direction::Descending,
                        };
                        Ok((self.expr(&sort.expr, width)?, direction))
                    })
                    .collect::<Result<_>>()?;
                Node::Order { source: source.into(), key }
            }
            Rel::Fetch { input, offset, count } => {
                let mut node = self.rel(input)?;
                if *offset > 0 {
                    node = Node::Offset { source: node.into(), offset: usize::try_from(*offset)? };
                }
                if let Some(count) = count {
                    node = Node::Limit { source: node.into(), limit: usize::try_from(*count)? };
                }
                node
            }
            Rel::Values { width, rows } if rows.is_empty() => {
                Node::Nothing { columns: vec![Label::None; *width] }
            }
            Rel::Values { width, rows } => {
                if let Some(row) = rows.iter().find(|row| row.len() != *width) {
                    return errdata!("values row has {} columns, expected {width}", row.len());
                }
                let rows = rows
                    .iter()
                    .map(|row| row.iter().map(|l| Expression::Constant(l.clone().into())).collect())
                    .collect();
                Node::Values { rows }
            }
        })
    }

    fn measure(&self, measure: &ir::Measure, width: usize) -> Result<Aggregate> {
        let signature = self.plan.function(measure.function)?;
        signature.check(FunctionKind::Aggregate, measure.arguments.len())?;
        let Some(argument) = measure.arguments.first() else {
            return Ok(Aggregate::CountAll);
        };
        let expr = self.expr(argument, width)?;
        Ok(match signature.name {
            "approx_count_distinct" => Aggregate::ApproxCountDistinct(expr),
            "avg" => Aggregate::Average(expr),
            "bool_and" => Aggregate::BoolAnd(expr),
            "bool_or" => Aggregate::BoolOr(expr),
            "count" => Aggregate::Count(expr),
            "max" => Aggregate::Max(expr),
            "min" => Aggregate::Min(expr),
            "sum" => Aggregate::Sum(expr),
            name => return errinput!("unsupported aggregate function {name}"),
        })
    }

    fn expr(&self, expr: &Expr, width: usize) -> Result<Expression> {
        use Expression::*;
        let (function, arguments) = match expr {
            Expr::Literal(literal) => return Ok(Constant(literal.clone().into())),
            Expr::Field(index) if *index < width => return Ok(Column(*index)),
            Expr::Field(index) => {
                return errdata!("field {index} out of bounds for {width} input columns")
            }
            Expr::Call { function, arguments } => (function, arguments),
        };
        let signature = self.plan.function(*function)?;
        signature.check(FunctionKind::Scalar, arguments.len())?;
        let mut args = arguments.iter();
        let mut arg = || -> Result<Box<Expression>> {
            let Some(arg) = args.next() else {
                return errdata!("missing argument to {}", signature.name);
            };
            Ok(Box::new(self.expr(arg, width)?))
        };
        Ok(match signature.name {
            "add" => Add(arg()?, arg()?),
            "subtract" => Subtract(arg()?, arg()?),
            "multiply" => Multiply(arg()?, arg()?),
            "divide" => Divide(arg()?, arg()?),
            "modulus" => Remainder(arg()?, arg()?),
            "power" => Exponentiate(arg()?, arg()?),
            "negate" => Negate(arg()?),
            "sqrt" => SquareRoot(arg()?),
            "exp" => Exp(arg()?),
            "abs" => Abs(arg()?),
            "sign" => Sign(arg()?),
            "ceil" => Ceil(arg()?),
            "floor" => Floor(arg()?),
            "round" if arguments.len() == 1 => Round(arg()?, Value::Integer(0).into()),
            "round" => Round(arg()?, arg()?),
            "and" => And(arg()?, arg()?),
            "or" => Or(arg()?, arg()?),
            "not" => Not(arg()?),
            "xor" => Xor(arg()?, arg()?),
            "equal" => Equal(arg()?, arg()?),
            "not_equal" => Not(Equal(arg()?, arg()?).into()),
            "lt" => LessThan(arg()?, arg()?),
            "gt" => GreaterThan(arg()?, arg()?),
            "lte" | "gte" => {
                let (lhs, rhs) = (arg()?, arg()?);
                let compare = match signature.name {
                    "lte" => LessThan(lhs.clone(), rhs.clone()),
                    _ => GreaterThan(lhs.clone(), rhs.clone()),
                };
                Or(compare.into(), Equal(lhs, rhs).into())
            }
            "is_null" => Is(arg()?, Value::Null),
            "is_not_null" => Not(Is(arg()?, Value::Null).into()),
            "is_nan" => Is(arg()?, Value::Float(f64::NAN)),
            name => return errinput!("unsupported scalar function {name}"),
        })
    }
}

impl From<Value> for Literal {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Boolean(b) => Self::Boolean(b),
            Value::Integer(i) => Self::Integer(i),
            Value::Float(f) => Self::Float(f),
            Value::String(s) => Self::String(s),
        }
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Null => Self::Null,
            Literal::Boolean(b) => Self::Boolean(b),
            Literal::Integer(i) => Self::Integer(i),
            Literal::Float(f) => Self::Float(f),
            Literal::String(s) => Self::String(s),
        }
    }
}

impl From<DataType> for ir::TypeKind {
    fn from(datatype: DataType) -> Self {
        match datatype {
            DataType::Boolean => Self::Boolean,
            DataType::Integer => Self::Integer,
            DataType::Float => Self::Float,
            DataType::String => Self::String,
        }
    }
}

impl From<ir::TypeKind> for DataType {
    fn from(kind: ir::TypeKind) -> Self {
        match kind {
            ir::TypeKind::Boolean => Self::Boolean,
            ir::TypeKind::Integer => Self::Integer,
            ir::TypeKind::Float => Self::Float,
            ir::TypeKind::String => Self::String,
        }
    }
}

impl From<&Table> for ir::NamedStruct {
    fn from(table: &Table) -> Self {
        Self {
            names: table.columns.iter().map(|c| c.name.clone()).collect(),
            types: table
                .columns
                .iter()
                .map(|c| ir::Type { kind: c.datatype.into(), nullable: c.nullable })
                .collect(),
        }
    }
}
