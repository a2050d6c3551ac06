use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::sql::types::{DataType, Expression, Label, Table};

/// A statement execution plan. The root is either a DDL, DML or SELECT plan,
/// and a SELECT contains a tree of query plan nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Plan {
    /// A CREATE TABLE plan. Creates a new table with the given schema. Errors
    /// if the table already exists, unless or_replace is true.
    CreateTable { schema: Table, or_replace: bool },
    /// A CREATE TABLE AS plan. Creates a table with the columns of the source
    /// node, and inserts its rows.
    CreateTableAs { schema: Table, or_replace: bool, source: Node },
    /// A DROP TABLE plan. Drops the given table. Errors if the table does not
    /// exist, unless if_exists is true.
    DropTable { table: String, if_exists: bool },
    /// An INSERT plan. Inserts rows from source (typically a Values node) into
    /// table. If column_map is given, it maps table → source column indexes
    /// and must have one entry for every column in source. Table columns not
    /// present in source get NULL.
    Insert { table: Table, column_map: Option<HashMap<usize, usize>>, source: Node },
    /// A SELECT plan. Recursively executes the query plan tree and returns the
    /// resulting rows.
    Select(Node),
}

/// A query plan node. These return row iterators and can be nested.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Computes aggregate values for the given expressions and group_by
    /// buckets across all rows in the source node. The aggregate columns are
    /// output after the group_by columns, in the given order.
    Aggregate { source: Box<Node>, group_by: Vec<Expression>, aggregates: Vec<Aggregate> },
    /// Filters source rows, by discarding rows for which the predicate
    /// evaluates to false or NULL.
    Filter { source: Box<Node>, predicate: Expression },
    /// Only emits the first limit rows from the source, discards the rest.
    Limit { source: Box<Node>, limit: usize },
    /// Emits no rows. Only the column labels.
    Nothing { columns: Vec<Label> },
    /// Discards the first offset rows from source, emits the rest.
    Offset { source: Box<Node>, offset: usize },
    /// Sorts the source rows by the given sort key. Buffers the entire row set
    /// in memory. The sort is stable.
    Order { source: Box<Node>, key: Vec<(Expression, Direction)> },
    /// Reads all rows of a Parquet file.
    Parquet { path: String, table: Table, alias: Option<String> },
    /// Projects the input rows by evaluating the given expressions. Aliases
    /// are only used when displaying the plan.
    Projection { source: Box<Node>, expressions: Vec<Expression>, aliases: Vec<Label> },
    /// Remaps source columns to the given target column index, or None to drop
    /// the column. Unspecified target columns yield NULLs. The source -> target
    /// mapping ensures a source column can only be used once, avoiding row
    /// clones.
    Remap { source: Box<Node>, targets: Vec<Option<usize>> },
    /// A full table scan, with an optional filter pushed down.
    Scan { table: Table, filter: Option<Expression>, alias: Option<String> },
    /// A constant set of values.
    Values { rows: Vec<Vec<Expression>> },
}

impl Node {
    /// Returns the number of columns emitted by the node.
    pub fn columns(&self) -> usize {
        match self {
            // Source nodes emit all table columns.
            Self::Scan { table, .. } | Self::Parquet { table, .. } => table.columns.len(),

            // Some nodes modify the column set.
            Self::Aggregate { aggregates, group_by, .. } => aggregates.len() + group_by.len(),
            Self::Projection { expressions, .. } => expressions.len(),
            Self::Remap { targets, .. } => {
                targets.iter().filter_map(|v| *v).map(|i| i + 1).max().unwrap_or(0)
            }

            // Simple nodes just pass through the source columns.
            Self::Filter { source, .. }
            | Self::Limit { source, .. }
            | Self::Offset { source, .. }
            | Self::Order { source, .. } => source.columns(),

            // And some are trivial.
            Self::Nothing { columns } => columns.len(),
            Self::Values { rows } => rows.first().map(|row| row.len()).unwrap_or(0),
        }
    }

    /// Returns a label for a column, if any, by tracing the column through the
    /// plan tree. Only used for query result headers and plan display.
    pub fn column_label(&self, index: usize) -> Label {
        match self {
            // Source nodes use the table/column name.
            Self::Scan { table, alias, .. } | Self::Parquet { table, alias, .. } => {
                Label::Qualified(
                    alias.as_ref().unwrap_or(&table.name).clone(),
                    table.columns[index].name.clone(),
                )
            }

            // Some nodes rearrange columns. Route them to the correct
            // upstream column where appropriate.
            Self::Aggregate { source, group_by, .. } => match group_by.get(index) {
                Some(Expression::Column(index)) => source.column_label(*index),
                Some(_) | None => Label::None,
            },
            Self::Projection { source, expressions, aliases } => match aliases.get(index) {
                Some(Label::None) | None => match expressions.get(index) {
                    // Unaliased column references route to the source.
                    Some(Expression::Column(index)) => source.column_label(*index),
                    // Unaliased expressions don't have a name.
                    Some(_) | None => Label::None,
                },
                // Aliased columns use the alias.
                Some(alias) => alias.clone(),
            },
            Self::Remap { source, targets } => targets
                .iter()
                .position(|t| t == &Some(index))
                .map(|index| source.column_label(index))
                .unwrap_or(Label::None),

            // Simple nodes just pass through the source columns.
            Self::Filter { source, .. }
            | Self::Limit { source, .. }
            | Self::Offset { source, .. }
            | Self::Order { source, .. } => source.column_label(index),

            // Nothing nodes contain the original columns of replaced nodes.
            Self::Nothing { columns } => columns.get(index).cloned().unwrap_or(Label::None),

            // And some don't have any names at all.
            Self::Values { .. } => Label::None,
        }
    }

    /// Returns the labels of all emitted columns.
    pub fn column_labels(&self) -> Vec<Label> {
        (0..self.columns()).map(|i| self.column_label(i)).collect()
    }

    /// Returns the result column names, naming unlabeled columns by position.
    pub fn column_names(&self) -> Vec<String> {
        self.column_labels().iter().enumerate().map(|(i, label)| label.header(i)).collect()
    }

    /// Returns the statically inferred column types, or None for columns that
    /// can only contain NULLs.
    pub fn column_types(&self) -> Vec<Option<DataType>> {
        match self {
            Self::Scan { table, .. } | Self::Parquet { table, .. } => {
                table.columns.iter().map(|c| Some(c.datatype)).collect()
            }
            Self::Aggregate { source, group_by, aggregates } => {
                let input = source.column_types();
                group_by
                    .iter()
                    .map(|expr| expr.datatype(&input))
                    .chain(aggregates.iter().map(|aggregate| aggregate.datatype(&input)))
                    .collect()
            }
            Self::Projection { source, expressions, .. } => {
                let input = source.column_types();
                expressions.iter().map(|expr| expr.datatype(&input)).collect()
            }
            Self::Remap { source, targets } => {
                let input = source.column_types();
                let mut types = vec![None; self.columns()];
                for (from, to) in targets.iter().enumerate() {
                    if let Some(to) = to {
                        types[*to] = input[from];
                    }
                }
                types
            }
            Self::Filter { source, .. }
            | Self::Limit { source, .. }
            | Self::Offset { source, .. }
            | Self::Order { source, .. } => source.column_types(),
            Self::Nothing { columns } => vec![None; columns.len()],
            Self::Values { rows } => {
                let mut types = vec![None; self.columns()];
                for row in rows {
                    for (datatype, expr) in types.iter_mut().zip(row) {
                        *datatype = match (*datatype, expr.datatype(&[])) {
                            (None, new) | (new, None) => new,
                            (Some(DataType::Integer), Some(DataType::Float)) => {
                                Some(DataType::Float)
                            }
                            (current, _) => current,
                        };
                    }
                }
                types
            }
        }
    }
}

/// An aggregate function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Aggregate {
    ApproxCountDistinct(Expression),
    Average(Expression),
    BoolAnd(Expression),
    BoolOr(Expression),
    Count(Expression),
    CountAll,
    Max(Expression),
    Min(Expression),
    Sum(Expression),
}

impl Aggregate {
    /// Returns the aggregate's function name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ApproxCountDistinct(_) => "approx_count_distinct",
            Self::Average(_) => "avg",
            Self::BoolAnd(_) => "bool_and",
            Self::BoolOr(_) => "bool_or",
            Self::Count(_) | Self::CountAll => "count",
            Self::Max(_) => "max",
            Self::Min(_) => "min",
            Self::Sum(_) => "sum",
        }
    }

    /// Returns the aggregate's input expression, if any.
    pub fn expression(&self) -> Option<&Expression> {
        match self {
            Self::ApproxCountDistinct(expr)
            | Self::Average(expr)
            | Self::BoolAnd(expr)
            | Self::BoolOr(expr)
            | Self::Count(expr)
            | Self::Max(expr)
            | Self::Min(expr)
            | Self::Sum(expr) => Some(expr),
            Self::CountAll => None,
        }
    }

    /// Returns the aggregate's result type given the input column types.
    pub fn datatype(&self, input: &[Option<DataType>]) -> Option<DataType> {
        match self {
            Self::ApproxCountDistinct(_) | Self::Count(_) | Self::CountAll => {
                Some(DataType::Integer)
            }
            Self::Average(expr) => expr.datatype(input).map(|_| DataType::Float),
            Self::BoolAnd(_) | Self::BoolOr(_) => Some(DataType::Boolean),
            Self::Max(expr) | Self::Min(expr) | Self::Sum(expr) => expr.datatype(input),
        }
    }
}

/// A sort order direction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ascending => f.write_str("asc"),
            Self::Descending => f.write_str("desc"),
        }
    }
}

impl From<crate::sql::parser::ast::Direction> for Direction {
    fn from(dir: crate::sql::parser::ast::Direction) -> Self {
        match dir {
            crate::sql::parser::ast::Direction::Ascending => Self::Ascending,
            crate::sql::parser::ast::Direction::Descending => Self::Descending,
        }
    }
}

/// Inverts a Remap targets vector to a vector of source indexes, with None
/// for columns that weren't targeted.
pub fn remap_sources(targets: &[Option<usize>]) -> Vec<Option<usize>> {
    let size = targets.iter().filter_map(|v| *v).map(|i| i + 1).max().unwrap_or(0);
    let mut sources = vec![None; size];
    for (from, to) in targets.iter().enumerate() {
        if let Some(to) = to {
            sources[*to] = Some(from);
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::types::Column;

    fn scan() -> Node {
        Node::Scan {
            table: Table {
                name: "t".into(),
                columns: vec![
                    Column { name: "a".into(), datatype: DataType::Integer, nullable: true },
                    Column { name: "b".into(), datatype: DataType::Float, nullable: true },
                ],
            },
            filter: None,
            alias: None,
        }
    }

    #[test]
    fn remap_sources_inverts_targets() {
        assert_eq!(remap_sources(&[Some(1), None, Some(0)]), vec![Some(2), Some(0)]);
        assert_eq!(remap_sources(&[None, None]), Vec::<Option<usize>>::new());
    }

    #[test]
    fn aggregate_columns() {
        let node = Node::Aggregate {
            source: Box::new(scan()),
            group_by: vec![Expression::Column(0)],
            aggregates: vec![Aggregate::Average(Expression::Column(0)), Aggregate::CountAll],
        };
        assert_eq!(node.column_names(), vec!["a", "column1", "column2"]);
        assert_eq!(
            node.column_types(),
            vec![Some(DataType::Integer), Some(DataType::Float), Some(DataType::Integer)]
        );
    }

    #[test]
    fn remap_hides_columns() {
        let node = Node::Remap { source: Box::new(scan()), targets: vec![None, Some(0)] };
        assert_eq!(node.columns(), 1);
        assert_eq!(node.column_names(), vec!["b"]);
        assert_eq!(node.column_types(), vec![Some(DataType::Float)]);
    }
}
