use std::collections::{HashMap, HashSet};

use itertools::Itertools as _;

use super::plan::{remap_sources, Aggregate, Node, Plan};
use crate::errinput;
use crate::error::Result;
use crate::fixture;
use crate::sql::engine::Catalog;
use crate::sql::parser::ast;
use crate::sql::types::{Column, DataType, Expression, Label, Table, Value};

/// Aggregate function names.
const AGGREGATES: &[&str] =
    &["approx_count_distinct", "avg", "bool_and", "bool_or", "count", "max", "min", "sum"];

/// Turns parsed statements into plans, resolving names against a catalog.
pub struct Planner<'a, C: Catalog> {
    catalog: &'a C,
}

impl<'a, C: Catalog> Planner<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Plans a statement.
    pub fn build(&mut self, statement: ast::Statement) -> Result<Plan> {
        use ast::Statement::*;
        match statement {
            CreateTable { name, columns, or_replace } => {
                self.build_create_table(name, columns, or_replace)
            }
            CreateTableAs { name, query, or_replace } => {
                self.build_create_table_as(name, *query, or_replace)
            }
            DropTable { name, if_exists } => Ok(Plan::DropTable { table: name, if_exists }),
            Insert { table, columns, values } => self.build_insert(table, columns, values),
            select @ Select { .. } => Ok(Plan::Select(self.build_select(select)?)),
            Install { .. } | Load { .. } => errinput!("extension statements can't be planned"),
        }
    }

    /// Builds a CREATE TABLE plan.
    fn build_create_table(
        &self,
        name: String,
        columns: Vec<ast::Column>,
        or_replace: bool,
    ) -> Result<Plan> {
        let columns = columns
            .into_iter()
            .map(|c| Column {
                name: c.name,
                datatype: c.datatype,
                nullable: c.nullable.unwrap_or(true),
            })
            .collect();
        let schema = Table { name, columns };
        schema.validate()?;
        Ok(Plan::CreateTable { schema, or_replace })
    }

    /// Builds a CREATE TABLE AS plan. The table takes its column names and
    /// types from the query. Columns that can only be NULL become nullable
    /// integer columns.
    fn build_create_table_as(
        &self,
        name: String,
        query: ast::Statement,
        or_replace: bool,
    ) -> Result<Plan> {
        let source = self.build_select(query)?;
        let columns = source
            .column_names()
            .into_iter()
            .zip(source.column_types())
            .map(|(name, datatype)| Column {
                name,
                datatype: datatype.unwrap_or(DataType::Integer),
                nullable: true,
            })
            .collect();
        let schema = Table { name, columns };
        schema.validate()?;
        Ok(Plan::CreateTableAs { schema, or_replace, source })
    }

    /// Builds an INSERT plan.
    fn build_insert(
        &self,
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Vec<ast::Expression>>,
    ) -> Result<Plan> {
        let table = self.catalog.must_get_table(&table)?;
        let mut column_map = None;
        if let Some(columns) = columns {
            let mut map = HashMap::new();
            for (vidx, name) in columns.iter().enumerate() {
                let cidx = table.column_index(name)?;
                if map.insert(cidx, vidx).is_some() {
                    return errinput!("column {name} given multiple times");
                }
            }
            column_map = Some(map);
        }
        let scope = Scope::new();
        let rows = values
            .into_iter()
            .map(|exprs| {
                exprs.into_iter().map(|expr| Self::build_expression(expr, &scope)).collect()
            })
            .collect::<Result<_>>()?;
        Ok(Plan::Insert { table, column_map, source: Node::Values { rows } })
    }

    /// Builds a query node tree for a SELECT statement.
    fn build_select(&self, statement: ast::Statement) -> Result<Node> {
        let ast::Statement::Select {
            select,
            from,
            r#where,
            group_by,
            having,
            order_by,
            offset,
            limit,
        } = statement
        else {
            return errinput!("expected SELECT statement");
        };
        let mut scope = Scope::new();

        // Build FROM clause. Without one, emit a single empty row that
        // constant expressions are evaluated against.
        let mut node = match from {
            Some(from) => self.build_from_clause(from, &mut scope)?,
            None => Node::Values { rows: vec![vec![]] },
        };

        // Build WHERE clause, pushing the predicate into table scans.
        if let Some(expr) = r#where {
            let predicate = Self::build_expression(expr, &scope)?;
            node = match node {
                Node::Scan { table, filter: None, alias } => {
                    Node::Scan { table, filter: Some(predicate), alias }
                }
                node => Node::Filter { source: Box::new(node), predicate },
            };
        }

        // Build aggregate functions and GROUP BY clause.
        let aggregates = Self::collect_aggregates(&select, &having, &order_by);
        if !group_by.is_empty() || !aggregates.is_empty() {
            if select.iter().any(|(expr, _)| expr == &ast::Expression::All) {
                return errinput!("can't use * with aggregates");
            }
            node = self.build_aggregate(&mut scope, node, group_by, aggregates)?;
        }

        // Build SELECT clause. We can omit this for a trivial SELECT *.
        if select.as_slice() != [(ast::Expression::All, None)] {
            // Prepare the post-projection scope.
            let mut child_scope = scope.project(&select);

            // Build the SELECT column expressions and aliases.
            let mut expressions = Vec::with_capacity(select.len());
            let mut aliases = Vec::with_capacity(select.len());
            for (expr, alias) in select {
                expressions.push(Self::build_expression(expr, &scope)?);
                aliases.push(Label::from(alias));
            }

            // Add hidden columns for any HAVING or ORDER BY references that
            // aren't projected.
            for expr in having.iter().chain(order_by.iter().map(|(expr, _)| expr)) {
                for hidden in Self::build_hidden(&scope, &mut child_scope, expr) {
                    expressions.push(hidden);
                    aliases.push(Label::None);
                }
            }

            node = Node::Projection { source: Box::new(node), expressions, aliases };
            scope = child_scope;
        }

        // Build HAVING clause.
        if let Some(expr) = having {
            if scope.aggregates.is_empty() {
                return errinput!("HAVING requires GROUP BY or aggregate function");
            }
            let predicate = Self::build_expression(expr, &scope)?;
            node = Node::Filter { source: Box::new(node), predicate };
        }

        // Build ORDER BY clause.
        if !order_by.is_empty() {
            let key = order_by
                .into_iter()
                .map(|(expr, dir)| Ok((Self::build_expression(expr, &scope)?, dir.into())))
                .collect::<Result<_>>()?;
            node = Node::Order { source: Box::new(node), key };
        }

        // Build OFFSET clause.
        if let Some(expr) = offset {
            let offset = match Self::evaluate_constant(expr)? {
                Value::Integer(offset) if offset >= 0 => usize::try_from(offset)?,
                value => return errinput!("invalid offset {value}"),
            };
            node = Node::Offset { source: Box::new(node), offset }
        }

        // Build LIMIT clause.
        if let Some(expr) = limit {
            let limit = match Self::evaluate_constant(expr)? {
                Value::Integer(limit) if limit >= 0 => usize::try_from(limit)?,
                value => return errinput!("invalid limit {value}"),
            };
            node = Node::Limit { source: Box::new(node), limit }
        }

        // Remove any hidden columns.
        if let Some(targets) = scope.remap_hidden() {
            node = Node::Remap { source: Box::new(node), targets };
        }

        Ok(node)
    }

    /// Builds a FROM clause consisting of a single table or Parquet file.
    fn build_from_clause(&self, from: ast::From, scope: &mut Scope) -> Result<Node> {
        Ok(match from {
            ast::From::Table { name, alias } => {
                let table = self.catalog.must_get_table(&name)?;
                scope.add_table(&table, alias.as_deref())?;
                Node::Scan { table, filter: None, alias }
            }
            ast::From::Parquet { path, alias } => {
                let table = fixture::parquet::read_schema(&path)?;
                scope.add_table(&table, alias.as_deref())?;
                Node::Parquet { path, table, alias }
            }
        })
    }

    /// Builds an aggregate node, computing aggregate functions for the given
    /// GROUP BY buckets. The group_by columns are emitted first, followed by
    /// the aggregates.
    fn build_aggregate(
        &self,
        scope: &mut Scope,
        source: Node,
        group_by: Vec<ast::Expression>,
        aggregates: Vec<ast::Expression>,
    ) -> Result<Node> {
        // Construct a child scope with the group_by and aggregate AST
        // expressions, such that downstream nodes can identify and reference
        // them. Discard redundant expressions.
        let mut child_scope = scope.spawn();
        let group_by = group_by
            .into_iter()
            .filter(|expr| child_scope.add_aggregate(expr, scope).is_some())
            .collect_vec();
        let aggregates = aggregates
            .into_iter()
            .filter(|expr| child_scope.add_aggregate(expr, scope).is_some())
            .collect_vec();

        // Build the node from the remaining unique expressions.
        let group_by = group_by
            .into_iter()
            .map(|expr| {
                if expr.contains(&Self::is_aggregate) {
                    return errinput!("GROUP BY can't contain aggregate functions");
                }
                Self::build_expression(expr, scope)
            })
            .collect::<Result<_>>()?;
        let aggregates = aggregates
            .into_iter()
            .map(|expr| Self::build_aggregate_function(expr, scope))
            .collect::<Result<_>>()?;

        *scope = child_scope;
        Ok(Node::Aggregate { source: Box::new(source), group_by, aggregates })
    }

    /// Builds an aggregate function from an AST expression.
    fn build_aggregate_function(expr: ast::Expression, scope: &Scope) -> Result<Aggregate> {
        let ast::Expression::Function(name, mut args) = expr else {
            panic!("aggregate expression must be function");
        };
        if name == "count" && args.as_slice() == [ast::Expression::All] {
            return Ok(Aggregate::CountAll);
        }
        if args.len() != 1 {
            return errinput!("{name} takes 1 argument");
        }
        if args[0].contains(&Self::is_aggregate) {
            return errinput!("aggregate functions can't be nested");
        }
        let expr = Self::build_expression(args.remove(0), scope)?;
        Ok(match name.as_str() {
            "approx_count_distinct" => Aggregate::ApproxCountDistinct(expr),
            "avg" => Aggregate::Average(expr),
            "bool_and" => Aggregate::BoolAnd(expr),
            "bool_or" => Aggregate::BoolOr(expr),
            "count" => Aggregate::Count(expr),
            "max" => Aggregate::Max(expr),
            "min" => Aggregate::Min(expr),
            "sum" => Aggregate::Sum(expr),
            name => return errinput!("unknown aggregate function {name}"),
        })
    }

    /// Checks whether a given AST expression is an aggregate function call.
    fn is_aggregate(expr: &ast::Expression) -> bool {
        matches!(expr, ast::Expression::Function(name, _) if AGGREGATES.contains(&name.as_str()))
    }

    /// Collects aggregate function calls from SELECT, HAVING, and ORDER BY
    /// clauses. Duplicates are removed later, when adding them to the scope.
    fn collect_aggregates(
        select: &[(ast::Expression, Option<String>)],
        having: &Option<ast::Expression>,
        order_by: &[(ast::Expression, ast::Direction)],
    ) -> Vec<ast::Expression> {
        let mut aggregates = Vec::new();
        for (expr, _) in select {
            expr.collect(&Self::is_aggregate, &mut aggregates);
        }
        for expr in having {
            expr.collect(&Self::is_aggregate, &mut aggregates);
        }
        for (expr, _) in order_by {
            expr.collect(&Self::is_aggregate, &mut aggregates);
        }
        aggregates
    }

    /// Builds hidden columns for a projection to pass through fields that are
    /// used downstream but not projected. Returns the projection expressions
    /// for the hidden columns.
    fn build_hidden(
        scope: &Scope,
        child_scope: &mut Scope,
        expr: &ast::Expression,
    ) -> Vec<Expression> {
        let mut hidden = Vec::new();
        expr.walk(&mut |expr| {
            // If this is an aggregate or GROUP BY expression that isn't
            // already available in the child scope, pass it through.
            if let Some(index) = scope.lookup_aggregate(expr) {
                if child_scope.lookup_aggregate(expr).is_none() {
                    child_scope.add_passthrough(scope, index, true);
                    hidden.push(Expression::Column(index));
                    return true;
                }
            }

            // Look for column references that aren't available in the child
            // scope, and pass them through if they exist in the parent.
            let ast::Expression::Column(table, name) = expr else {
                return true;
            };
            if child_scope.lookup_column(table.as_deref(), name).is_ok() {
                return true;
            }
            // If the parent scope doesn't have the column either, ignore it.
            // The error is emitted when building the expression.
            let Ok(index) = scope.lookup_column(table.as_deref(), name) else {
                return true;
            };
            child_scope.add_passthrough(scope, index, true);
            hidden.push(Expression::Column(index));
            true
        });
        hidden
    }

    /// Resolves an AST expression against the scope. Aggregates and GROUP BY
    /// expressions already computed by an Aggregate node become column
    /// references.
    pub fn build_expression(expr: ast::Expression, scope: &Scope) -> Result<Expression> {
        use Expression::*;

        if let Some(index) = scope.lookup_aggregate(&expr) {
            return Ok(Column(index));
        }

        let build = |expr: ast::Expression| -> Result<Box<Expression>> {
            Ok(Box::new(Self::build_expression(expr, scope)?))
        };

        Ok(match expr {
            // * is expanded by SELECT and count(*) before we get here.
            ast::Expression::All => return errinput!("unsupported use of *"),
            ast::Expression::Literal(l) => Constant(match l {
                ast::Literal::Null => Value::Null,
                ast::Literal::Boolean(b) => Value::Boolean(b),
                ast::Literal::Integer(i) => Value::Integer(i),
                ast::Literal::Float(f) => Value::Float(f),
                ast::Literal::String(s) => Value::String(s),
            }),
            ast::Expression::Column(table, name) => {
                Column(scope.lookup_column(table.as_deref(), &name)?)
            }
            ast::Expression::Function(name, _) if AGGREGATES.contains(&name.as_str()) => {
                return errinput!("aggregate function {name} not allowed here");
            }
            ast::Expression::Function(name, args) => {
                let n = args.len();
                let mut args = args.into_iter();
                let mut arg = || build(args.next().expect("arity checked"));
                match (name.as_str(), n) {
                    ("abs", 1) => Abs(arg()?),
                    ("add", 2) => Add(arg()?, arg()?),
                    ("ceil" | "ceiling", 1) => Ceil(arg()?),
                    ("divide", 2) => Divide(arg()?, arg()?),
                    ("exp", 1) => Exp(arg()?),
                    ("floor", 1) => Floor(arg()?),
                    ("mod" | "modulus", 2) => Remainder(arg()?, arg()?),
                    ("multiply", 2) => Multiply(arg()?, arg()?),
                    ("negate", 1) => Negate(arg()?),
                    ("pow" | "power", 2) => Exponentiate(arg()?, arg()?),
                    ("round", 1) => Round(arg()?, Value::Integer(0).into()),
                    ("round", 2) => Round(arg()?, arg()?),
                    ("sign", 1) => Sign(arg()?),
                    ("sqrt", 1) => SquareRoot(arg()?),
                    ("subtract", 2) => Subtract(arg()?, arg()?),
                    ("xor", 2) => Xor(arg()?, arg()?),
                    (name, n) => return errinput!("unknown function {name} with {n} arguments"),
                }
            }
            ast::Expression::Operator(op) => match op {
                ast::Operator::And(lhs, rhs) => And(build(*lhs)?, build(*rhs)?),
                ast::Operator::Not(expr) => Not(build(*expr)?),
                ast::Operator::Or(lhs, rhs) => Or(build(*lhs)?, build(*rhs)?),

                ast::Operator::Equal(lhs, rhs) => Equal(build(*lhs)?, build(*rhs)?),
                ast::Operator::GreaterThan(lhs, rhs) => GreaterThan(build(*lhs)?, build(*rhs)?),
                ast::Operator::GreaterThanOrEqual(lhs, rhs) => Or(
                    GreaterThan(build(*lhs.clone())?, build(*rhs.clone())?).into(),
                    Equal(build(*lhs)?, build(*rhs)?).into(),
                ),
                ast::Operator::Is(expr, literal) => {
                    let expr = build(*expr)?;
                    let value = match literal {
                        ast::Literal::Null => Value::Null,
                        ast::Literal::Float(f) if f.is_nan() => Value::Float(f),
                        value => panic!("invalid IS value {value:?}"), // enforced by parser
                    };
                    Is(expr, value)
                }
                ast::Operator::LessThan(lhs, rhs) => LessThan(build(*lhs)?, build(*rhs)?),
                ast::Operator::LessThanOrEqual(lhs, rhs) => Or(
                    LessThan(build(*lhs.clone())?, build(*rhs.clone())?).into(),
                    Equal(build(*lhs)?, build(*rhs)?).into(),
                ),
                ast::Operator::NotEqual(lhs, rhs) => Not(Equal(build(*lhs)?, build(*rhs)?).into()),

                ast::Operator::Add(lhs, rhs) => Add(build(*lhs)?, build(*rhs)?),
                ast::Operator::Divide(lhs, rhs) => Divide(build(*lhs)?, build(*rhs)?),
                ast::Operator::Exponentiate(lhs, rhs) => Exponentiate(build(*lhs)?, build(*rhs)?),
                ast::Operator::Identity(expr) => Identity(build(*expr)?),
                ast::Operator::Multiply(lhs, rhs) => Multiply(build(*lhs)?, build(*rhs)?),
                ast::Operator::Negate(expr) => Negate(build(*expr)?),
                ast::Operator::Remainder(lhs, rhs) => Remainder(build(*lhs)?, build(*rhs)?),
                ast::Operator::Subtract(lhs, rhs) => Subtract(build(*lhs)?, build(*rhs)?),
            },
        })
    }

    /// Builds and evaluates a constant AST expression. Errors on column refs.
    fn evaluate_constant(expr: ast::Expression) -> Result<Value> {
        Self::build_expression(expr, &Scope::new())?.evaluate(None)
    }
}

/// The columns visible at a point in the plan, and the names they go by.
/// Column references in expressions resolve to row indexes through the scope.
/// It also remembers which columns hold aggregate or GROUP BY results and
/// which are hidden sort or HAVING inputs.
#[derive(Default)]
pub struct Scope {
    /// Visible columns. Empty for constant-only contexts such as VALUES.
    columns: Vec<Label>,
    /// Table names or aliases in scope.
    tables: HashSet<String>,
    /// (table, column) to index. Always unique.
    qualified: HashMap<(String, String), usize>,
    /// Bare column name to indexes. More than one index means the name is
    /// ambiguous.
    unqualified: HashMap<String, Vec<usize>>,
    /// Aggregate and GROUP BY expressions to the Aggregate output column that
    /// computes them. Non-empty once the query has aggregated.
    aggregates: HashMap<ast::Expression, usize>,
    /// Columns carried through a projection only for ORDER BY or HAVING. They
    /// are dropped before results are returned.
    hidden: HashSet<usize>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty scope that keeps the parent's table names.
    fn spawn(&self) -> Self {
        let mut child = Scope::new();
        child.tables = self.tables.clone();
        child
    }

    /// Adds all of a table's columns under its alias, or its name if none. The
    /// label must not already be in scope.
    fn add_table(&mut self, table: &Table, alias: Option<&str>) -> Result<()> {
        let name = alias.unwrap_or(&table.name);
        if self.tables.contains(name) {
            return errinput!("duplicate table name {name}");
        }
        for column in &table.columns {
            self.add_column(Label::Qualified(name.to_string(), column.name.clone()));
        }
        self.tables.insert(name.to_string());
        Ok(())
    }

    /// Appends a column and returns its index.
    fn add_column(&mut self, label: Label) -> usize {
        let index = self.columns.len();
        if let Label::Qualified(table, column) = &label {
            self.qualified.insert((table.clone(), column.clone()), index);
        }
        if let Label::Qualified(_, name) | Label::Unqualified(name) = &label {
            self.unqualified.entry(name.clone()).or_default().push(index);
        }
        self.columns.push(label);
        index
    }

    /// Resolves a possibly qualified column name to its index.
    fn lookup_column(&self, table: Option<&str>, name: &str) -> Result<usize> {
        let fmtname = || table.map(|table| format!("{table}.{name}")).unwrap_or(name.to_string());
        if self.columns.is_empty() {
            return errinput!("expression must be constant, found column {}", fmtname());
        }
        if let Some(table) = table {
            if !self.tables.contains(table) {
                return errinput!("unknown table {table}");
            }
            if let Some(index) = self.qualified.get(&(table.to_string(), name.to_string())) {
                return Ok(*index);
            }
        } else if let Some(indexes) = self.unqualified.get(name) {
            if indexes.len() > 1 {
                return errinput!("ambiguous column {name}");
            }
            return Ok(indexes[0]);
        }
        if !self.aggregates.is_empty() {
            return errinput!(
                "column {} must be used in an aggregate or GROUP BY expression",
                fmtname()
            );
        }
        errinput!("unknown column {}", fmtname())
    }

    /// Registers an aggregate or GROUP BY expression as a new output column.
    /// Returns None if it is already registered.
    fn add_aggregate(&mut self, expr: &ast::Expression, parent: &Scope) -> Option<usize> {
        if self.aggregates.contains_key(expr) {
            return None;
        }
        // GROUP BY on a plain column keeps the column's name.
        let mut label = Label::None;
        if let ast::Expression::Column(table, column) = expr {
            if let Ok(index) = parent.lookup_column(table.as_deref(), column.as_str()) {
                label = parent.columns[index].clone();
            }
        }
        let index = self.add_column(label);
        self.aggregates.insert(expr.clone(), index);
        Some(index)
    }

    /// Returns the output column of a registered aggregate expression.
    fn lookup_aggregate(&self, expr: &ast::Expression) -> Option<usize> {
        self.aggregates.get(expr).copied()
    }

    /// Copies a parent column into this scope with its name and aggregate
    /// mapping, optionally hiding it.
    fn add_passthrough(&mut self, parent: &Scope, parent_index: usize, hide: bool) -> usize {
        let index = self.add_column(parent.columns[parent_index].clone());
        for (expr, i) in &parent.aggregates {
            if *i == parent_index {
                self.aggregates.entry(expr.clone()).or_insert(index);
            }
        }
        if hide || parent.hidden.contains(&parent_index) {
            self.hidden.insert(index);
        }
        index
    }

    /// The scope after a projection: one column per expression, named by its
    /// alias. Unaliased column references keep their qualified name, and other
    /// expressions are unnamed.
    fn project(&self, expressions: &[(ast::Expression, Option<String>)]) -> Self {
        let mut child = self.spawn();
        for (expr, alias) in expressions {
            let mut label = Label::None;
            if let Some(alias) = alias {
                label = Label::Unqualified(alias.clone());
            } else if let ast::Expression::Column(table, column) = expr {
                if let Ok(index) = self.lookup_column(table.as_deref(), column.as_str()) {
                    label = self.columns[index].clone();
                }
            }
            let index = child.add_column(label);
            // After aggregation every projected expression is itself an
            // aggregate or group key.
            if !self.aggregates.is_empty() {
                child.aggregates.entry(expr.clone()).or_insert(index);
            }
        }
        child
    }

    /// Drops hidden columns, returning their indexes, or None if there were
    /// none.
    fn remove_hidden(&mut self) -> Option<HashSet<usize>> {
        if self.hidden.is_empty() {
            return None;
        }
        let hidden = std::mem::take(&mut self.hidden);
        let mut index = 0;
        self.columns.retain(|_| {
            let retain = !hidden.contains(&index);
            index += 1;
            retain
        });
        self.qualified.retain(|_, index| !hidden.contains(index));
        self.unqualified.iter_mut().for_each(|(_, vec)| vec.retain(|i| !hidden.contains(i)));
        self.unqualified.retain(|_, vec| !vec.is_empty());
        self.aggregates.retain(|_, index| !hidden.contains(index));
        Some(hidden)
    }

    /// Drops hidden columns, returning the Remap targets that map each old
    /// index to its new one (None for dropped columns).
    fn remap_hidden(&mut self) -> Option<Vec<Option<usize>>> {
        let size = self.columns.len();
        let hidden = self.remove_hidden()?;
        let mut targets = vec![None; size];
        let mut index = 0;
        for (old_index, target) in targets.iter_mut().enumerate() {
            if !hidden.contains(&old_index) {
                *target = Some(index);
                index += 1;
            }
        }
        debug_assert_eq!(remap_sources(&targets).len(), index);
        Some(targets)
    }
}
