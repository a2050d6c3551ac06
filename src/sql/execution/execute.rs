use itertools::Itertools as _;
use log::debug;

use super::{aggregate, source, transform, write};
use crate::error::Result;
use crate::sql::engine::{Catalog, Transaction};
use crate::sql::planner::{Node, Plan};
use crate::sql::types::{DataType, Row, Rows};

/// The outcome of executing a statement plan.
pub enum ExecutionResult {
    CreateTable { name: String, count: Option<u64> },
    DropTable { name: String, existed: bool },
    Insert { count: u64 },
    Select { rows: Rows, columns: Vec<String>, types: Vec<Option<DataType>> },
}

/// Executes a statement plan.
///
/// Takes the transaction and catalog separately, even though the storage
/// implements both, to ensure the catalog is primarily used during planning.
pub fn execute_plan(
    plan: Plan,
    txn: &impl Transaction,
    catalog: &impl Catalog,
) -> Result<ExecutionResult> {
    Ok(match plan {
        Plan::CreateTable { schema, or_replace } => {
            let name = schema.name.clone();
            if or_replace {
                catalog.drop_table(&name, true)?;
            }
            catalog.create_table(schema)?;
            ExecutionResult::CreateTable { name, count: None }
        }

        // The source is fully materialized before touching the catalog, since
        // it may read the table being replaced.
        Plan::CreateTableAs { schema, or_replace, source } => {
            let name = schema.name.clone();
            let rows: Vec<Row> = execute(source, txn)?.try_collect()?;
            if or_replace {
                catalog.drop_table(&name, true)?;
            }
            catalog.create_table(schema)?;
            let count = txn.insert(&name, rows)?;
            debug!("created table {name} with {count} rows");
            ExecutionResult::CreateTable { name, count: Some(count) }
        }

        Plan::DropTable { table, if_exists } => {
            let existed = catalog.drop_table(&table, if_exists)?;
            ExecutionResult::DropTable { name: table, existed }
        }

        Plan::Insert { table, column_map, source } => {
            let source = execute(source, txn)?;
            let count = write::insert(txn, table, column_map, source)?;
            ExecutionResult::Insert { count }
        }

        Plan::Select(root) => {
            let columns = root.column_names();
            let types = root.column_types();
            let rows = execute(root, txn)?;
            ExecutionResult::Select { rows, columns, types }
        }
    })
}

/// Builds the row iterator for a plan node. Each node pulls rows from its
/// children lazily, so rows flow from the leaves towards the root.
///
/// Below is an example of a query plan:
///
/// SELECT l_orderkey, l_quantity * 2 AS q FROM lineitem
/// WHERE l_quantity > 10 ORDER BY q DESC LIMIT 5
///
/// Limit: 5
/// └─ Order: q desc
///    └─ Projection: lineitem.l_orderkey, lineitem.l_quantity * 2 as q
///       └─ Scan: lineitem (lineitem.l_quantity > 10)
///
/// The Scan node reads table rows from storage, discarding those that don't
/// match the filter. The Projection node computes the output columns, and the
/// Order node buffers and sorts them before the Limit node emits the first 5.
pub fn execute(node: Node, txn: &impl Transaction) -> Result<Rows> {
    Ok(match node {
        Node::Aggregate { source, group_by, aggregates } => {
            let source = execute(*source, txn)?;
            aggregate::aggregate(source, group_by, aggregates)?
        }

        Node::Filter { source, predicate } => {
            let source = execute(*source, txn)?;
            transform::filter(source, predicate)
        }

        Node::Limit { source, limit } => {
            let source = execute(*source, txn)?;
            transform::limit(source, limit)
        }

        Node::Nothing { .. } => source::nothing(),

        Node::Offset { source, offset } => {
            let source = execute(*source, txn)?;
            transform::offset(source, offset)
        }

        Node::Order { source, key: orders } => {
            let source = execute(*source, txn)?;
            transform::order(source, orders)?
        }

        Node::Parquet { path, table, .. } => source::parquet(&path, &table)?,

        Node::Projection { source, expressions, .. } => {
            let source = execute(*source, txn)?;
            transform::project(source, expressions)
        }

        Node::Remap { source, targets } => {
            let source = execute(*source, txn)?;
            transform::remap(source, targets)
        }

        Node::Scan { table, filter, .. } => source::scan(txn, table, filter)?,

        Node::Values { rows } => source::values(rows),
    })
}
