use std::collections::BTreeMap;

use crate::error::Result;
use crate::sketch::{HyperLogLog, SketchValue};
use crate::sql::planner::Aggregate;
use crate::sql::types::{Expression, Row, Rows, Value};
use crate::{errdata, errinput};

/// Aggregates rows (i.e. GROUP BY).
///
/// For every group_by bucket, computes the aggregate functions. The output
/// rows contain the group_by values followed by the aggregate values. Without
/// group_by expressions a single row is always emitted, even for empty input.
pub fn aggregate(
    mut source: Rows,
    group_by: Vec<Expression>,
    aggregates: Vec<Aggregate>,
) -> Result<Rows> {
    let mut aggregator = Aggregator::new(group_by, aggregates);
    source.try_for_each(|row| aggregator.add(row?))?;
    aggregator.into_rows()
}

/// Computes bucketed aggregates for rows.
struct Aggregator {
    /// Bucketed accumulators (by group_by values). Ordered for determinism.
    buckets: BTreeMap<Vec<Value>, Vec<Accumulator>>,
    /// The set of empty accumulators. Used to create new buckets.
    empty: Vec<Accumulator>,
    /// Group by expressions. Indexes map to bucket values.
    group_by: Vec<Expression>,
    /// Expressions to accumulate. Indexes map to accumulators.
    expressions: Vec<Option<Expression>>,
}

impl Aggregator {
    /// Creates a new aggregator for the given GROUP BY buckets and aggregates.
    fn new(group_by: Vec<Expression>, aggregates: Vec<Aggregate>) -> Self {
        let empty = aggregates.iter().map(Accumulator::new).collect();
        let expressions = aggregates.into_iter().map(|a| a.expression().cloned()).collect();
        Self { buckets: BTreeMap::new(), empty, group_by, expressions }
    }

    /// Adds a row to the aggregator.
    fn add(&mut self, row: Row) -> Result<()> {
        // Compute the bucket values.
        let key: Vec<Value> =
            self.group_by.iter().map(|expr| expr.evaluate(Some(&row))).collect::<Result<_>>()?;

        // Look up the bucket accumulators, or create a new bucket.
        let accumulators =
            self.buckets.entry(key).or_insert_with(|| self.empty.clone()).iter_mut();

        // Accumulate expression values into the bucket. COUNT(*) has no
        // expression, and accumulates a constant for every row.
        for (accumulator, expr) in accumulators.zip(&self.expressions) {
            match expr {
                Some(expr) => accumulator.add(expr.evaluate(Some(&row))?)?,
                None => accumulator.add(Value::Boolean(true))?,
            }
        }
        Ok(())
    }

    /// Returns a row iterator over the aggregate result.
    fn into_rows(self) -> Result<Rows> {
        // If there were no rows and no group_by expressions, return a row of
        // empty accumulators, e.g.: SELECT COUNT(*) FROM t WHERE FALSE
        if self.buckets.is_empty() && self.group_by.is_empty() {
            let result = self.empty.into_iter().map(|acc| acc.value()).collect::<Result<_>>()?;
            return Ok(Box::new(std::iter::once(Ok(result))));
        }

        // Emit the group_by and aggregate values for each bucket. We use an
        // intermediate vec since btree_map::IntoIter doesn't implement Clone.
        let buckets = self.buckets.into_iter().collect::<Vec<_>>();
        Ok(Box::new(buckets.into_iter().map(|(bucket, accumulators)| {
            bucket
                .into_iter()
                .map(Ok)
                .chain(accumulators.into_iter().map(|acc| acc.value()))
                .collect()
        })))
    }
}

/// Accumulates aggregate values. NULL inputs are skipped.
#[derive(Clone)]
enum Accumulator {
    ApproxCountDistinct(HyperLogLog),
    Average { count: i64, sum: f64 },
    BoolAnd(Option<bool>),
    BoolOr(Option<bool>),
    Count(i64),
    Max(Option<Value>),
    Min(Option<Value>),
    Sum(Option<Value>),
}

impl Accumulator {
    /// Creates a new accumulator from an aggregate kind.
    fn new(aggregate: &Aggregate) -> Self {
        match aggregate {
            Aggregate::ApproxCountDistinct(_) => Self::ApproxCountDistinct(HyperLogLog::new()),
            Aggregate::Average(_) => Self::Average { count: 0, sum: 0.0 },
            Aggregate::BoolAnd(_) => Self::BoolAnd(None),
            Aggregate::BoolOr(_) => Self::BoolOr(None),
            Aggregate::Count(_) | Aggregate::CountAll => Self::Count(0),
            Aggregate::Max(_) => Self::Max(None),
            Aggregate::Min(_) => Self::Min(None),
            Aggregate::Sum(_) => Self::Sum(None),
        }
    }

    /// Adds a value to the accumulator.
    fn add(&mut self, value: Value) -> Result<()> {
        if value == Value::Null {
            return Ok(());
        }
        match (self, value) {
            (Self::ApproxCountDistinct(hll), value) => hll.add(match &value {
                Value::Boolean(b) => SketchValue::Boolean(*b),
                Value::Integer(i) => SketchValue::Integer(*i),
                Value::Float(f) => SketchValue::Float(*f),
                Value::String(s) => SketchValue::String(s),
                Value::Null => return Ok(()),
            }),

            (Self::Average { count, sum }, Value::Integer(i)) => {
                *count += 1;
                *sum += i as f64;
            }
            (Self::Average { count, sum }, Value::Float(f)) => {
                *count += 1;
                *sum += f;
            }

            (Self::BoolAnd(acc), Value::Boolean(b)) => *acc = Some(acc.unwrap_or(true) && b),
            (Self::BoolOr(acc), Value::Boolean(b)) => *acc = Some(acc.unwrap_or(false) || b),

            (Self::Count(count), _) => *count += 1,

            (Self::Max(max @ None), value) => *max = Some(value),
            (Self::Max(Some(max)), value) => {
                Self::check_comparable(max, &value)?;
                if value > *max {
                    *max = value
                }
            }

            (Self::Min(min @ None), value) => *min = Some(value),
            (Self::Min(Some(min)), value) => {
                Self::check_comparable(min, &value)?;
                if value < *min {
                    *min = value
                }
            }

            (Self::Sum(sum @ None), value @ (Value::Integer(_) | Value::Float(_))) => {
                *sum = Some(value)
            }
            (Self::Sum(Some(sum)), value) => *sum = sum.checked_add(&value)?,

            (Self::Average { .. }, value) | (Self::Sum(None), value) => {
                return errinput!("can't sum {value}")
            }
            (Self::BoolAnd(_) | Self::BoolOr(_), value) => {
                return errinput!("expected boolean, got {value}")
            }
        }
        Ok(())
    }

    /// Errors if values of different types are compared, except integers and
    /// floats.
    fn check_comparable(lhs: &Value, rhs: &Value) -> Result<()> {
        match (lhs, rhs) {
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => Ok(()),
            (lhs, rhs) if lhs.datatype() == rhs.datatype() => Ok(()),
            (lhs, rhs) => errinput!("can't compare {lhs} and {rhs}"),
        }
    }

    /// Returns the aggregate value.
    fn value(self) -> Result<Value> {
        Ok(match self {
            Self::ApproxCountDistinct(hll) => Value::Integer(hll.count()),
            Self::Average { count: 0, .. } => Value::Null,
            Self::Average { count, sum } => Value::Float(sum / count as f64),
            Self::BoolAnd(b) | Self::BoolOr(b) => b.into(),
            Self::Count(count) => Value::Integer(count),
            Self::Max(value) | Self::Min(value) | Self::Sum(value) => match value {
                Some(value @ Value::Null) => return errdata!("unexpected accumulated {value}"),
                value => value.into(),
            },
        })
    }
}
