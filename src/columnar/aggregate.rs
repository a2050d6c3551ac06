//! Hash aggregation.

use std::collections::HashMap;

use super::compile::{AggregateCall, AggregateFunction, Kernel};
use super::vector::{Chunk, Scalar, Vector};
use crate::errinput;
use crate::error::Result;
use crate::sketch::HyperLogLog;

/// Groups the chunk's rows by the grouping kernels and computes the
/// aggregate calls per group. Emits the grouping columns followed by the
/// aggregates, with groups in order of first appearance. Without groupings,
/// exactly one row is emitted, even for empty input.
pub fn aggregate(chunk: &Chunk, groupings: &[Kernel], calls: &[AggregateCall]) -> Result<Chunk> {
    let keys: Vec<Vector> = groupings.iter().map(|k| k.evaluate(chunk)).collect::<Result<_>>()?;
    let arguments: Vec<Option<Vector>> = calls
        .iter()
        .map(|call| call.argument.as_ref().map(|k| k.evaluate(chunk)).transpose())
        .collect::<Result<_>>()?;
    let empty: Vec<Accumulator> = calls.iter().map(|c| Accumulator::new(c.function)).collect();

    // The first row of each group, used to emit the group's key values.
    let mut firsts: Vec<usize> = Vec::new();
    let mut groups: HashMap<Vec<Scalar>, usize> = HashMap::new();
    let mut states: Vec<Vec<Accumulator>> = Vec::new();
    if groupings.is_empty() {
        groups.insert(Vec::new(), 0);
        states.push(empty.clone());
    }

    for row in 0..chunk.len {
        let key: Vec<Scalar> = keys.iter().map(|k| k.get(row)).collect();
        let group = *groups.entry(key).or_insert_with(|| {
            firsts.push(row);
            states.push(empty.clone());
            states.len() - 1
        });
        for (accumulator, argument) in states[group].iter_mut().zip(&arguments) {
            accumulator.add(argument.as_ref().map(|a| a.get(row)))?;
        }
    }

    let len = states.len();
    let mut values: Vec<Vec<Scalar>> = vec![Vec::with_capacity(len); calls.len()];
    for state in states {
        for (column, accumulator) in values.iter_mut().zip(state) {
            column.push(accumulator.finish());
        }
    }
    let mut columns: Vec<Vector> = keys.iter().map(|k| k.take(&firsts)).collect();
    for column in values {
        columns.push(Vector::from_scalars(column)?);
    }
    Chunk::new(columns, len)
}

/// An aggregate's running state for a group. NULL values are skipped.
#[derive(Clone)]
enum Accumulator {
    ApproxCountDistinct(HyperLogLog),
    Avg { count: i64, sum: f64 },
    BoolAnd(Option<bool>),
    BoolOr(Option<bool>),
    Count(i64),
    Max(Option<Scalar>),
    Min(Option<Scalar>),
    Sum(Option<Scalar>),
}

impl Accumulator {
    fn new(function: AggregateFunction) -> Self {
        match function {
            AggregateFunction::ApproxCountDistinct => Self::ApproxCountDistinct(HyperLogLog::new()),
            AggregateFunction::Avg => Self::Avg { count: 0, sum: 0.0 },
            AggregateFunction::BoolAnd => Self::BoolAnd(None),
            AggregateFunction::BoolOr => Self::BoolOr(None),
            AggregateFunction::Count => Self::Count(0),
            AggregateFunction::Max => Self::Max(None),
            AggregateFunction::Min => Self::Min(None),
            AggregateFunction::Sum => Self::Sum(None),
        }
    }

    /// Adds a row's value. None (no argument) counts the row.
    fn add(&mut self, value: Option<Scalar>) -> Result<()> {
        let value = match value {
            Some(Scalar::Null) => return Ok(()),
            Some(value) => value,
            None => {
                if let Self::Count(count) = self {
                    *count += 1;
                }
                return Ok(());
            }
        };
        match (self, value) {
            (Self::ApproxCountDistinct(hll), value) => {
                if let Some(value) = value.sketch_value() {
                    hll.add(value)
                }
            }
            (Self::Avg { count, sum }, Scalar::Integer(i)) => {
                *count += 1;
                *sum += i as f64;
            }
            (Self::Avg { count, sum }, Scalar::Float(f)) => {
                *count += 1;
                *sum += f;
            }
            (Self::BoolAnd(state), Scalar::Boolean(b)) => *state = Some(state.unwrap_or(true) && b),
            (Self::BoolOr(state), Scalar::Boolean(b)) => *state = Some(state.unwrap_or(false) || b),
            (Self::Count(count), _) => *count += 1,
            (Self::Max(max), value) => {
                if max.as_ref().map_or(true, |max| value > *max) {
                    *max = Some(value)
                }
            }
            (Self::Min(min), value) => {
                if min.as_ref().map_or(true, |min| value < *min) {
                    *min = Some(value)
                }
            }
            (Self::Sum(sum @ None), value @ (Scalar::Integer(_) | Scalar::Float(_))) => {
                *sum = Some(value)
            }
            (Self::Sum(Some(sum)), value) => *sum = sum.checked_add(&value)?,
            (Self::Avg { .. } | Self::Sum(None), value) => return errinput!("can't sum {value:?}"),
            (Self::BoolAnd(_) | Self::BoolOr(_), value) => {
                return errinput!("expected boolean, got {value:?}")
            }
        }
        Ok(())
    }

    fn finish(self) -> Scalar {
        match self {
            Self::ApproxCountDistinct(hll) => Scalar::Integer(hll.count()),
            Self::Avg { count: 0, .. } => Scalar::Null,
            Self::Avg { count, sum } => Scalar::Float(sum / count as f64),
            Self::BoolAnd(b) | Self::BoolOr(b) => b.map_or(Scalar::Null, Scalar::Boolean),
            Self::Count(count) => Scalar::Integer(count),
            Self::Max(value) | Self::Min(value) | Self::Sum(value) => value.unwrap_or(Scalar::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(function: AggregateFunction, column: Option<usize>) -> AggregateCall {
        AggregateCall { function, argument: column.map(Kernel::Column) }
    }

    #[test]
    fn empty_input_without_groups() -> Result<()> {
        let chunk = Chunk::new(vec![Vector::Integer(vec![])], 0)?;
        let calls = vec![
            call(AggregateFunction::Count, None),
            call(AggregateFunction::Count, Some(0)),
            call(AggregateFunction::Sum, Some(0)),
            call(AggregateFunction::Avg, Some(0)),
            call(AggregateFunction::ApproxCountDistinct, Some(0)),
        ];
        let output = aggregate(&chunk, &[], &calls)?;
        assert_eq!(output.len, 1);
        assert_eq!(
            output.columns,
            vec![
                Vector::Integer(vec![Some(0)]),
                Vector::Integer(vec![Some(0)]),
                Vector::Null(1),
                Vector::Null(1),
                Vector::Integer(vec![Some(0)]),
            ]
        );

        let output = aggregate(&chunk, &[Kernel::Column(0)], &calls)?;
        assert_eq!(output.len, 0);
        Ok(())
    }

    #[test]
    fn ungrouped_rows_share_one_group() -> Result<()> {
        let chunk = Chunk::new(vec![Vector::Integer(vec![Some(1), Some(2), Some(2)])], 3)?;
        let calls = vec![
            call(AggregateFunction::Count, None),
            call(AggregateFunction::ApproxCountDistinct, Some(0)),
        ];
        let output = aggregate(&chunk, &[], &calls)?;
        assert_eq!(output.len, 1);
        assert_eq!(
            output.columns,
            vec![Vector::Integer(vec![Some(3)]), Vector::Integer(vec![Some(2)])]
        );
        Ok(())
    }

    #[test]
    fn groups_in_first_appearance_order() -> Result<()> {
        let chunk = Chunk::new(
            vec![
                Vector::String(vec![Some("b".into()), Some("a".into()), Some("b".into()), None]),
                Vector::Float(vec![Some(1.5), None, Some(2.0), Some(-1.0)]),
            ],
            4,
        )?;
        let calls = vec![
            call(AggregateFunction::Sum, Some(1)),
            call(AggregateFunction::Min, Some(1)),
            call(AggregateFunction::Count, Some(1)),
        ];
        let output = aggregate(&chunk, &[Kernel::Column(0)], &calls)?;
        assert_eq!(
            output.columns,
            vec![
                Vector::String(vec![Some("b".into()), Some("a".into()), None]),
                Vector::Float(vec![Some(3.5), None, Some(-1.0)]),
                Vector::Float(vec![Some(1.5), None, Some(-1.0)]),
                Vector::Integer(vec![Some(2), Some(0), Some(1)]),
            ]
        );
        Ok(())
    }

    #[test]
    fn float_keys_use_bit_equality() -> Result<()> {
        let keys = vec![Some(0.0), Some(-0.0), Some(f64::NAN), Some(f64::NAN)];
        let chunk = Chunk::new(vec![Vector::Float(keys)], 4)?;
        let count = call(AggregateFunction::Count, None);
        let output = aggregate(&chunk, &[Kernel::Column(0)], &[count])?;
        assert_eq!(output.len, 3);
        assert_eq!(output.columns[1], Vector::Integer(vec![Some(1), Some(1), Some(2)]));
        Ok(())
    }

    #[test]
    fn booleans_and_errors() -> Result<()> {
        let chunk = Chunk::new(vec![Vector::Boolean(vec![Some(true), None, Some(false)])], 3)?;
        let calls = vec![
            call(AggregateFunction::BoolAnd, Some(0)),
            call(AggregateFunction::BoolOr, Some(0)),
        ];
        let output = aggregate(&chunk, &[], &calls)?;
        assert_eq!(
            output.columns,
            vec![Vector::Boolean(vec![Some(false)]), Vector::Boolean(vec![Some(true)])]
        );
        assert!(aggregate(&chunk, &[], &[call(AggregateFunction::Sum, Some(0))]).is_err());

        let chunk = Chunk::new(vec![Vector::Integer(vec![Some(i64::MAX), Some(1)])], 2)?;
        assert!(aggregate(&chunk, &[], &[call(AggregateFunction::Sum, Some(0))]).is_err());
        Ok(())
    }
}
