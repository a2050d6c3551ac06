use std::cmp::Ordering;

use itertools::{izip, Itertools as _};

use crate::errdata;
use crate::error::Result;
use crate::sql::planner::{remap_sources, Direction};
use crate::sql::types::{Expression, Row, Rows, Value};

/// Filters the input rows (i.e. WHERE). Rows where the predicate is false or
/// NULL are discarded.
pub fn filter(source: Rows, predicate: Expression) -> Rows {
    Box::new(source.filter_map(move |r| {
        r.and_then(|row| match predicate.evaluate(Some(&row))? {
            Value::Boolean(true) => Ok(Some(row)),
            Value::Boolean(false) | Value::Null => Ok(None),
            value => errdata!("filter returned {value}, expected boolean"),
        })
        .transpose()
    }))
}

/// Limits the result to the given number of rows (i.e. LIMIT).
pub fn limit(source: Rows, limit: usize) -> Rows {
    Box::new(source.take(limit))
}

/// Skips the given number of rows (i.e. OFFSET).
pub fn offset(source: Rows, offset: usize) -> Rows {
    Box::new(source.skip(offset))
}

/// Sorts the rows (i.e. ORDER BY). The sort is stable, and NULLs sort first in
/// ascending order and last in descending order.
pub fn order(source: Rows, order: Vec<(Expression, Direction)>) -> Result<Rows> {
    // We can't use sort_by_cached_key(), since expression evaluation is
    // fallible, and since we may have to vary the sort direction of each
    // expression. Precompute the sort values instead, and map them based on
    // the row index.
    let mut irows: Vec<_> = source
        .enumerate()
        .map(|(i, r)| r.map(|row| (i, row)))
        .collect::<Result<_>>()?;

    let mut sort_values = Vec::with_capacity(irows.len());
    for (_, row) in &irows {
        let values: Vec<_> = order.iter().map(|(e, _)| e.evaluate(Some(row))).try_collect()?;
        sort_values.push(values)
    }

    // Ties fall back to the original row position, keeping the sort stable.
    irows.sort_by(|&(a, _), &(b, _)| {
        let dirs = order.iter().map(|(_, dir)| dir);
        for (a, b, dir) in izip!(&sort_values[a], &sort_values[b], dirs) {
            match a.cmp(b) {
                Ordering::Equal => {}
                order if *dir == Direction::Descending => return order.reverse(),
                order => return order,
            }
        }
        a.cmp(&b)
    });

    Ok(Box::new(irows.into_iter().map(|(_, row)| Ok(row))))
}

/// Projects the rows using the given expressions (i.e. SELECT).
pub fn project(source: Rows, expressions: Vec<Expression>) -> Rows {
    Box::new(source.map(move |r| {
        r.and_then(|row| expressions.iter().map(|e| e.evaluate(Some(&row))).collect())
    }))
}

/// Remaps source columns to target column indexes, or drops them if None.
pub fn remap(source: Rows, targets: Vec<Option<usize>>) -> Rows {
    let sources = remap_sources(&targets);
    Box::new(source.map_ok(move |row| {
        let mut row = row.into_iter().map(Some).collect_vec();
        sources
            .iter()
            .map(|i| i.and_then(|i| row.get_mut(i)).and_then(Option::take).unwrap_or(Value::Null))
            .collect::<Row>()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: Vec<Vec<Value>>) -> Rows {
        Box::new(values.into_iter().map(Ok))
    }

    #[test]
    fn order_nulls_and_stability() -> Result<()> {
        let input = vec![
            vec![Value::Integer(2), Value::from("a")],
            vec![Value::Null, Value::from("b")],
            vec![Value::Integer(1), Value::from("c")],
            vec![Value::Integer(2), Value::from("d")],
        ];
        let key = vec![(Expression::Column(0), Direction::Ascending)];
        let sorted: Vec<Row> = order(rows(input.clone()), key)?.try_collect()?;
        let labels: Vec<_> = sorted.iter().map(|r| r[1].clone()).collect();
        assert_eq!(labels, vec!["b".into(), "c".into(), "a".into(), "d".into()]);

        let key = vec![(Expression::Column(0), Direction::Descending)];
        let sorted: Vec<Row> = order(rows(input), key)?.try_collect()?;
        let labels: Vec<_> = sorted.iter().map(|r| r[1].clone()).collect();
        assert_eq!(labels, vec![Value::from("a"), "d".into(), "c".into(), "b".into()]);
        Ok(())
    }

    #[test]
    fn filter_drops_null() -> Result<()> {
        let input =
            vec![vec![Value::Boolean(true)], vec![Value::Null], vec![Value::Boolean(false)]];
        let output: Vec<Row> = filter(rows(input), Expression::Column(0)).try_collect()?;
        assert_eq!(output, vec![vec![Value::Boolean(true)]]);

        let output: Result<Vec<Row>> =
            filter(rows(vec![vec![Value::Integer(1)]]), Expression::Column(0)).try_collect();
        assert!(output.is_err());
        Ok(())
    }

    #[test]
    fn remap_drops_columns() -> Result<()> {
        let input = vec![vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]];
        let output: Vec<Row> = remap(rows(input), vec![Some(1), None, Some(0)]).try_collect()?;
        assert_eq!(output, vec![vec![Value::Integer(3), Value::Integer(1)]]);
        Ok(())
    }
}
