use std::cmp::Ordering;

use arrow::record_batch::RecordBatch;
use itertools::{izip, Itertools as _};

use crate::ir::OutputOrder;
use crate::sql::types::{batch, Row, Value};

/// Comparison settings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompareOptions {
    /// Relative tolerance for float cells. 0 requires exact equality.
    pub float_tolerance: f64,
    /// The expected row order. None compares rows as multisets.
    pub order: Option<OutputOrder>,
}

/// A difference between an expected and actual result table.
#[derive(Clone, Debug, PartialEq)]
pub enum Mismatch {
    ColumnCount { expected: usize, actual: usize },
    ColumnName { index: usize, expected: String, actual: String },
    RowCount { expected: usize, actual: usize },
    Value { row: usize, column: String, expected: Value, actual: Value },
    /// A table couldn't be read, e.g. due to an unsupported column type.
    Unreadable { side: &'static str, error: String },
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnCount { expected, actual } => {
                write!(f, "expected {expected} columns, got {actual}")
            }
            Self::ColumnName { index, expected, actual } => {
                write!(f, "column {index}: expected name {expected}, got {actual}")
            }
            Self::RowCount { expected, actual } => {
                write!(f, "expected {expected} rows, got {actual}")
            }
            Self::Value { row, column, expected, actual } => {
                write!(f, "row {row} column {column}: expected {expected}, got {actual}")
            }
            Self::Unreadable { side, error } => write!(f, "can't read {side} table: {error}"),
        }
    }
}

impl std::error::Error for Mismatch {}

/// Compares an actual result table against the expected one. Column names
/// must match exactly.
///
/// Without an order, rows are compared as multisets. With one, both tables
/// must agree on the sequence of sort key values, and each run of rows with
/// equal keys is compared as a multiset. If the output was truncated, the
/// first and last runs are only checked for their keys. Row positions in a
/// multiset mismatch refer to rows sorted by the total value order.
pub fn compare(
    expected: &RecordBatch,
    actual: &RecordBatch,
    options: &CompareOptions,
) -> Result<(), Mismatch> {
    let expected_names = batch::column_names(expected);
    let actual_names = batch::column_names(actual);
    if expected_names.len() != actual_names.len() {
        return Err(Mismatch::ColumnCount {
            expected: expected_names.len(),
            actual: actual_names.len(),
        });
    }
    for (index, (e, a)) in expected_names.iter().zip(&actual_names).enumerate() {
        if e != a {
            return Err(Mismatch::ColumnName { index, expected: e.clone(), actual: a.clone() });
        }
    }
    if expected.num_rows() != actual.num_rows() {
        return Err(Mismatch::RowCount { expected: expected.num_rows(), actual: actual.num_rows() });
    }

    let mut expected_rows = read_rows(expected, "expected")?;
    let mut actual_rows = read_rows(actual, "actual")?;
    let tolerance = options.float_tolerance;
    let Some(order) = &options.order else {
        let (expected, actual) = (&mut expected_rows, &mut actual_rows);
        return compare_multiset(&expected_names, expected, actual, tolerance, 0);
    };

    let len = expected_rows.len();
    let mut start = 0;
    while start < len {
        let key = &expected_rows[start];
        let mut end = start + 1;
        while end < len && order.columns.iter().all(|&c| expected_rows[end][c] == key[c]) {
            end += 1;
        }
        for (row, actual) in actual_rows.iter().enumerate().take(end).skip(start) {
            for &c in &order.columns {
                if !cells_equal(&key[c], &actual[c], tolerance) {
                    return Err(Mismatch::Value {
                        row,
                        column: expected_names[c].clone(),
                        expected: key[c].clone(),
                        actual: actual[c].clone(),
                    });
                }
            }
        }
        if !order.truncated || (start > 0 && end < len) {
            compare_multiset(
                &expected_names,
                &mut expected_rows[start..end],
                &mut actual_rows[start..end],
                tolerance,
                start,
            )?;
        }
        start = end;
    }
    Ok(())
}

fn read_rows(table: &RecordBatch, side: &'static str) -> Result<Vec<Row>, Mismatch> {
    batch::to_rows(table).map_err(|err| Mismatch::Unreadable { side, error: err.to_string() })
}

/// Compares rows as multisets. Both sides are sorted and paired by position,
/// which fails if float cells within tolerance sort differently. In that
/// case, each expected row is matched against any unmatched equal actual
/// row before reporting the positional mismatch.
fn compare_multiset(
    names: &[String],
    expected: &mut [Row],
    actual: &mut [Row],
    tolerance: f64,
    offset: usize,
) -> Result<(), Mismatch> {
    expected.sort();
    actual.sort();
    let Err(mismatch) = compare_rows(names, expected, actual, tolerance, offset) else {
        return Ok(());
    };
    let mut unmatched: Vec<&Row> = actual.iter().collect();
    for row in expected.iter() {
        match unmatched.iter().position(|a| rows_equal(row, a, tolerance)) {
            Some(index) => {
                unmatched.swap_remove(index);
            }
            None => return Err(mismatch),
        }
    }
    Ok(())
}

/// Compares rows pairwise by position.
fn compare_rows(
    names: &[String],
    expected: &[Row],
    actual: &[Row],
    tolerance: f64,
    offset: usize,
) -> Result<(), Mismatch> {
    for (row, (e, a)) in expected.iter().zip(actual).enumerate() {
        for (column, e, a) in izip!(names, e, a) {
            if !cells_equal(e, a, tolerance) {
                return Err(Mismatch::Value {
                    row: offset + row,
                    column: column.clone(),
                    expected: e.clone(),
                    actual: a.clone(),
                });
            }
        }
    }
    Ok(())
}

fn rows_equal(expected: &Row, actual: &Row, tolerance: f64) -> bool {
    expected.iter().zip(actual).all(|(e, a)| cells_equal(e, a, tolerance))
}

/// Compares two cells. Cells of different types are never equal, not even
/// integers and floats.
fn cells_equal(expected: &Value, actual: &Value, tolerance: f64) -> bool {
    match (expected, actual) {
        (Value::Float(e), Value::Float(a)) => floats_equal(*e, *a, tolerance),
        (Value::Integer(_), Value::Float(_)) | (Value::Float(_), Value::Integer(_)) => false,
        (e, a) => e == a,
    }
}

/// Compares floats within a relative tolerance. NaN equals NaN, and
/// infinities must match exactly.
fn floats_equal(expected: f64, actual: f64, tolerance: f64) -> bool {
    if expected.is_nan() || actual.is_nan() {
        return expected.is_nan() && actual.is_nan();
    }
    if expected == actual {
        return true;
    }
    if expected.is_infinite() || actual.is_infinite() {
        return false;
    }
    let scale = expected.abs().max(actual.abs());
    match (expected - actual).abs().partial_cmp(&(tolerance * scale)) {
        Some(Ordering::Less | Ordering::Equal) => true,
        Some(Ordering::Greater) | None => false,
    }
}

/// Renders a table for mismatch reports, one row per line.
pub(super) fn render(table: &RecordBatch) -> String {
    match batch::to_rows(table) {
        Ok(rows) => rows.iter().map(|row| row.iter().join(", ")).join("\n"),
        Err(err) => format!("<unreadable: {err}>"),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::error::Result;
    use crate::sql::types::DataType;

    fn table(names: &[&str], types: &[DataType], rows: Vec<Vec<Value>>) -> Result<RecordBatch> {
        let names = names.iter().map(|n| n.to_string()).collect_vec();
        let types = types.iter().copied().map(Some).collect_vec();
        batch::to_record_batch(&names, &types, &rows)
    }

    fn ints(values: &[Option<i64>]) -> Result<RecordBatch> {
        let rows = values.iter().map(|v| vec![Value::from(*v)]).collect();
        table(&["a"], &[DataType::Integer], rows)
    }

    const UNORDERED: CompareOptions = CompareOptions { float_tolerance: 0.0, order: None };

    fn ordered_by(columns: &[usize], truncated: bool) -> CompareOptions {
        let order = OutputOrder { columns: columns.to_vec(), truncated };
        CompareOptions { float_tolerance: 0.0, order: Some(order) }
    }

    fn pairs(rows: &[(i64, &str)]) -> Result<RecordBatch> {
        let rows = rows.iter().map(|(k, v)| vec![Value::Integer(*k), Value::from(*v)]).collect();
        table(&["k", "v"], &[DataType::Integer, DataType::String], rows)
    }

    #[test]
    fn multiset_ignores_order() -> Result<()> {
        let expected = ints(&[Some(1), None, Some(2), Some(1)])?;
        let actual = ints(&[Some(2), Some(1), Some(1), None])?;
        assert_eq!(compare(&expected, &actual, &UNORDERED), Ok(()));
        assert!(matches!(
            compare(&expected, &actual, &ordered_by(&[0], false)),
            Err(Mismatch::Value { row: 0, .. })
        ));
        Ok(())
    }

    #[test]
    fn multiset_counts_duplicates() -> Result<()> {
        let expected = ints(&[Some(1), Some(1), Some(2)])?;
        let actual = ints(&[Some(1), Some(2), Some(2)])?;
        assert_eq!(
            compare(&expected, &actual, &UNORDERED),
            Err(Mismatch::Value {
                row: 1,
                column: "a".into(),
                expected: Value::Integer(1),
                actual: Value::Integer(2),
            })
        );
        Ok(())
    }

    #[test]
    fn shape_mismatches() -> Result<()> {
        let one = ints(&[Some(1)])?;
        let two = ints(&[Some(1), Some(2)])?;
        assert_eq!(
            compare(&one, &two, &UNORDERED),
            Err(Mismatch::RowCount { expected: 1, actual: 2 })
        );

        let renamed = table(&["b"], &[DataType::Integer], vec![vec![Value::Integer(1)]])?;
        assert_eq!(
            compare(&one, &renamed, &UNORDERED),
            Err(Mismatch::ColumnName { index: 0, expected: "a".into(), actual: "b".into() })
        );

        let wide = table(
            &["a", "b"],
            &[DataType::Integer, DataType::Integer],
            vec![vec![Value::Integer(1), Value::Integer(1)]],
        )?;
        assert_eq!(
            compare(&one, &wide, &UNORDERED),
            Err(Mismatch::ColumnCount { expected: 1, actual: 2 })
        );
        Ok(())
    }

    #[test]
    fn integer_never_equals_float() -> Result<()> {
        let ints = ints(&[Some(1)])?;
        let floats = table(&["a"], &[DataType::Float], vec![vec![Value::Float(1.0)]])?;
        assert!(compare(&ints, &floats, &UNORDERED).is_err());
        Ok(())
    }

    #[test_case(1.0, 1.0, 0.0 => true; "exact")]
    #[test_case(1.0, 1.0 + 1e-12, 1e-9 => true; "within tolerance")]
    #[test_case(1.0, 1.001, 1e-9 => false; "outside tolerance")]
    #[test_case(1e12, 1e12 + 1.0, 1e-9 => true; "relative")]
    #[test_case(f64::NAN, f64::NAN, 0.0 => true; "nan equals nan")]
    #[test_case(f64::NAN, 1.0, 1.0 => false; "nan not number")]
    #[test_case(f64::INFINITY, f64::INFINITY, 0.0 => true; "infinity")]
    #[test_case(f64::INFINITY, f64::MAX, 1.0 => false; "infinity not max")]
    #[test_case(0.0, -0.0, 0.0 => true; "signed zero")]
    fn float_equality(expected: f64, actual: f64, tolerance: f64) -> bool {
        floats_equal(expected, actual, tolerance)
    }

    #[test]
    fn nulls_and_tolerance_in_tables() -> Result<()> {
        let expected = table(
            &["x", "y"],
            &[DataType::Float, DataType::String],
            vec![
                vec![Value::Float(0.1 + 0.2), Value::Null],
                vec![Value::Float(f64::NAN), Value::from("a")],
            ],
        )?;
        let actual = table(
            &["x", "y"],
            &[DataType::Float, DataType::String],
            vec![
                vec![Value::Float(f64::NAN), Value::from("a")],
                vec![Value::Float(0.3), Value::Null],
            ],
        )?;
        let options = CompareOptions { float_tolerance: 1e-9, order: None };
        assert_eq!(compare(&expected, &actual, &options), Ok(()));
        assert!(compare(&expected, &actual, &UNORDERED).is_err());
        Ok(())
    }

    #[test]
    fn floats_within_tolerance_sorted_differently() -> Result<()> {
        let rows = |cells: [(f64, &str); 2]| -> Result<RecordBatch> {
            let rows = cells.iter().map(|(x, y)| vec![Value::Float(*x), Value::from(*y)]).collect();
            table(&["x", "y"], &[DataType::Float, DataType::String], rows)
        };
        let expected = rows([(0.3, "a"), (0.1 + 0.2, "b")])?;
        let options = CompareOptions { float_tolerance: 1e-9, order: None };
        let actual = rows([(0.1 + 0.2, "a"), (0.3, "b")])?;
        assert_eq!(compare(&expected, &actual, &options), Ok(()));
        let actual = rows([(0.1 + 0.2, "a"), (0.3, "c")])?;
        assert!(matches!(compare(&expected, &actual, &options), Err(Mismatch::Value { .. })));
        Ok(())
    }

    #[test]
    fn ties_on_sort_keys_compare_as_multiset() -> Result<()> {
        // GROUP BY k ORDER BY n, with both groups having the same count.
        let rows = |cells: [(i64, i64); 2]| -> Result<RecordBatch> {
            let rows = cells.iter().map(|(k, n)| vec![Value::Integer(*k), Value::Integer(*n)]);
            table(&["k", "n"], &[DataType::Integer, DataType::Integer], rows.collect())
        };
        let expected = rows([(1, 1), (2, 1)])?;
        let actual = rows([(2, 1), (1, 1)])?;
        assert_eq!(compare(&expected, &actual, &ordered_by(&[1], false)), Ok(()));
        assert_eq!(
            compare(&expected, &actual, &ordered_by(&[0], false)),
            Err(Mismatch::Value {
                row: 0,
                column: "k".into(),
                expected: Value::Integer(1),
                actual: Value::Integer(2),
            })
        );
        Ok(())
    }

    #[test]
    fn sort_key_sequence_must_match() -> Result<()> {
        let expected = pairs(&[(1, "a"), (2, "b"), (2, "c"), (3, "d")])?;
        let actual = pairs(&[(1, "a"), (2, "c"), (2, "b"), (3, "d")])?;
        assert_eq!(compare(&expected, &actual, &ordered_by(&[0], false)), Ok(()));

        let actual = pairs(&[(1, "a"), (2, "b"), (3, "d"), (2, "c")])?;
        assert!(matches!(
            compare(&expected, &actual, &ordered_by(&[0], false)),
            Err(Mismatch::Value { row: 2, .. })
        ));

        let actual = pairs(&[(1, "a"), (2, "b"), (2, "x"), (3, "d")])?;
        assert!(matches!(
            compare(&expected, &actual, &ordered_by(&[0], false)),
            Err(Mismatch::Value { row: 2, ref column, .. }) if column == "v"
        ));
        Ok(())
    }

    #[test]
    fn truncated_boundary_runs_check_keys_only() -> Result<()> {
        // ORDER BY k LIMIT 3, where the cut falls inside the run of 2s.
        let expected = pairs(&[(1, "a"), (2, "b"), (2, "c")])?;
        let actual = pairs(&[(1, "a"), (2, "d"), (2, "b")])?;
        assert_eq!(compare(&expected, &actual, &ordered_by(&[0], true)), Ok(()));
        assert!(compare(&expected, &actual, &ordered_by(&[0], false)).is_err());

        let actual = pairs(&[(1, "a"), (2, "b"), (3, "c")])?;
        assert!(compare(&expected, &actual, &ordered_by(&[0], true)).is_err());
        Ok(())
    }
}
