//! Typed column vectors and chunks of them, the columnar engine's data
//! representation. Vectors are converted from and to Arrow arrays at the
//! engine boundary.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray as _, BooleanArray, Float64Array, Int64Array, NullArray, StringArray,
};
use arrow::datatypes::{DataType as ArrowType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::{Error, Result};
use crate::ir::{Literal, TypeKind};
use crate::sketch::SketchValue;
use crate::sql::types::{batch, DataType};
use crate::{errdata, errinput};

/// A column of nullable values of a single type. Null vectors hold only
/// NULLs and have no type.
#[derive(Clone, Debug, PartialEq)]
pub enum Vector {
    Null(usize),
    Boolean(Vec<Option<bool>>),
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    String(Vec<Option<String>>),
}

/// A single value taken out of a vector.
///
/// Floats are equal and hash by bit pattern, so grouping treats NaN as one
/// key and -0.0 and 0.0 as distinct keys.
#[derive(Clone, Debug)]
pub enum Scalar {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Vector {
    /// Creates a vector repeating a literal.
    pub fn constant(literal: &Literal, len: usize) -> Self {
        match literal {
            Literal::Null => Self::Null(len),
            Literal::Boolean(b) => Self::Boolean(vec![Some(*b); len]),
            Literal::Integer(i) => Self::Integer(vec![Some(*i); len]),
            Literal::Float(f) => Self::Float(vec![Some(*f); len]),
            Literal::String(s) => Self::String(vec![Some(s.clone()); len]),
        }
    }

    /// Creates a vector from scalars. The first non-NULL scalar determines the
    /// type, and integers widen to floats when mixed with them.
    pub fn from_scalars(scalars: Vec<Scalar>) -> Result<Self> {
        let widen = scalars.iter().any(|s| matches!(s, Scalar::Float(_)));
        let kind = scalars.iter().find_map(Scalar::kind).map(|kind| match kind {
            TypeKind::Integer if widen => TypeKind::Float,
            kind => kind,
        });
        let Some(kind) = kind else {
            return Ok(Self::Null(scalars.len()));
        };
        let mismatch =
            |s: &Scalar| Error::InvalidData(format!("can't store {s:?} in a {kind} vector"));
        Ok(match kind {
            TypeKind::Boolean => Self::Boolean(
                scalars
                    .iter()
                    .map(|s| match s {
                        Scalar::Boolean(b) => Ok(Some(*b)),
                        Scalar::Null => Ok(None),
                        s => Err(mismatch(s)),
                    })
                    .collect::<Result<_>>()?,
            ),
            TypeKind::Integer => Self::Integer(
                scalars
                    .iter()
                    .map(|s| match s {
                        Scalar::Integer(i) => Ok(Some(*i)),
                        Scalar::Null => Ok(None),
                        s => Err(mismatch(s)),
                    })
                    .collect::<Result<_>>()?,
            ),
            TypeKind::Float => Self::Float(
                scalars
                    .iter()
                    .map(|s| match s {
                        Scalar::Float(f) => Ok(Some(*f)),
                        Scalar::Integer(i) => Ok(Some(*i as f64)),
                        Scalar::Null => Ok(None),
                        s => Err(mismatch(s)),
                    })
                    .collect::<Result<_>>()?,
            ),
            TypeKind::String => Self::String(
                scalars
                    .into_iter()
                    .map(|s| match s {
                        Scalar::String(s) => Ok(Some(s)),
                        Scalar::Null => Ok(None),
                        s => Err(mismatch(&s)),
                    })
                    .collect::<Result<_>>()?,
            ),
        })
    }

    /// Converts an Arrow array, widening integers and floats to 64 bits.
    pub fn from_array(array: &dyn Array) -> Result<Self> {
        let Some(datatype) = batch::column_type(array.data_type())? else {
            return Ok(Self::Null(array.len()));
        };
        let array = arrow::compute::cast(array, &batch::arrow_type(Some(datatype)))?;
        Ok(match datatype {
            DataType::Boolean => Self::Boolean(array.as_boolean().iter().collect()),
            DataType::Integer => Self::Integer(array.as_primitive::<Int64Type>().iter().collect()),
            DataType::Float => Self::Float(array.as_primitive::<Float64Type>().iter().collect()),
            DataType::String => Self::String(
                array.as_string::<i32>().iter().map(|s| s.map(str::to_string)).collect(),
            ),
        })
    }

    /// Converts the vector into an Arrow array.
    pub fn into_array(self) -> ArrayRef {
        match self {
            Self::Null(len) => Arc::new(NullArray::new(len)),
            Self::Boolean(values) => Arc::new(BooleanArray::from(values)),
            Self::Integer(values) => Arc::new(Int64Array::from(values)),
            Self::Float(values) => Arc::new(Float64Array::from(values)),
            Self::String(values) => Arc::new(StringArray::from(values)),
        }
    }

    /// The vector's value type, or None for null vectors.
    pub fn kind(&self) -> Option<TypeKind> {
        match self {
            Self::Null(_) => None,
            Self::Boolean(_) => Some(TypeKind::Boolean),
            Self::Integer(_) => Some(TypeKind::Integer),
            Self::Float(_) => Some(TypeKind::Float),
            Self::String(_) => Some(TypeKind::String),
        }
    }

    /// The vector's type name, for error messages.
    pub fn type_name(&self) -> String {
        self.kind().map_or_else(|| "null".to_string(), |kind| kind.to_string())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Null(len) => *len,
            Self::Boolean(values) => values.len(),
            Self::Integer(values) => values.len(),
            Self::Float(values) => values.len(),
            Self::String(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the vector contains at least one non-NULL value.
    pub fn has_values(&self) -> bool {
        match self {
            Self::Null(_) => false,
            Self::Boolean(values) => values.iter().any(Option::is_some),
            Self::Integer(values) => values.iter().any(Option::is_some),
            Self::Float(values) => values.iter().any(Option::is_some),
            Self::String(values) => values.iter().any(Option::is_some),
        }
    }

    /// Returns the value at the given position.
    pub fn get(&self, index: usize) -> Scalar {
        let value = match self {
            Self::Null(_) => None,
            Self::Boolean(values) => values[index].map(Scalar::Boolean),
            Self::Integer(values) => values[index].map(Scalar::Integer),
            Self::Float(values) => values[index].map(Scalar::Float),
            Self::String(values) => values[index].clone().map(Scalar::String),
        };
        value.unwrap_or(Scalar::Null)
    }

    /// Gathers the values at the given positions.
    pub fn take(&self, indices: &[usize]) -> Self {
        fn take<T: Clone>(values: &[Option<T>], indices: &[usize]) -> Vec<Option<T>> {
            indices.iter().map(|i| values[*i].clone()).collect()
        }
        match self {
            Self::Null(_) => Self::Null(indices.len()),
            Self::Boolean(values) => Self::Boolean(take(values, indices)),
            Self::Integer(values) => Self::Integer(take(values, indices)),
            Self::Float(values) => Self::Float(take(values, indices)),
            Self::String(values) => Self::String(take(values, indices)),
        }
    }

    /// Compares the values at two positions. NULLs sort before all values,
    /// and floats use the IEEE 754 total order.
    pub fn compare(&self, a: usize, b: usize) -> Ordering {
        match self {
            Self::Null(_) => Ordering::Equal,
            Self::Boolean(values) => values[a].cmp(&values[b]),
            Self::Integer(values) => values[a].cmp(&values[b]),
            Self::Float(values) => match (values[a], values[b]) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                (a, b) => a.is_some().cmp(&b.is_some()),
            },
            Self::String(values) => values[a].cmp(&values[b]),
        }
    }
}

impl Scalar {
    fn kind(&self) -> Option<TypeKind> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(TypeKind::Boolean),
            Self::Integer(_) => Some(TypeKind::Integer),
            Self::Float(_) => Some(TypeKind::Float),
            Self::String(_) => Some(TypeKind::String),
        }
    }

    /// Returns the value to add to a cardinality sketch, or None for NULL.
    pub fn sketch_value(&self) -> Option<SketchValue<'_>> {
        Some(match self {
            Self::Null => return None,
            Self::Boolean(b) => SketchValue::Boolean(*b),
            Self::Integer(i) => SketchValue::Integer(*i),
            Self::Float(f) => SketchValue::Float(*f),
            Self::String(s) => SketchValue::String(s),
        })
    }

    /// Adds two numbers of the same type. Errors on integer overflow.
    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        Ok(match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => match a.checked_add(*b) {
                Some(sum) => Self::Integer(sum),
                None => return errinput!("integer overflow"),
            },
            (Self::Float(a), Self::Float(b)) => Self::Float(a + b),
            (Self::Integer(a), Self::Float(b)) => Self::Float(*a as f64 + b),
            (Self::Float(a), Self::Integer(b)) => Self::Float(a + *b as f64),
            (a, b) => return errinput!("can't add {a:?} and {b:?}"),
        })
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Boolean(b) => b.hash(state),
            Self::Integer(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::String(s) => s.hash(state),
        }
    }
}

/// Scalars of different types order by type: NULL, booleans, integers,
/// floats, strings. Integers and floats are never equal.
impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Scalar {
    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean(_) => 1,
            Self::Integer(_) => 2,
            Self::Float(_) => 3,
            Self::String(_) => 4,
        }
    }
}

/// A set of equal-length column vectors. The length is tracked separately,
/// since a chunk may have rows but no columns.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    pub columns: Vec<Vector>,
    pub len: usize,
}

impl Chunk {
    /// Creates a chunk, checking that all columns have the given length.
    pub fn new(columns: Vec<Vector>, len: usize) -> Result<Self> {
        if let Some(column) = columns.iter().find(|c| c.len() != len) {
            return errdata!("column of length {} in chunk of length {len}", column.len());
        }
        Ok(Self { columns, len })
    }

    /// Converts a record batch.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let columns =
            batch.columns().iter().map(|c| Vector::from_array(c.as_ref())).collect::<Result<_>>()?;
        Self::new(columns, batch.num_rows())
    }

    /// Converts the chunk into a record batch with the given column names.
    pub fn into_record_batch(self, names: &[String]) -> Result<RecordBatch> {
        if names.len() != self.columns.len() {
            return errdata!("got {} names for {} columns", names.len(), self.columns.len());
        }
        let fields: Vec<Field> = names
            .iter()
            .zip(&self.columns)
            .map(|(name, column)| Field::new(name, arrow_type(column), true))
            .collect();
        let arrays = self.columns.into_iter().map(Vector::into_array).collect();
        let options = RecordBatchOptions::new().with_row_count(Some(self.len));
        Ok(RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)?)
    }

    /// Gathers the rows at the given positions.
    pub fn take(&self, indices: &[usize]) -> Self {
        let columns = self.columns.iter().map(|c| c.take(indices)).collect();
        Self { columns, len: indices.len() }
    }
}

fn arrow_type(vector: &Vector) -> ArrowType {
    match vector {
        Vector::Null(_) => ArrowType::Null,
        Vector::Boolean(_) => ArrowType::Boolean,
        Vector::Integer(_) => ArrowType::Int64,
        Vector::Float(_) => ArrowType::Float64,
        Vector::String(_) => ArrowType::Utf8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_scalars_widens() -> Result<()> {
        let scalars = vec![Scalar::Integer(1), Scalar::Null, Scalar::Float(0.5)];
        let vector = Vector::from_scalars(scalars)?;
        assert_eq!(vector, Vector::Float(vec![Some(1.0), None, Some(0.5)]));
        assert_eq!(Vector::from_scalars(vec![Scalar::Null; 2])?, Vector::Null(2));
        assert!(Vector::from_scalars(vec![Scalar::Integer(1), Scalar::Boolean(true)]).is_err());
        Ok(())
    }

    #[test]
    fn compare_orders_nulls_first() {
        let vector = Vector::Float(vec![Some(1.0), None, Some(f64::NAN), Some(-0.0), Some(0.0)]);
        assert_eq!(vector.compare(1, 0), Ordering::Less);
        assert_eq!(vector.compare(2, 0), Ordering::Greater);
        assert_eq!(vector.compare(3, 4), Ordering::Less);
        assert_eq!(vector.compare(1, 1), Ordering::Equal);
    }

    #[test]
    fn scalar_keys() {
        assert_eq!(Scalar::Float(f64::NAN), Scalar::Float(f64::NAN));
        assert_ne!(Scalar::Float(-0.0), Scalar::Float(0.0));
        assert_ne!(Scalar::Integer(1), Scalar::Float(1.0));
        assert!(Scalar::Null < Scalar::Boolean(false));
    }

    #[test]
    fn record_batch_roundtrip() -> Result<()> {
        let chunk = Chunk::new(
            vec![
                Vector::Integer(vec![Some(1), None]),
                Vector::String(vec![None, Some("x".into())]),
                Vector::Null(2),
            ],
            2,
        )?;
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let batch = chunk.clone().into_record_batch(&names)?;
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(Chunk::from_record_batch(&batch)?, chunk);
        assert!(chunk.into_record_batch(&names[..1]).is_err());
        Ok(())
    }

    #[test]
    fn chunks_without_columns_keep_rows() -> Result<()> {
        let chunk = Chunk::new(vec![], 3)?;
        assert_eq!(chunk.take(&[0, 2]).len, 2);
        assert_eq!(chunk.into_record_batch(&[])?.num_rows(), 3);
        Ok(())
    }
}
