use serde::{Deserialize, Serialize};

use super::{DataType, Row, Value};
use crate::errinput;
use crate::error::Result;

/// An expression, made up of nested operations and values. Values are either
/// constants or dynamic column references. Evaluates to a final value during
/// query execution, using row values for column references.
///
/// Since this is a recursive data structure, we have to box each child
/// expression, which incurs a heap allocation per expression node. There are
/// clever ways to avoid this, but we keep it simple.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// A constant value.
    Constant(Value),
    /// A column reference. Used as row index when evaluating expressions.
    Column(usize),

    /// Logical AND of two booleans: a AND b.
    And(Box<Expression>, Box<Expression>),
    /// Logical OR of two booleans: a OR b.
    Or(Box<Expression>, Box<Expression>),
    /// Logical NOT of a boolean: NOT a.
    Not(Box<Expression>),
    /// Logical exclusive OR of two booleans: xor(a, b).
    Xor(Box<Expression>, Box<Expression>),

    /// Equality comparison of two values: a = b.
    Equal(Box<Expression>, Box<Expression>),
    /// Greater than comparison of two values: a > b.
    GreaterThan(Box<Expression>, Box<Expression>),
    /// Less than comparison of two values: a < b.
    LessThan(Box<Expression>, Box<Expression>),
    /// Checks for the given value: IS NULL or IS NAN.
    Is(Box<Expression>, Value),

    /// Adds two numbers: a + b.
    Add(Box<Expression>, Box<Expression>),
    /// Divides two numbers: a / b.
    Divide(Box<Expression>, Box<Expression>),
    /// Exponentiates two numbers, i.e. a ^ b.
    Exponentiate(Box<Expression>, Box<Expression>),
    /// The identify function, which simply returns the same number: +a.
    Identity(Box<Expression>),
    /// Multiplies two numbers: a * b.
    Multiply(Box<Expression>, Box<Expression>),
    /// Negates the given number: -a.
    Negate(Box<Expression>),
    /// The remainder after dividing two numbers: a % b.
    Remainder(Box<Expression>, Box<Expression>),
    /// Subtracts two numbers: a - b.
    Subtract(Box<Expression>, Box<Expression>),

    /// The absolute value of a number: abs(a).
    Abs(Box<Expression>),
    /// Rounds a number up: ceil(a).
    Ceil(Box<Expression>),
    /// Raises e to the given power: exp(a).
    Exp(Box<Expression>),
    /// Rounds a number down: floor(a).
    Floor(Box<Expression>),
    /// Rounds a number half away from zero to the given number of decimal
    /// places, which may be negative: round(a, d).
    Round(Box<Expression>, Box<Expression>),
    /// The sign of a number as -1, 0 or 1: sign(a).
    Sign(Box<Expression>),
    /// Takes the square root of a number: √a.
    SquareRoot(Box<Expression>),
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Expression::Constant(value)
    }
}

impl From<Value> for Box<Expression> {
    fn from(value: Value) -> Self {
        Box::new(value.into())
    }
}

impl Expression {
    /// Evaluates an expression, returning a value. Column references look up
    /// values in the given row. If None, any Column references will panic.
    pub fn evaluate(&self, row: Option<&Row>) -> Result<Value> {
        use Value::*;
        Ok(match self {
            // Constant values return themselves.
            Self::Constant(value) => value.clone(),

            // Column references look up a row value. The planner ensures that
            // only constant expressions are evaluated without a row.
            Self::Column(index) => match row {
                Some(row) => row.get(*index).cloned().expect("short row"),
                None => panic!("can't reference column {index} with constant evaluation"),
            },

            // Logical AND. Inputs must be booleans or NULLs. NULLs generally
            // yield NULL, except the special case NULL AND false == false.
            Self::And(lhs, rhs) => match (lhs.evaluate(row)?, rhs.evaluate(row)?) {
                (Boolean(lhs), Boolean(rhs)) => Boolean(lhs && rhs),
                (Boolean(b), Null) | (Null, Boolean(b)) if !b => Boolean(false),
                (Boolean(_), Null) | (Null, Boolean(_)) | (Null, Null) => Null,
                (lhs, rhs) => return errinput!("can't AND {lhs} and {rhs}"),
            },

            // Logical OR. Inputs must be booleans or NULLs. NULLs generally
            // yield NULL, except the special case NULL OR true == true.
            Self::Or(lhs, rhs) => match (lhs.evaluate(row)?, rhs.evaluate(row)?) {
                (Boolean(lhs), Boolean(rhs)) => Boolean(lhs || rhs),
                (Boolean(b), Null) | (Null, Boolean(b)) if b => Boolean(true),
                (Boolean(_), Null) | (Null, Boolean(_)) | (Null, Null) => Null,
                (lhs, rhs) => return errinput!("can't OR {lhs} and {rhs}"),
            },

            // Logical NOT. Input must be boolean or NULL.
            Self::Not(expr) => match expr.evaluate(row)? {
                Boolean(b) => Boolean(!b),
                Null => Null,
                value => return errinput!("can't NOT {value}"),
            },

            // Logical XOR. Any NULL input yields NULL.
            Self::Xor(lhs, rhs) => match (lhs.evaluate(row)?, rhs.evaluate(row)?) {
                (Boolean(lhs), Boolean(rhs)) => Boolean(lhs ^ rhs),
                (Boolean(_), Null) | (Null, Boolean(_)) | (Null, Null) => Null,
                (lhs, rhs) => return errinput!("can't XOR {lhs} and {rhs}"),
            },

            // Comparisons. Must be of same type, except floats and integers
            // which are interchangeable. NULLs yield NULL, NaNs follow IEEE
            // 754 and never compare equal.
            #[allow(clippy::float_cmp)]
            Self::Equal(lhs, rhs) => match (lhs.evaluate(row)?, rhs.evaluate(row)?) {
                (Boolean(lhs), Boolean(rhs)) => Boolean(lhs == rhs),
                (Integer(lhs), Integer(rhs)) => Boolean(lhs == rhs),
                (Integer(lhs), Float(rhs)) => Boolean(lhs as f64 == rhs),
                (Float(lhs), Integer(rhs)) => Boolean(lhs == rhs as f64),
                (Float(lhs), Float(rhs)) => Boolean(lhs == rhs),
                (String(lhs), String(rhs)) => Boolean(lhs == rhs),
                (Null, _) | (_, Null) => Null,
                (lhs, rhs) => return errinput!("can't compare {lhs} and {rhs}"),
            },

            Self::GreaterThan(lhs, rhs) => match (lhs.evaluate(row)?, rhs.evaluate(row)?) {
                #[allow(clippy::bool_comparison)]
                (Boolean(lhs), Boolean(rhs)) => Boolean(lhs > rhs),
                (Integer(lhs), Integer(rhs)) => Boolean(lhs > rhs),
                (Integer(lhs), Float(rhs)) => Boolean(lhs as f64 > rhs),
                (Float(lhs), Integer(rhs)) => Boolean(lhs > rhs as f64),
                (Float(lhs), Float(rhs)) => Boolean(lhs > rhs),
                (String(lhs), String(rhs)) => Boolean(lhs > rhs),
                (Null, _) | (_, Null) => Null,
                (lhs, rhs) => return errinput!("can't compare {lhs} and {rhs}"),
            },

            Self::LessThan(lhs, rhs) => match (lhs.evaluate(row)?, rhs.evaluate(row)?) {
                #[allow(clippy::bool_comparison)]
                (Boolean(lhs), Boolean(rhs)) => Boolean(lhs < rhs),
                (Integer(lhs), Integer(rhs)) => Boolean(lhs < rhs),
                (Integer(lhs), Float(rhs)) => Boolean((lhs as f64) < rhs),
                (Float(lhs), Integer(rhs)) => Boolean(lhs < rhs as f64),
                (Float(lhs), Float(rhs)) => Boolean(lhs < rhs),
                (String(lhs), String(rhs)) => Boolean(lhs < rhs),
                (Null, _) | (_, Null) => Null,
                (lhs, rhs) => return errinput!("can't compare {lhs} and {rhs}"),
            },

            Self::Is(expr, Null) => Boolean(expr.evaluate(row)? == Null),
            Self::Is(expr, Float(f)) if f.is_nan() => match expr.evaluate(row)? {
                Float(f) => Boolean(f.is_nan()),
                Integer(_) => Boolean(false),
                Null => Null,
                v => return errinput!("IS NAN can't be used with {v}"),
            },
            Self::Is(_, v) => panic!("invalid IS value {v}"), // enforced by parser

            // Mathematical operations. Inputs must be numbers, but integers
            // and floats are interchangeable (float when mixed). NULLs yield
            // NULL. Errors on integer overflow and integer division by zero.
            Self::Add(lhs, rhs) => lhs.evaluate(row)?.checked_add(&rhs.evaluate(row)?)?,
            Self::Divide(lhs, rhs) => lhs.evaluate(row)?.checked_div(&rhs.evaluate(row)?)?,
            Self::Exponentiate(lhs, rhs) => lhs.evaluate(row)?.checked_pow(&rhs.evaluate(row)?)?,
            Self::Multiply(lhs, rhs) => lhs.evaluate(row)?.checked_mul(&rhs.evaluate(row)?)?,
            Self::Remainder(lhs, rhs) => lhs.evaluate(row)?.checked_rem(&rhs.evaluate(row)?)?,
            Self::Subtract(lhs, rhs) => lhs.evaluate(row)?.checked_sub(&rhs.evaluate(row)?)?,

            Self::Identity(expr) => match expr.evaluate(row)? {
                v @ (Integer(_) | Float(_) | Null) => v,
                v => return errinput!("can't take the identity of {v}"),
            },
            Self::Negate(expr) => match expr.evaluate(row)? {
                Integer(i) => match i.checked_neg() {
                    Some(i) => Integer(i),
                    None => return errinput!("integer overflow"),
                },
                Float(f) => Float(-f),
                Null => Null,
                value => return errinput!("can't negate {value}"),
            },
            Self::Abs(expr) => match expr.evaluate(row)? {
                Integer(i) => match i.checked_abs() {
                    Some(i) => Integer(i),
                    None => return errinput!("integer overflow"),
                },
                Float(f) => Float(f.abs()),
                Null => Null,
                value => return errinput!("can't take the absolute value of {value}"),
            },
            Self::Sign(expr) => match expr.evaluate(row)? {
                Integer(i) => Integer(i.signum()),
                Float(f) if f.is_nan() => Float(f),
                Float(f) if f > 0.0 => Float(1.0),
                Float(f) if f < 0.0 => Float(-1.0),
                Float(_) => Float(0.0),
                Null => Null,
                value => return errinput!("can't take the sign of {value}"),
            },
            Self::Ceil(expr) => match expr.evaluate(row)? {
                v @ (Integer(_) | Null) => v,
                Float(f) => Float(f.ceil()),
                value => return errinput!("can't round {value}"),
            },
            Self::Floor(expr) => match expr.evaluate(row)? {
                v @ (Integer(_) | Null) => v,
                Float(f) => Float(f.floor()),
                value => return errinput!("can't round {value}"),
            },
            Self::Round(expr, digits) => match (expr.evaluate(row)?, digits.evaluate(row)?) {
                (Integer(i), Integer(d)) => Integer(round_integer(i, d)?),
                (Float(f), Integer(d)) => Float(round_float(f, d)),
                (Integer(_) | Float(_) | Null, Null) | (Null, Integer(_)) => Null,
                (value, digits) => return errinput!("can't round {value} to {digits} digits"),
            },
            Self::Exp(expr) => match expr.evaluate(row)? {
                Integer(i) => Float((i as f64).exp()),
                Float(f) => Float(f.exp()),
                Null => Null,
                value => return errinput!("can't exponentiate {value}"),
            },
            Self::SquareRoot(expr) => match expr.evaluate(row)? {
                Integer(i) => Float((i as f64).sqrt()),
                Float(f) => Float(f.sqrt()),
                Null => Null,
                value => return errinput!("can't take square root of {value}"),
            },
        })
    }

    /// Infers the expression's result type from the input column types.
    /// Returns None if the expression can only yield NULL.
    pub fn datatype(&self, input: &[Option<DataType>]) -> Option<DataType> {
        use DataType::*;
        match self {
            Self::Constant(value) => value.datatype(),
            Self::Column(index) => input.get(*index).copied().flatten(),

            Self::And(_, _)
            | Self::Or(_, _)
            | Self::Not(_)
            | Self::Xor(_, _)
            | Self::Equal(_, _)
            | Self::GreaterThan(_, _)
            | Self::LessThan(_, _)
            | Self::Is(_, _) => Some(Boolean),

            Self::Add(lhs, rhs)
            | Self::Divide(lhs, rhs)
            | Self::Multiply(lhs, rhs)
            | Self::Remainder(lhs, rhs)
            | Self::Subtract(lhs, rhs) => match (lhs.datatype(input), rhs.datatype(input)) {
                (Some(Integer), Some(Integer)) => Some(Integer),
                (None, _) | (_, None) => None,
                _ => Some(Float),
            },
            Self::Exponentiate(lhs, rhs) => {
                lhs.datatype(input).and(rhs.datatype(input)).map(|_| Float)
            }

            Self::Identity(expr)
            | Self::Negate(expr)
            | Self::Abs(expr)
            | Self::Sign(expr)
            | Self::Ceil(expr)
            | Self::Floor(expr)
            | Self::Round(expr, _) => expr.datatype(input),

            Self::Exp(expr) | Self::SquareRoot(expr) => expr.datatype(input).map(|_| Float),
        }
    }

    /// Walks the expression tree depth-first, calling a closure for every node.
    /// Halts and returns false if the closure returns false.
    pub fn walk(&self, visitor: &mut impl FnMut(&Expression) -> bool) -> bool {
        if !visitor(self) {
            return false;
        }
        match self {
            Self::Constant(_) | Self::Column(_) => true,

            Self::And(lhs, rhs)
            | Self::Or(lhs, rhs)
            | Self::Xor(lhs, rhs)
            | Self::Equal(lhs, rhs)
            | Self::GreaterThan(lhs, rhs)
            | Self::LessThan(lhs, rhs)
            | Self::Add(lhs, rhs)
            | Self::Divide(lhs, rhs)
            | Self::Exponentiate(lhs, rhs)
            | Self::Multiply(lhs, rhs)
            | Self::Remainder(lhs, rhs)
            | Self::Subtract(lhs, rhs)
            | Self::Round(lhs, rhs) => lhs.walk(visitor) && rhs.walk(visitor),

            Self::Not(expr)
            | Self::Is(expr, _)
            | Self::Identity(expr)
            | Self::Negate(expr)
            | Self::Abs(expr)
            | Self::Ceil(expr)
            | Self::Exp(expr)
            | Self::Floor(expr)
            | Self::Sign(expr)
            | Self::SquareRoot(expr) => expr.walk(visitor),
        }
    }

    /// Returns true if the expression contains a column reference.
    pub fn is_constant(&self) -> bool {
        self.walk(&mut |expr| !matches!(expr, Self::Column(_)))
    }
}

/// Rounds an integer half away from zero to the given number of decimal
/// digits. Non-negative digits leave the integer unchanged.
pub fn round_integer(value: i64, digits: i64) -> Result<i64> {
    if digits >= 0 {
        return Ok(value);
    }
    let exponent = u32::try_from(digits.unsigned_abs()).ok();
    let Some(factor) = exponent.and_then(|exp| 10i64.checked_pow(exp)) else {
        return Ok(0);
    };
    let remainder = value % factor;
    let truncated = value - remainder;
    if remainder.unsigned_abs() * 2 < factor.unsigned_abs() {
        return Ok(truncated);
    }
    match truncated.checked_add(value.signum() * factor) {
        Some(rounded) => Ok(rounded),
        None => errinput!("integer overflow"),
    }
}

/// Rounds a float half away from zero to the given number of decimal digits.
pub fn round_float(value: f64, digits: i64) -> f64 {
    if digits == 0 {
        return value.round();
    }
    let factor = 10f64.powi(digits.clamp(-308, 308) as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn constant(value: impl Into<Value>) -> Box<Expression> {
        Box::new(Expression::Constant(value.into()))
    }

    #[test_case(Value::Boolean(true), Value::Null => Value::Null; "true and null")]
    #[test_case(Value::Boolean(false), Value::Null => Value::Boolean(false); "false and null")]
    #[test_case(Value::Null, Value::Null => Value::Null; "null and null")]
    #[test_case(Value::Boolean(true), Value::Boolean(true) => Value::Boolean(true); "both true")]
    fn and(lhs: Value, rhs: Value) -> Value {
        Expression::And(lhs.into(), rhs.into()).evaluate(None).unwrap()
    }

    #[test_case(Value::Boolean(true), Value::Null => Value::Boolean(true); "true or null")]
    #[test_case(Value::Boolean(false), Value::Null => Value::Null; "false or null")]
    fn or(lhs: Value, rhs: Value) -> Value {
        Expression::Or(lhs.into(), rhs.into()).evaluate(None).unwrap()
    }

    #[test]
    fn comparison_with_null_is_null() -> Result<()> {
        let expr = Expression::GreaterThan(constant(Value::Null), constant(5));
        assert_eq!(expr.evaluate(None)?, Value::Null);
        let expr = Expression::Equal(constant(f64::NAN), constant(f64::NAN));
        assert_eq!(expr.evaluate(None)?, Value::Boolean(false));
        Ok(())
    }

    #[test]
    fn column_reference() -> Result<()> {
        let row = vec![Value::Integer(1), Value::Integer(41)];
        let expr =
            Expression::Add(Box::new(Expression::Column(0)), Box::new(Expression::Column(1)));
        assert_eq!(expr.evaluate(Some(&row))?, Value::Integer(42));
        assert!(!expr.is_constant());
        Ok(())
    }

    #[test_case(2.5, 0 => 3.0; "half up")]
    #[test_case(-2.5, 0 => -3.0; "half away from zero")]
    #[test_case(1.234, 2 => 1.23; "two digits")]
    #[test_case(1250.0, -2 => 1300.0; "negative digits")]
    fn round_floats(value: f64, digits: i64) -> f64 {
        round_float(value, digits)
    }

    #[test_case(1250, -2 => 1300; "half up")]
    #[test_case(-1249, -2 => -1200; "down")]
    #[test_case(-1250, -2 => -1300; "half away from zero")]
    #[test_case(17, 3 => 17; "positive digits")]
    #[test_case(17, -40 => 0; "huge digits")]
    fn round_integers(value: i64, digits: i64) -> i64 {
        round_integer(value, digits).unwrap()
    }

    #[test]
    fn sign() -> Result<()> {
        assert_eq!(Expression::Sign(constant(-4)).evaluate(None)?, Value::Integer(-1));
        assert_eq!(Expression::Sign(constant(0.0)).evaluate(None)?, Value::Float(0.0));
        assert_eq!(Expression::Sign(constant(2.5)).evaluate(None)?, Value::Float(1.0));
        Ok(())
    }

    #[test]
    fn datatypes() {
        let input = [Some(DataType::Integer), Some(DataType::Float), None];
        let column = |i| Box::new(Expression::Column(i));
        assert_eq!(Expression::Add(column(0), column(0)).datatype(&input), Some(DataType::Integer));
        assert_eq!(Expression::Add(column(0), column(1)).datatype(&input), Some(DataType::Float));
        assert_eq!(Expression::Add(column(0), column(2)).datatype(&input), None);
        assert_eq!(Expression::SquareRoot(column(0)).datatype(&input), Some(DataType::Float));
        assert_eq!(Expression::Not(column(2)).datatype(&input), Some(DataType::Boolean));
    }
}
