//! Column-at-a-time scalar function kernels.
//!
//! Kernels dispatch on the argument vector types once per chunk, then apply
//! the function element-wise. NULL elements yield NULL, except in Kleene
//! logic (NULL AND false is false, NULL OR true is true) and NULL checks.
//! Null vectors combine with any compatible type and yield null vectors.

use std::cmp::Ordering;

use super::compile::{Kernel, ScalarFunction};
use super::vector::{Chunk, Vector};
use crate::errinput;
use crate::error::Result;
use crate::sql::types::{round_float, round_integer};

impl Kernel {
    /// Evaluates the kernel over a chunk, returning a vector of the chunk's
    /// length.
    pub fn evaluate(&self, chunk: &Chunk) -> Result<Vector> {
        match self {
            Self::Constant(literal) => Ok(Vector::constant(literal, chunk.len)),
            Self::Column(index) => match chunk.columns.get(*index) {
                Some(column) => Ok(column.clone()),
                None => errinput!("column {index} out of bounds"),
            },
            Self::Call(function, arguments) => {
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(argument.evaluate(chunk)?);
                }
                call(*function, args)
            }
        }
    }
}

/// Applies a scalar function to argument vectors.
fn call(function: ScalarFunction, mut args: Vec<Vector>) -> Result<Vector> {
    use ScalarFunction::*;
    // Round without digits rounds to an integral value.
    if function == Round && args.len() == 1 {
        let len = args[0].len();
        args.push(Vector::Integer(vec![Some(0); len]));
    }
    let mut args = args.into_iter();
    let mut arg = || -> Result<Vector> {
        match args.next() {
            Some(arg) => Ok(arg),
            None => errinput!("missing argument to {function:?}"),
        }
    };
    match function {
        Add => arithmetic("add", arg()?, arg()?, i64::checked_add, |a, b| a + b),
        Subtract => arithmetic("subtract", arg()?, arg()?, i64::checked_sub, |a, b| a - b),
        Multiply => arithmetic("multiply", arg()?, arg()?, i64::checked_mul, |a, b| a * b),
        Divide => {
            let (lhs, rhs) = (arg()?, arg()?);
            check_divisor(&lhs, &rhs)?;
            arithmetic("divide", lhs, rhs, i64::checked_div, |a, b| a / b)
        }
        Modulus => {
            let (lhs, rhs) = (arg()?, arg()?);
            check_divisor(&lhs, &rhs)?;
            arithmetic("modulus", lhs, rhs, i64::checked_rem, |a, b| a % b)
        }
        Power => {
            let (lhs, rhs) = (to_float("power", arg()?)?, to_float("power", arg()?)?);
            arithmetic("power", lhs, rhs, |_, _| None, f64::powf)
        }
        Negate => unary_numeric("negate", arg()?, i64::checked_neg, |f| -f),
        Abs => unary_numeric("abs", arg()?, i64::checked_abs, f64::abs),
        Sign => unary_numeric("sign", arg()?, |i| Some(i.signum()), sign),
        Ceil => unary_numeric("ceil", arg()?, Some, f64::ceil),
        Floor => unary_numeric("floor", arg()?, Some, f64::floor),
        Sqrt => unary_numeric("sqrt", to_float("sqrt", arg()?)?, Some, f64::sqrt),
        Exp => unary_numeric("exp", to_float("exp", arg()?)?, Some, f64::exp),
        Round => round(arg()?, arg()?),

        And => logic("and", arg()?, arg()?, |a, b| match (a, b) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        }),
        Or => logic("or", arg()?, arg()?, |a, b| match (a, b) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        }),
        Xor => logic("xor", arg()?, arg()?, |a, b| Some(a? ^ b?)),
        Not => {
            let values = booleans("not", arg()?)?;
            Ok(Vector::Boolean(values.into_iter().map(|v| v.map(|b| !b)).collect()))
        }

        Equal => compare(arg()?, arg()?, |o| o == Some(Ordering::Equal)),
        NotEqual => compare(arg()?, arg()?, |o| o != Some(Ordering::Equal)),
        Lt => compare(arg()?, arg()?, |o| o == Some(Ordering::Less)),
        Lte => compare(arg()?, arg()?, |o| o.is_some_and(Ordering::is_le)),
        Gt => compare(arg()?, arg()?, |o| o == Some(Ordering::Greater)),
        Gte => compare(arg()?, arg()?, |o| o.is_some_and(Ordering::is_ge)),

        IsNull => Ok(is_null(&arg()?, true)),
        IsNotNull => Ok(is_null(&arg()?, false)),
        IsNan => match arg()? {
            Vector::Float(values) => {
                Ok(Vector::Boolean(values.into_iter().map(|v| v.map(f64::is_nan)).collect()))
            }
            Vector::Integer(values) => {
                Ok(Vector::Boolean(values.into_iter().map(|v| v.map(|_| false)).collect()))
            }
            Vector::Null(len) => Ok(Vector::Boolean(vec![None; len])),
            value => errinput!("is_nan can't be used with {}", value.type_name()),
        },
    }
}

/// Applies a binary arithmetic function. Integers yield integers, and error
/// when the integer function returns None. Mixed integers and floats yield
/// floats.
fn arithmetic(
    name: &str,
    lhs: Vector,
    rhs: Vector,
    integer: impl Fn(i64, i64) -> Option<i64>,
    float: impl Fn(f64, f64) -> f64,
) -> Result<Vector> {
    use Vector::*;
    Ok(match (lhs, rhs) {
        (Integer(lhs), Integer(rhs)) => Integer(
            lhs.into_iter()
                .zip(rhs)
                .map(|pair| match pair {
                    (Some(a), Some(b)) => match integer(a, b) {
                        Some(value) => Ok(Some(value)),
                        None => errinput!("integer overflow"),
                    },
                    _ => Ok(None),
                })
                .collect::<Result<_>>()?,
        ),
        (Integer(lhs), Float(rhs)) => Float(zip_map(widen(lhs), rhs, &float)),
        (Float(lhs), Integer(rhs)) => Float(zip_map(lhs, widen(rhs), &float)),
        (Float(lhs), Float(rhs)) => Float(zip_map(lhs, rhs, &float)),
        (lhs @ (Null(_) | Integer(_) | Float(_)), Null(_) | Integer(_) | Float(_)) => {
            Null(lhs.len())
        }
        (lhs, rhs) => {
            return errinput!("can't {name} {} and {}", lhs.type_name(), rhs.type_name())
        }
    })
}

/// Errors if an integer is divided by an integer zero.
fn check_divisor(lhs: &Vector, rhs: &Vector) -> Result<()> {
    if let (Vector::Integer(lhs), Vector::Integer(rhs)) = (lhs, rhs) {
        if lhs.iter().zip(rhs).any(|(a, b)| a.is_some() && *b == Some(0)) {
            return errinput!("can't divide by zero");
        }
    }
    Ok(())
}

/// Applies a unary numeric function. Errors when the integer function
/// returns None.
fn unary_numeric(
    name: &str,
    value: Vector,
    integer: impl Fn(i64) -> Option<i64>,
    float: impl Fn(f64) -> f64,
) -> Result<Vector> {
    Ok(match value {
        Vector::Integer(values) => Vector::Integer(
            values
                .into_iter()
                .map(|v| match v.map(&integer) {
                    Some(None) => errinput!("integer overflow"),
                    Some(value) => Ok(value),
                    None => Ok(None),
                })
                .collect::<Result<_>>()?,
        ),
        Vector::Float(values) => Vector::Float(values.into_iter().map(|v| v.map(&float)).collect()),
        value @ Vector::Null(_) => value,
        value => return errinput!("can't {name} {}", value.type_name()),
    })
}

/// Converts integer vectors to float vectors. Other numeric vectors pass
/// through.
fn to_float(name: &str, value: Vector) -> Result<Vector> {
    match value {
        Vector::Integer(values) => Ok(Vector::Float(widen(values))),
        value @ (Vector::Float(_) | Vector::Null(_)) => Ok(value),
        value => errinput!("can't {name} {}", value.type_name()),
    }
}

fn sign(f: f64) -> f64 {
    if f.is_nan() {
        f
    } else if f > 0.0 {
        1.0
    } else if f < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Rounds numbers half away from zero to the given number of digits.
/// Integers stay integers.
fn round(value: Vector, digits: Vector) -> Result<Vector> {
    use Vector::*;
    Ok(match (value, digits) {
        (Integer(values), Integer(digits)) => Integer(
            values
                .into_iter()
                .zip(digits)
                .map(|pair| match pair {
                    (Some(value), Some(digits)) => round_integer(value, digits).map(Some),
                    _ => Ok(None),
                })
                .collect::<Result<_>>()?,
        ),
        (Float(values), Integer(digits)) => Float(
            values
                .into_iter()
                .zip(digits)
                .map(|pair| match pair {
                    (Some(value), Some(digits)) => Some(round_float(value, digits)),
                    _ => None,
                })
                .collect(),
        ),
        (value @ (Null(_) | Integer(_) | Float(_)), Null(_))
        | (value @ Null(_), Integer(_)) => Null(value.len()),
        (value, digits) => {
            let (value, digits) = (value.type_name(), digits.type_name());
            return errinput!("can't round {value} to {digits} digits");
        }
    })
}

/// Applies a Kleene logic function to boolean (or null) vectors.
fn logic(
    name: &str,
    lhs: Vector,
    rhs: Vector,
    f: impl Fn(Option<bool>, Option<bool>) -> Option<bool>,
) -> Result<Vector> {
    let (lhs, rhs) = (booleans(name, lhs)?, booleans(name, rhs)?);
    Ok(Vector::Boolean(lhs.into_iter().zip(rhs).map(|(a, b)| f(a, b)).collect()))
}

fn booleans(name: &str, value: Vector) -> Result<Vec<Option<bool>>> {
    match value {
        Vector::Boolean(values) => Ok(values),
        Vector::Null(len) => Ok(vec![None; len]),
        value => errinput!("can't {name} {}", value.type_name()),
    }
}

/// Compares two vectors element-wise. The predicate receives the partial
/// ordering, which is None when a NaN is involved. NULLs yield NULL.
fn compare(
    lhs: Vector,
    rhs: Vector,
    predicate: impl Fn(Option<Ordering>) -> bool,
) -> Result<Vector> {
    use Vector::*;
    fn apply<A, B>(
        lhs: Vec<Option<A>>,
        rhs: Vec<Option<B>>,
        cmp: impl Fn(&A, &B) -> Option<Ordering>,
        predicate: impl Fn(Option<Ordering>) -> bool,
    ) -> Vector {
        Vector::Boolean(
            lhs.into_iter()
                .zip(rhs)
                .map(|pair| match pair {
                    (Some(a), Some(b)) => Some(predicate(cmp(&a, &b))),
                    _ => None,
                })
                .collect(),
        )
    }
    Ok(match (lhs, rhs) {
        (Boolean(lhs), Boolean(rhs)) => apply(lhs, rhs, bool::partial_cmp, predicate),
        (Integer(lhs), Integer(rhs)) => apply(lhs, rhs, i64::partial_cmp, predicate),
        (Integer(lhs), Float(rhs)) => apply(widen(lhs), rhs, f64::partial_cmp, predicate),
        (Float(lhs), Integer(rhs)) => apply(lhs, widen(rhs), f64::partial_cmp, predicate),
        (Float(lhs), Float(rhs)) => apply(lhs, rhs, f64::partial_cmp, predicate),
        (String(lhs), String(rhs)) => apply(lhs, rhs, std::string::String::partial_cmp, predicate),
        (Null(len), _) | (_, Null(len)) => Boolean(vec![None; len]),
        (lhs, rhs) => {
            return errinput!("can't compare {} and {}", lhs.type_name(), rhs.type_name())
        }
    })
}

fn is_null(value: &Vector, null: bool) -> Vector {
    let len = value.len();
    let flags = match value {
        Vector::Null(_) => vec![true; len],
        Vector::Boolean(values) => values.iter().map(Option::is_none).collect(),
        Vector::Integer(values) => values.iter().map(Option::is_none).collect(),
        Vector::Float(values) => values.iter().map(Option::is_none).collect(),
        Vector::String(values) => values.iter().map(Option::is_none).collect(),
    };
    Vector::Boolean(flags.into_iter().map(|is_null| Some(is_null == null)).collect())
}

fn widen(values: Vec<Option<i64>>) -> Vec<Option<f64>> {
    values.into_iter().map(|v| v.map(|i| i as f64)).collect()
}

fn zip_map(
    lhs: Vec<Option<f64>>,
    rhs: Vec<Option<f64>>,
    f: impl Fn(f64, f64) -> f64,
) -> Vec<Option<f64>> {
    lhs.into_iter().zip(rhs).map(|(a, b)| Some(f(a?, b?))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Literal;
    use test_case::test_case;

    fn evaluate(function: ScalarFunction, args: Vec<Vector>) -> Result<Vector> {
        let len = args.first().map_or(0, Vector::len);
        let chunk = Chunk::new(args, len)?;
        let columns = (0..chunk.columns.len()).map(Kernel::Column).collect();
        Kernel::Call(function, columns).evaluate(&chunk)
    }

    fn booleans(values: &[Option<bool>]) -> Vector {
        Vector::Boolean(values.to_vec())
    }

    const T: Option<bool> = Some(true);
    const F: Option<bool> = Some(false);
    const N: Option<bool> = None;

    #[test_case(ScalarFunction::And => vec![T, F, N, F, F, F, N, F, N]; "and")]
    #[test_case(ScalarFunction::Or => vec![T, T, T, T, F, N, T, N, N]; "or")]
    #[test_case(ScalarFunction::Xor => vec![F, T, N, T, F, N, N, N, N]; "xor")]
    fn kleene(function: ScalarFunction) -> Vec<Option<bool>> {
        let lhs = booleans(&[T, T, T, F, F, F, N, N, N]);
        let rhs = booleans(&[T, F, N, T, F, N, T, F, N]);
        match evaluate(function, vec![lhs, rhs]).unwrap() {
            Vector::Boolean(values) => values,
            vector => panic!("unexpected {vector:?}"),
        }
    }

    #[test]
    fn comparisons_with_nan_and_nulls() -> Result<()> {
        let lhs = Vector::Float(vec![Some(f64::NAN), Some(1.0), None, Some(-0.0)]);
        let rhs = Vector::Integer(vec![Some(1), Some(1), Some(1), Some(0)]);
        let equal = evaluate(ScalarFunction::Equal, vec![lhs.clone(), rhs.clone()])?;
        assert_eq!(equal, booleans(&[F, T, N, T]));
        let not_equal = evaluate(ScalarFunction::NotEqual, vec![lhs.clone(), rhs.clone()])?;
        assert_eq!(not_equal, booleans(&[T, F, N, F]));
        let gte = evaluate(ScalarFunction::Gte, vec![lhs, rhs])?;
        assert_eq!(gte, booleans(&[F, T, N, T]));

        let strings = Vector::String(vec![Some("a".into())]);
        let ints = Vector::Integer(vec![Some(1)]);
        assert!(evaluate(ScalarFunction::Lt, vec![strings, ints]).is_err());
        Ok(())
    }

    #[test]
    fn arithmetic_types() -> Result<()> {
        let ints = Vector::Integer(vec![Some(7), None]);
        let floats = Vector::Float(vec![Some(2.0), Some(1.0)]);
        let divisors = Vector::Integer(vec![Some(2), Some(0)]);
        assert_eq!(
            evaluate(ScalarFunction::Divide, vec![ints.clone(), divisors])?,
            Vector::Integer(vec![Some(3), None])
        );
        assert_eq!(
            evaluate(ScalarFunction::Add, vec![ints.clone(), floats])?,
            Vector::Float(vec![Some(9.0), None])
        );
        let exponents = Vector::Integer(vec![Some(2), Some(2)]);
        assert_eq!(
            evaluate(ScalarFunction::Power, vec![ints.clone(), exponents])?,
            Vector::Float(vec![Some(49.0), None])
        );
        let nulls = Vector::Null(2);
        assert_eq!(evaluate(ScalarFunction::Multiply, vec![ints, nulls])?, Vector::Null(2));
        Ok(())
    }

    #[test]
    fn arithmetic_errors() {
        let max = Vector::Integer(vec![Some(i64::MAX)]);
        let one = Vector::Integer(vec![Some(1)]);
        let zero = Vector::Integer(vec![Some(0)]);
        assert!(evaluate(ScalarFunction::Add, vec![max.clone(), one.clone()]).is_err());
        assert!(evaluate(ScalarFunction::Divide, vec![one.clone(), zero.clone()]).is_err());
        assert!(evaluate(ScalarFunction::Modulus, vec![one, zero]).is_err());
        let min = Vector::Integer(vec![Some(i64::MIN)]);
        assert!(evaluate(ScalarFunction::Negate, vec![min]).is_err());
        assert!(evaluate(ScalarFunction::Add, vec![max, Vector::String(vec![None])]).is_err());
    }

    #[test]
    fn float_division_by_zero() -> Result<()> {
        let result = evaluate(
            ScalarFunction::Divide,
            vec![Vector::Float(vec![Some(1.0)]), Vector::Integer(vec![Some(0)])],
        )?;
        assert_eq!(result, Vector::Float(vec![Some(f64::INFINITY)]));
        Ok(())
    }

    #[test]
    fn rounding() -> Result<()> {
        let floats = Vector::Float(vec![Some(2.5), Some(-2.5), Some(1.25), None]);
        let rounded = evaluate(ScalarFunction::Round, vec![floats.clone()])?;
        assert_eq!(rounded, Vector::Float(vec![Some(3.0), Some(-3.0), Some(1.0), None]));
        let digits = Vector::Integer(vec![Some(1); 4]);
        let rounded = evaluate(ScalarFunction::Round, vec![floats.clone(), digits])?;
        assert_eq!(rounded, Vector::Float(vec![Some(2.5), Some(-2.5), Some(1.3), None]));

        let ints = Vector::Integer(vec![Some(1250), Some(-1250)]);
        let digits = Vector::Integer(vec![Some(-2); 2]);
        let rounded = evaluate(ScalarFunction::Round, vec![ints.clone(), digits])?;
        assert_eq!(rounded, Vector::Integer(vec![Some(1300), Some(-1300)]));
        assert_eq!(evaluate(ScalarFunction::Ceil, vec![ints.clone()])?, ints);
        assert_eq!(
            evaluate(ScalarFunction::Floor, vec![floats])?,
            Vector::Float(vec![Some(2.0), Some(-3.0), Some(1.0), None])
        );
        Ok(())
    }

    #[test]
    fn null_checks() -> Result<()> {
        let values = Vector::Float(vec![Some(f64::NAN), None, Some(1.0)]);
        assert_eq!(evaluate(ScalarFunction::IsNull, vec![values.clone()])?, booleans(&[F, T, F]));
        let not_null = evaluate(ScalarFunction::IsNotNull, vec![values.clone()])?;
        assert_eq!(not_null, booleans(&[T, F, T]));
        assert_eq!(evaluate(ScalarFunction::IsNan, vec![values])?, booleans(&[T, N, F]));
        Ok(())
    }

    #[test]
    fn constants_broadcast() -> Result<()> {
        let chunk = Chunk::new(vec![], 3)?;
        let constant = Kernel::Constant(Literal::Float(-2.5));
        let kernel = Kernel::Call(ScalarFunction::Sign, vec![constant]);
        assert_eq!(kernel.evaluate(&chunk)?, Vector::Float(vec![Some(-1.0); 3]));
        Ok(())
    }
}
