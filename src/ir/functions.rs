//! The extension function registry. Plans declare the functions they use by
//! name, and both producers and consumers resolve names against this registry.

use super::FunctionExtension;
use crate::errinput;
use crate::error::Result;

/// Whether a function is evaluated per row or per group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    Scalar,
    Aggregate,
}

/// A registered function signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: &'static str,
    pub kind: FunctionKind,
    /// The minimum number of arguments.
    pub min_args: usize,
    /// The maximum number of arguments.
    pub max_args: usize,
}

const fn scalar(name: &'static str, args: usize) -> FunctionSignature {
    FunctionSignature { name, kind: FunctionKind::Scalar, min_args: args, max_args: args }
}

const fn aggregate(name: &'static str) -> FunctionSignature {
    FunctionSignature { name, kind: FunctionKind::Aggregate, min_args: 1, max_args: 1 }
}

/// All registered functions.
pub const FUNCTIONS: &[FunctionSignature] = &[
    // Arithmetic.
    scalar("add", 2),
    scalar("subtract", 2),
    scalar("multiply", 2),
    scalar("divide", 2),
    scalar("modulus", 2),
    scalar("power", 2),
    scalar("negate", 1),
    scalar("sqrt", 1),
    scalar("exp", 1),
    scalar("abs", 1),
    scalar("sign", 1),
    // Rounding.
    scalar("ceil", 1),
    scalar("floor", 1),
    FunctionSignature { name: "round", kind: FunctionKind::Scalar, min_args: 1, max_args: 2 },
    // Boolean logic.
    scalar("and", 2),
    scalar("or", 2),
    scalar("not", 1),
    scalar("xor", 2),
    // Comparison.
    scalar("equal", 2),
    scalar("not_equal", 2),
    scalar("lt", 2),
    scalar("lte", 2),
    scalar("gt", 2),
    scalar("gte", 2),
    scalar("is_null", 1),
    scalar("is_not_null", 1),
    scalar("is_nan", 1),
    // Aggregates.
    FunctionSignature { name: "count", kind: FunctionKind::Aggregate, min_args: 0, max_args: 1 },
    aggregate("sum"),
    aggregate("min"),
    aggregate("max"),
    aggregate("avg"),
    aggregate("bool_and"),
    aggregate("bool_or"),
    // Approximation.
    aggregate("approx_count_distinct"),
];

/// Looks up a function by name.
pub fn lookup(name: &str) -> Result<&'static FunctionSignature> {
    match FUNCTIONS.iter().find(|f| f.name == name) {
        Some(signature) => Ok(signature),
        None => errinput!("unknown function {name}"),
    }
}

impl FunctionSignature {
    /// Checks that the function can be called with the given kind and number
    /// of arguments.
    pub fn check(&self, kind: FunctionKind, args: usize) -> Result<()> {
        if self.kind != kind {
            return errinput!("{} is not a {kind:?} function", self.name);
        }
        if args < self.min_args || args > self.max_args {
            return errinput!("invalid number of arguments {args} to {}", self.name);
        }
        Ok(())
    }
}

/// Collects the extension functions used by a plan, assigning anchors in
/// order of first use.
#[derive(Debug, Default)]
pub struct Extensions {
    declared: Vec<FunctionExtension>,
}

impl Extensions {
    /// Returns the anchor for the named function, declaring it if needed.
    /// Errors if the function isn't registered or the call is invalid.
    pub fn anchor(&mut self, name: &str, kind: FunctionKind, args: usize) -> Result<u32> {
        lookup(name)?.check(kind, args)?;
        if let Some(extension) = self.declared.iter().find(|e| e.name == name) {
            return Ok(extension.anchor);
        }
        let anchor = u32::try_from(self.declared.len())? + 1;
        self.declared.push(FunctionExtension { anchor, name: name.to_string() });
        Ok(anchor)
    }

    /// Returns the declared extensions.
    pub fn into_declarations(self) -> Vec<FunctionExtension> {
        self.declared
    }
}
